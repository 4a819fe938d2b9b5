use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;

use eventdesk_auth::{PolicyPayload, SessionContext};
use eventdesk_core::OrgId;

use super::source::{PolicyFetchError, PolicySource};

/// In-memory policy source.
///
/// Intended for tests/dev. Failures can be scripted to exercise retry and
/// stale-but-available paths.
#[derive(Debug, Default)]
pub struct InMemoryPolicySource {
    policies: RwLock<HashMap<OrgId, PolicyPayload>>,
    scripted_failures: Mutex<VecDeque<PolicyFetchError>>,
    fetches: AtomicUsize,
}

impl InMemoryPolicySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, org_id: OrgId, payload: PolicyPayload) -> Self {
        self.set_policy(org_id, payload);
        self
    }

    /// Replace the policy served for `org_id` (e.g. after a role change).
    pub fn set_policy(&self, org_id: OrgId, payload: PolicyPayload) {
        self.policies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(org_id, payload);
    }

    /// Make the next fetch fail with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: PolicyFetchError) {
        self.scripted_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Number of fetches served so far, failures included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicySource for InMemoryPolicySource {
    async fn fetch_policy(
        &self,
        session: &SessionContext,
    ) -> Result<PolicyPayload, PolicyFetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let scripted = self
            .scripted_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = scripted {
            return Err(error);
        }

        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session.org_id)
            .cloned()
            .ok_or_else(|| PolicyFetchError::NotFound(session.org_id.clone()))
    }
}
