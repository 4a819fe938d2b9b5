//! Policy loading: fetch, validate, commit.
//!
//! The loader owns no state of its own; every decision about whether a result
//! may land is made by the [`PolicyStore`] from the ticket it issued.

use std::sync::Arc;

use eventdesk_auth::{RuleSet, SessionContext};

use crate::policy_store::{CommitOutcome, FetchTicket, PolicyFetchError, PolicySource, PolicyStore};
use crate::retry::RetryPolicy;

/// Ties a [`PolicyStore`] to a [`PolicySource`].
#[derive(Debug)]
pub struct PolicyLoader<S> {
    store: Arc<PolicyStore>,
    source: S,
    retry: RetryPolicy,
}

impl<S: PolicySource> PolicyLoader<S> {
    pub fn new(store: Arc<PolicyStore>, source: S) -> Self {
        Self {
            store,
            source,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Start a session and load its policy.
    pub async fn login(&self, session: SessionContext) -> Result<CommitOutcome, PolicyFetchError> {
        let ticket = self.store.begin_session(session);
        self.load(ticket).await
    }

    /// Re-fetch after a role or permission change.
    ///
    /// Returns `Ok(None)` when there is no active session to refresh.
    pub async fn refresh(&self) -> Result<Option<CommitOutcome>, PolicyFetchError> {
        match self.store.invalidate() {
            Some(ticket) => self.load(ticket).await.map(Some),
            None => Ok(None),
        }
    }

    pub fn logout(&self) {
        self.store.logout();
    }

    /// Fetch for `ticket`, retrying transient failures while the ticket is
    /// still the newest one, then hand the result to the store.
    pub async fn load(&self, ticket: FetchTicket) -> Result<CommitOutcome, PolicyFetchError> {
        let mut retries = 0;
        loop {
            match self.fetch(&ticket).await {
                Ok(rules) => return Ok(self.store.commit(&ticket, rules)),
                Err(err) => {
                    let worth_retrying = err.is_retryable()
                        && self.retry.should_retry(retries)
                        && self.store.is_latest(&ticket);
                    if !worth_retrying {
                        self.store.fail(&ticket, &err);
                        return Err(err);
                    }

                    retries += 1;
                    let delay = self.retry.delay_for_retry(retries);
                    tracing::warn!(
                        org_id = %ticket.session.org_id,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "policy fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn fetch(&self, ticket: &FetchTicket) -> Result<RuleSet, PolicyFetchError> {
        let payload = self.source.fetch_policy(&ticket.session).await?;
        Ok(payload.into_rule_set()?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::policy_store::{InMemoryPolicySource, PolicyStatus};
    use eventdesk_auth::{PolicyPayload, RoleCode, Rule};
    use eventdesk_core::{OrgId, UserId};

    fn session(org: &str) -> SessionContext {
        SessionContext::new(UserId::new("u1"), OrgId::new(org), RoleCode::ADMIN)
    }

    fn payload(version: &str, rules: Vec<Rule>) -> PolicyPayload {
        PolicyPayload {
            rules,
            version: version.to_string(),
        }
    }

    fn quick_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy::fixed(max_retries, Duration::ZERO)
    }

    #[tokio::test]
    async fn login_loads_org_policy() {
        let source = InMemoryPolicySource::new()
            .with_policy(OrgId::new("org-1"), payload("v1", vec![Rule::allow("read", "Event")]));
        let loader = PolicyLoader::new(PolicyStore::arc(), source);

        let outcome = loader.login(session("org-1")).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed(PolicyStatus::Ready));
        assert!(loader.store().can("read", "Event", None));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let source = InMemoryPolicySource::new()
            .with_policy(OrgId::new("org-1"), payload("v1", vec![Rule::allow("read", "Event")]));
        source.fail_next(PolicyFetchError::Network("reset".into()));
        source.fail_next(PolicyFetchError::Status(502));

        let loader = PolicyLoader::new(PolicyStore::arc(), source).with_retry(quick_retry(2));
        loader.login(session("org-1")).await.unwrap();

        assert_eq!(loader.source().fetch_count(), 3);
        assert_eq!(loader.store().status(), PolicyStatus::Ready);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let source = InMemoryPolicySource::new();
        let loader = PolicyLoader::new(PolicyStore::arc(), source).with_retry(quick_retry(5));

        let err = loader.login(session("org-404")).await.unwrap_err();
        assert_eq!(err, PolicyFetchError::NotFound(OrgId::new("org-404")));
        assert_eq!(loader.source().fetch_count(), 1);
        assert_eq!(loader.store().status(), PolicyStatus::Stale);
        assert!(!loader.store().can("read", "Event", None));
    }

    #[tokio::test]
    async fn invalid_payload_surfaces_as_policy_error() {
        let source = InMemoryPolicySource::new()
            .with_policy(OrgId::new("org-1"), payload("v1", vec![Rule::allow("", "Event")]));
        let loader = PolicyLoader::new(PolicyStore::arc(), source).with_retry(quick_retry(3));

        let err = loader.login(session("org-1")).await.unwrap_err();
        assert!(matches!(err, PolicyFetchError::Policy(_)));
        assert_eq!(loader.source().fetch_count(), 1);
    }

    #[tokio::test]
    async fn refresh_picks_up_new_policy_and_keeps_old_on_failure() {
        let source = Arc::new(InMemoryPolicySource::new().with_policy(
            OrgId::new("org-1"),
            payload("v1", vec![Rule::allow("read", "Event")]),
        ));
        let loader =
            PolicyLoader::new(PolicyStore::arc(), source.clone()).with_retry(quick_retry(0));
        loader.login(session("org-1")).await.unwrap();

        source.set_policy(
            OrgId::new("org-1"),
            payload("v2", vec![Rule::allow("read", "Event"), Rule::allow("print", "Badge")]),
        );
        let outcome = loader.refresh().await.unwrap();
        assert_eq!(outcome, Some(CommitOutcome::Committed(PolicyStatus::Ready)));
        assert!(loader.store().can("print", "Badge", None));

        source.fail_next(PolicyFetchError::Status(503));
        assert!(loader.refresh().await.is_err());
        assert_eq!(loader.store().status(), PolicyStatus::Stale);
        assert!(loader.store().can("print", "Badge", None));
    }

    #[tokio::test]
    async fn refresh_without_session_is_a_no_op() {
        let loader = PolicyLoader::new(PolicyStore::arc(), InMemoryPolicySource::new());
        assert_eq!(loader.refresh().await.unwrap(), None);
        assert_eq!(loader.source().fetch_count(), 0);
    }
}
