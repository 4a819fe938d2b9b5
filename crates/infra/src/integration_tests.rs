//! Integration tests for the full policy lifecycle.
//!
//! Tests: Source → Loader → Store → evaluation
//!
//! Verifies:
//! - Login, refresh and logout drive the status machine correctly
//! - Late fetch results never resurrect a discarded session
//! - Out-of-order results never overwrite a newer rule set

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Notify, oneshot};

    use eventdesk_auth::{PolicyPayload, Record, RoleCode, Rule, SessionContext};
    use eventdesk_core::{OrgId, UserId};

    use crate::loader::PolicyLoader;
    use crate::policy_store::{
        CommitOutcome, InMemoryPolicySource, PolicyFetchError, PolicySource, PolicyStatus,
        PolicyStore,
    };
    use crate::retry::RetryPolicy;

    fn session(org: &str, role: RoleCode) -> SessionContext {
        SessionContext::new(UserId::new("user-1"), OrgId::new(org), role)
    }

    fn payload(version: &str, rules: Vec<Rule>) -> PolicyPayload {
        PolicyPayload {
            rules,
            version: version.to_string(),
        }
    }

    /// Source whose fetches block until the test releases them, one gate per call.
    #[derive(Default)]
    struct GatedSource {
        gates: Mutex<Vec<oneshot::Receiver<Result<PolicyPayload, PolicyFetchError>>>>,
        started: Notify,
    }

    impl GatedSource {
        fn push_gate(&self) -> oneshot::Sender<Result<PolicyPayload, PolicyFetchError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push(rx);
            tx
        }
    }

    #[async_trait]
    impl PolicySource for GatedSource {
        async fn fetch_policy(
            &self,
            _session: &SessionContext,
        ) -> Result<PolicyPayload, PolicyFetchError> {
            let gate = self.gates.lock().unwrap().remove(0);
            self.started.notify_one();
            gate.await
                .unwrap_or_else(|_| Err(PolicyFetchError::Network("gate dropped".into())))
        }
    }

    #[tokio::test]
    async fn hostess_session_lifecycle() {
        eventdesk_observability::init();

        let org = OrgId::new("org-venue");
        let source = Arc::new(InMemoryPolicySource::new().with_policy(
            org.clone(),
            payload(
                "2024-06-01T00:00:00Z",
                vec![
                    Rule::allow("read", "Attendee").when("orgId", "org-venue"),
                    Rule::allow("print", "Badge"),
                    Rule::deny("print", "Badge").when("status", "revoked"),
                ],
            ),
        ));
        let store = PolicyStore::arc();
        let loader = PolicyLoader::new(store.clone(), source.clone())
            .with_retry(RetryPolicy::no_retry());

        assert!(!store.can("print", "Badge", None));
        loader.login(session("org-venue", RoleCode::HOSTESS)).await.unwrap();
        assert_eq!(store.status(), PolicyStatus::Ready);

        let attendee = Record::new().with("orgId", "org-venue");
        let other = Record::new().with("orgId", "org-elsewhere");
        assert!(store.can("read", "Attendee", Some(&attendee)));
        assert!(!store.can("read", "Attendee", Some(&other)));
        assert!(!store.can("read", "Attendee", None));

        let revoked = Record::new().with("status", "revoked");
        assert!(store.can("print", "Badge", None));
        assert!(!store.can("print", "Badge", Some(&revoked)));

        loader.logout();
        assert_eq!(store.status(), PolicyStatus::Discarded);
        assert!(!store.can("print", "Badge", None));
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn logout_during_fetch_discards_the_result() {
        let source = Arc::new(GatedSource::default());
        let gate = source.push_gate();
        let store = PolicyStore::arc();
        let loader = Arc::new(PolicyLoader::new(store.clone(), source.clone()));

        let pending = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.login(session("org-1", RoleCode::ADMIN)).await })
        };
        source.started.notified().await;

        loader.logout();
        gate.send(Ok(payload("v1", vec![Rule::allow("manage", "all")])))
            .unwrap();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, CommitOutcome::StaleEpoch);
        assert_eq!(store.status(), PolicyStatus::Discarded);
        assert!(!store.can("delete", "Event", None));
    }

    #[tokio::test]
    async fn older_result_cannot_overwrite_newer_one() {
        let source = Arc::new(GatedSource::default());
        let first_gate = source.push_gate();
        let second_gate = source.push_gate();
        let store = PolicyStore::arc();
        let loader = Arc::new(PolicyLoader::new(store.clone(), source.clone()));

        let first = store.begin_session(session("org-1", RoleCode::MANAGER));
        let first_fetch = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load(first).await })
        };
        source.started.notified().await;

        let second = store.invalidate().unwrap();
        let second_fetch = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load(second).await })
        };
        source.started.notified().await;

        // The newer fetch finishes first.
        second_gate
            .send(Ok(payload("v2", vec![Rule::allow("update", "Event")])))
            .unwrap();
        assert_eq!(
            second_fetch.await.unwrap().unwrap(),
            CommitOutcome::Committed(PolicyStatus::Ready)
        );

        first_gate
            .send(Ok(payload("v1", vec![Rule::allow("read", "Event")])))
            .unwrap();
        assert_eq!(first_fetch.await.unwrap().unwrap(), CommitOutcome::Superseded);

        assert_eq!(store.status(), PolicyStatus::Ready);
        assert!(store.can("update", "Event", None));
        assert!(!store.can("read", "Event", None));
        assert_eq!(store.snapshot().version().map(|v| v.as_str()), Some("v2"));
    }

    #[tokio::test]
    async fn switching_org_starts_a_fresh_session() {
        let source = Arc::new(
            InMemoryPolicySource::new()
                .with_policy(
                    OrgId::new("org-a"),
                    payload("a1", vec![Rule::allow("manage", "Event")]),
                )
                .with_policy(
                    OrgId::new("org-b"),
                    payload("b1", vec![Rule::allow("read", "Event")]),
                ),
        );
        let store = PolicyStore::arc();
        let loader = PolicyLoader::new(store.clone(), source);

        let ctx = session("org-a", RoleCode::ADMIN);
        loader.login(ctx.clone()).await.unwrap();
        let epoch_a = store.snapshot().epoch;
        assert!(store.can("delete", "Event", None));

        loader.login(ctx.switch_org(OrgId::new("org-b"))).await.unwrap();
        assert!(store.snapshot().epoch > epoch_a);
        assert!(!store.can("delete", "Event", None));
        assert!(store.can("read", "Event", None));
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let source = InMemoryPolicySource::new()
            .with_policy(OrgId::new("org-1"), payload("v1", vec![Rule::allow("read", "Event")]));
        let store = PolicyStore::arc();
        let mut updates = store.subscribe();
        let loader = PolicyLoader::new(store.clone(), source)
            .with_retry(RetryPolicy::fixed(1, Duration::ZERO));

        loader.login(session("org-1", RoleCode::VIEWER)).await.unwrap();

        assert!(updates.has_changed().unwrap());
        let latest = updates.borrow_and_update().clone();
        assert_eq!(latest.status, PolicyStatus::Ready);
        assert_eq!(latest.rules.len(), 1);
        assert!(latest.refreshed_at.is_some());
    }
}
