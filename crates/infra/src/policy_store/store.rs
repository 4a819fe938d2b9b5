use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use eventdesk_auth::{PolicyVersion, Record, RuleSet, SessionContext};

/// Lifecycle of the session's policy.
///
/// ```text
/// Uninitialized ──begin_session──▶ Loading ──commit──▶ Ready
///                                    ▲  │                │
///                                    │  └──fail──▶ Stale │
///                                    └────invalidate─────┘
/// any ──logout──▶ Discarded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Uninitialized,
    Loading,
    Ready,
    /// Last fetch failed; serving the last known good rules (possibly none).
    Stale,
    Discarded,
}

/// Authorization to commit the result of one policy fetch.
///
/// Carries the session epoch at issue time and a request number that grows
/// with every issued fetch, so late results can be recognized and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub epoch: u64,
    pub request: u64,
    pub session: SessionContext,
}

/// What happened to a fetch result handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The result was recorded; the store is now in this status.
    Committed(PolicyStatus),
    /// The session the fetch belonged to has ended; result dropped.
    StaleEpoch,
    /// A newer request was already resolved (or is pending); result dropped.
    Superseded,
}

/// Point-in-time view of the store, as published to subscribers.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    pub status: PolicyStatus,
    pub session: Option<SessionContext>,
    pub epoch: u64,
    pub rules: Arc<RuleSet>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    latest_request: u64,
    /// Newest request that has been committed or has failed as the latest.
    resolved_request: u64,
}

impl PolicySnapshot {
    fn initial() -> Self {
        Self {
            status: PolicyStatus::Uninitialized,
            session: None,
            epoch: 0,
            rules: Arc::new(RuleSet::empty()),
            refreshed_at: None,
            last_error: None,
            latest_request: 0,
            resolved_request: 0,
        }
    }

    pub fn version(&self) -> Option<&PolicyVersion> {
        self.rules.version()
    }

    fn issue(&mut self) -> (u64, u64) {
        self.latest_request += 1;
        (self.epoch, self.latest_request)
    }
}

/// Single-slot, versioned holder of the current session's rule set.
///
/// One writer (fetch completion), many readers (every render). Readers never
/// block on a fetch: they see the last committed rules until a replacement is
/// committed. All transitions are applied atomically inside the watch slot.
#[derive(Debug)]
pub struct PolicyStore {
    slot: watch::Sender<PolicySnapshot>,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyStore {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(PolicySnapshot::initial());
        Self { slot }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Readers
    // ─────────────────────────────────────────────────────────────────────

    /// The rules to evaluate against right now. Empty means deny-all.
    pub fn rules(&self) -> Arc<RuleSet> {
        self.slot.borrow().rules.clone()
    }

    pub fn status(&self) -> PolicyStatus {
        self.slot.borrow().status
    }

    pub fn session(&self) -> Option<SessionContext> {
        self.slot.borrow().session.clone()
    }

    pub fn snapshot(&self) -> PolicySnapshot {
        self.slot.borrow().clone()
    }

    /// Evaluate against the current rules without cloning them.
    pub fn can(&self, action: &str, subject: &str, record: Option<&Record>) -> bool {
        self.slot.borrow().rules.can(action, subject, record)
    }

    /// Receive every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PolicySnapshot> {
        self.slot.subscribe()
    }

    /// Whether `ticket` is still the newest fetch of the current session.
    pub fn is_latest(&self, ticket: &FetchTicket) -> bool {
        let snapshot = self.slot.borrow();
        snapshot.epoch == ticket.epoch && snapshot.latest_request == ticket.request
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────

    /// Start a new session after successful authentication.
    ///
    /// Rules from any previous session are dropped; every check denies until
    /// the returned ticket is committed.
    pub fn begin_session(&self, session: SessionContext) -> FetchTicket {
        let mut issued = (0, 0);
        let for_ticket = session.clone();
        self.slot.send_modify(|s| {
            s.epoch += 1;
            s.status = PolicyStatus::Loading;
            s.session = Some(session);
            s.rules = Arc::new(RuleSet::empty());
            s.refreshed_at = None;
            s.last_error = None;
            s.resolved_request = 0;
            issued = s.issue();
        });

        tracing::info!(
            session_id = %for_ticket.session_id,
            org_id = %for_ticket.org_id,
            epoch = issued.0,
            "policy session started"
        );

        FetchTicket {
            epoch: issued.0,
            request: issued.1,
            session: for_ticket,
        }
    }

    /// Request a re-fetch after a role or permission change.
    ///
    /// Cached rules keep being served while loading. Returns `None` when no
    /// session is active.
    pub fn invalidate(&self) -> Option<FetchTicket> {
        let mut ticket = None;
        self.slot.send_if_modified(|s| {
            let Some(session) = s.session.clone() else {
                return false;
            };
            let (epoch, request) = s.issue();
            s.status = PolicyStatus::Loading;
            ticket = Some(FetchTicket {
                epoch,
                request,
                session,
            });
            true
        });

        if let Some(t) = &ticket {
            tracing::debug!(epoch = t.epoch, request = t.request, "policy invalidated");
        }
        ticket
    }

    /// Record a successfully fetched rule set.
    pub fn commit(&self, ticket: &FetchTicket, rules: RuleSet) -> CommitOutcome {
        let version = rules.version().cloned();
        let mut outcome = CommitOutcome::Superseded;
        self.slot.send_if_modified(|s| {
            if let Some(rejected) = Self::reject(s, ticket) {
                outcome = rejected;
                return false;
            }

            s.resolved_request = ticket.request;
            s.rules = Arc::new(rules);
            s.refreshed_at = Some(Utc::now());
            s.last_error = None;
            s.status = if ticket.request == s.latest_request {
                PolicyStatus::Ready
            } else {
                PolicyStatus::Loading
            };
            outcome = CommitOutcome::Committed(s.status);
            true
        });

        match outcome {
            CommitOutcome::Committed(status) => tracing::info!(
                epoch = ticket.epoch,
                request = ticket.request,
                version = version.as_ref().map(PolicyVersion::as_str),
                ?status,
                "policy committed"
            ),
            CommitOutcome::StaleEpoch | CommitOutcome::Superseded => tracing::warn!(
                epoch = ticket.epoch,
                request = ticket.request,
                ?outcome,
                "discarded policy fetch result"
            ),
        }
        outcome
    }

    /// Record a failed fetch: keep the last known good rules and go `Stale`.
    ///
    /// Failures of superseded or foreign-session fetches are ignored.
    pub fn fail(&self, ticket: &FetchTicket, error: &impl core::fmt::Display) -> CommitOutcome {
        let message = error.to_string();
        let mut outcome = CommitOutcome::Superseded;
        self.slot.send_if_modified(|s| {
            if let Some(rejected) = Self::reject(s, ticket) {
                outcome = rejected;
                return false;
            }
            if ticket.request != s.latest_request {
                // A newer fetch is in flight; let it decide.
                return false;
            }

            s.resolved_request = ticket.request;
            s.status = PolicyStatus::Stale;
            s.last_error = Some(message.clone());
            outcome = CommitOutcome::Committed(PolicyStatus::Stale);
            true
        });

        tracing::warn!(
            epoch = ticket.epoch,
            request = ticket.request,
            error = %message,
            ?outcome,
            "policy fetch failed"
        );
        outcome
    }

    /// End the session: drop all rules and invalidate every in-flight fetch.
    pub fn logout(&self) {
        let mut epoch = 0;
        self.slot.send_modify(|s| {
            s.epoch += 1;
            s.status = PolicyStatus::Discarded;
            s.session = None;
            s.rules = Arc::new(RuleSet::empty());
            s.refreshed_at = None;
            s.last_error = None;
            epoch = s.epoch;
        });
        tracing::info!(epoch, "policy session discarded");
    }

    fn reject(s: &PolicySnapshot, ticket: &FetchTicket) -> Option<CommitOutcome> {
        if s.session.is_none() || s.epoch != ticket.epoch {
            return Some(CommitOutcome::StaleEpoch);
        }
        if ticket.request <= s.resolved_request {
            return Some(CommitOutcome::Superseded);
        }
        None
    }
}
