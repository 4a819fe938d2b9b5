use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use eventdesk_auth::{PolicyError, PolicyPayload, SessionContext};
use eventdesk_core::OrgId;

/// Failure to obtain a policy from the backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyFetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("session is not authorized to read its policy")]
    Unauthorized,

    #[error("no policy for organization {0}")]
    NotFound(OrgId),

    #[error("backend responded with status {0}")]
    Status(u16),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl PolicyFetchError {
    /// Transient failures worth retrying; auth and payload errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::Unauthorized | Self::NotFound(_) | Self::Policy(_) => false,
        }
    }
}

/// Where policies come from.
///
/// Implementations perform one authenticated fetch keyed by the session's
/// organization and return the payload as issued; validation happens in the
/// loader.
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn fetch_policy(
        &self,
        session: &SessionContext,
    ) -> Result<PolicyPayload, PolicyFetchError>;
}

#[async_trait]
impl<S: PolicySource + ?Sized> PolicySource for Arc<S> {
    async fn fetch_policy(
        &self,
        session: &SessionContext,
    ) -> Result<PolicyPayload, PolicyFetchError> {
        (**self).fetch_policy(session).await
    }
}
