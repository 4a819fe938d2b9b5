use async_trait::async_trait;
use reqwest::StatusCode;

use eventdesk_auth::{PolicyError, PolicyPayload, SessionContext};
use eventdesk_core::OrgId;

use crate::config::InfraConfig;

use super::source::{PolicyFetchError, PolicySource};

/// Fetches policies from the dashboard backend over HTTP.
///
/// `GET {base_url}/organizations/{org_id}/ability` with a bearer token; the
/// response body is the policy payload.
#[derive(Debug, Clone)]
pub struct HttpPolicySource {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpPolicySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: None,
        }
    }

    pub fn from_config(config: &InfraConfig) -> Self {
        Self::new(config.api_url.clone())
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Swap the token after the session layer refreshed it.
    pub fn set_bearer_token(&mut self, token: Option<String>) {
        self.bearer_token = token;
    }

    pub fn policy_url(&self, org_id: &OrgId) -> String {
        format!("{}/organizations/{}/ability", self.base_url, org_id)
    }
}

#[async_trait]
impl PolicySource for HttpPolicySource {
    async fn fetch_policy(
        &self,
        session: &SessionContext,
    ) -> Result<PolicyPayload, PolicyFetchError> {
        let url = self.policy_url(&session.org_id);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PolicyFetchError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(PolicyFetchError::Unauthorized);
            }
            StatusCode::NOT_FOUND => {
                return Err(PolicyFetchError::NotFound(session.org_id.clone()));
            }
            status if !status.is_success() => {
                return Err(PolicyFetchError::Status(status.as_u16()));
            }
            _ => {}
        }

        response
            .json::<PolicyPayload>()
            .await
            .map_err(|e| PolicyFetchError::Policy(PolicyError::Decode(e.to_string())))
    }
}
