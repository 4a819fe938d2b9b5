use serde::{Deserialize, Serialize};

use eventdesk_core::{OrgId, SessionId, UserId};

use crate::RoleCode;

/// The authenticated identity a policy is fetched for.
///
/// This is a boundary object: it states *who* is signed in, *which
/// organization* they are acting within, and the role the hierarchy checker
/// places them at. Token handling stays with the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub org_id: OrgId,
    pub role: RoleCode,
}

impl SessionContext {
    /// Start a context for a fresh login, minting a new session id.
    pub fn new(user_id: UserId, org_id: OrgId, role: RoleCode) -> Self {
        Self {
            session_id: SessionId::new(),
            user_id,
            org_id,
            role,
        }
    }

    /// Same user and role, switched to another organization.
    ///
    /// A new session id is minted: rules fetched for the previous organization
    /// must never be committed under the new one.
    pub fn switch_org(&self, org_id: OrgId) -> Self {
        Self::new(self.user_id.clone(), org_id, self.role.clone())
    }
}
