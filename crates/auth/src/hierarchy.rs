//! Role hierarchy checks: who may act on whom, and which roles may be granted.
//!
//! Independent of the ability rules. Every check is a pure function of its
//! inputs and the level table, so it is safe to call on every render.
//!
//! Unknown role codes fail closed: an actor whose role is not in the table
//! can act on nobody, and a target whose role is not in the table cannot be
//! acted on.

use serde::Serialize;
use thiserror::Error;

use eventdesk_core::UserId;

use crate::roles::{RoleCode, RoleDescriptor, RoleLevel, RoleLevelTable};

/// Why a hierarchy check refused.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum HierarchyDenial {
    #[error("self-modification forbidden")]
    SelfModification,

    #[error(
        "role {acting} (level {acting_level}) cannot act on role {target} (level {target_level})"
    )]
    InsufficientPrivilege {
        acting: String,
        acting_level: RoleLevel,
        target: String,
        target_level: RoleLevel,
    },

    #[error("unknown role: {code}")]
    UnknownRole { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyUserDecision {
    pub can_modify: bool,
    pub can_assign_role: bool,
    pub reason: Option<HierarchyDenial>,
}

impl ModifyUserDecision {
    fn allowed() -> Self {
        Self {
            can_modify: true,
            can_assign_role: true,
            reason: None,
        }
    }

    fn denied(reason: HierarchyDenial) -> Self {
        Self {
            can_modify: false,
            can_assign_role: false,
            reason: Some(reason),
        }
    }

    /// Human-readable reason, if the decision is a denial.
    pub fn reason_text(&self) -> Option<String> {
        self.reason.as_ref().map(ToString::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleDecision {
    pub can_assign: bool,
    pub reason: Option<HierarchyDenial>,
}

impl AssignRoleDecision {
    pub fn reason_text(&self) -> Option<String> {
        self.reason.as_ref().map(ToString::to_string)
    }
}

/// Hierarchy checker over a [`RoleLevelTable`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleHierarchy {
    table: RoleLevelTable,
}

impl RoleHierarchy {
    pub fn new(table: RoleLevelTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RoleLevelTable {
        &self.table
    }

    pub fn level_of(&self, role: &RoleCode) -> Option<RoleLevel> {
        self.table.level_of(role)
    }

    /// Whether `acting_role` may modify a user holding `target_role`.
    ///
    /// A user may never modify themselves through this path. Otherwise the
    /// target must sit strictly below the actor (higher level number).
    pub fn can_modify_user(
        &self,
        acting_role: &RoleCode,
        target_role: &RoleCode,
        acting_user_id: &UserId,
        target_user_id: &UserId,
    ) -> ModifyUserDecision {
        if acting_user_id == target_user_id {
            return ModifyUserDecision::denied(HierarchyDenial::SelfModification);
        }

        match self.compare(acting_role, target_role) {
            Ok(()) => ModifyUserDecision::allowed(),
            Err(reason) => ModifyUserDecision::denied(reason),
        }
    }

    /// Whether `acting_role` may grant `role_to_assign`.
    pub fn can_assign_role(
        &self,
        acting_role: &RoleCode,
        role_to_assign: &RoleCode,
    ) -> AssignRoleDecision {
        match self.compare(acting_role, role_to_assign) {
            Ok(()) => AssignRoleDecision {
                can_assign: true,
                reason: None,
            },
            Err(reason) => AssignRoleDecision {
                can_assign: false,
                reason: Some(reason),
            },
        }
    }

    /// Keep the candidates strictly below `acting_role`, preserving order.
    ///
    /// A candidate's explicit `level` wins over the table; candidates with
    /// neither are dropped.
    pub fn filter_assignable_roles(
        &self,
        acting_role: &RoleCode,
        roles: &[RoleDescriptor],
    ) -> Vec<RoleDescriptor> {
        let Some(acting_level) = self.level_of(acting_role) else {
            return Vec::new();
        };

        roles
            .iter()
            .filter(|role| {
                role.level
                    .or_else(|| self.level_of(&role.code))
                    .is_some_and(|level| level > acting_level)
            })
            .cloned()
            .collect()
    }

    fn compare(&self, acting: &RoleCode, target: &RoleCode) -> Result<(), HierarchyDenial> {
        let acting_level = self
            .level_of(acting)
            .ok_or_else(|| HierarchyDenial::UnknownRole {
                code: acting.to_string(),
            })?;
        let target_level = self
            .level_of(target)
            .ok_or_else(|| HierarchyDenial::UnknownRole {
                code: target.to_string(),
            })?;

        if target_level <= acting_level {
            return Err(HierarchyDenial::InsufficientPrivilege {
                acting: acting.to_string(),
                acting_level,
                target: target.to_string(),
                target_level,
            });
        }
        Ok(())
    }
}
