//! `eventdesk-auth` — pure ability evaluation and role hierarchy checks.
//!
//! This crate is intentionally decoupled from HTTP, storage and async
//! runtimes. Everything here is synchronous and side-effect free.

pub mod ability;
pub mod explain;
pub mod gate;
pub mod hierarchy;
pub mod policy;
pub mod principal;
pub mod record;
pub mod roles;
pub mod rule;

pub use ability::{
    AbilityError, PolicyVersion, Query, RuleSet, authorize, can, cannot, relevant_rule,
};
pub use explain::{AbilityExplanation, DenialKind, explain};
pub use gate::{Check, Gated, NavigationGuard, guard};
pub use hierarchy::{AssignRoleDecision, HierarchyDenial, ModifyUserDecision, RoleHierarchy};
pub use policy::{PolicyError, PolicyPayload};
pub use principal::SessionContext;
pub use record::{Conditions, FieldValue, Record};
pub use roles::{RoleCode, RoleDescriptor, RoleLevel, RoleLevelTable, RoleTableError};
pub use rule::{Action, Effect, Rule, Subject};
