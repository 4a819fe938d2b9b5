//! `eventdesk-core` — shared identifiers and the domain error model.
//!
//! This crate has no infrastructure concerns and no async code.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{OrgId, SessionId, UserId};
