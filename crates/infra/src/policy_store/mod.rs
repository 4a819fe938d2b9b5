//! Session policy storage and the sources that feed it.
//!
//! The store is storage-agnostic: sources fetch payloads, the loader
//! validates and commits them, and readers evaluate against snapshots.

#[cfg(feature = "http")]
pub mod http;
pub mod in_memory;
pub mod source;
pub mod store;

#[cfg(feature = "http")]
pub use http::HttpPolicySource;
pub use in_memory::InMemoryPolicySource;
pub use source::{PolicyFetchError, PolicySource};
pub use store::{CommitOutcome, FetchTicket, PolicySnapshot, PolicyStatus, PolicyStore};
