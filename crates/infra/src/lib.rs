//! Infrastructure layer: policy fetching, caching, config.

pub mod config;
pub mod loader;
pub mod policy_store;
pub mod retry;

pub use config::{ConfigError, InfraConfig};
pub use loader::PolicyLoader;
pub use retry::{BackoffStrategy, RetryPolicy};

#[cfg(test)]
mod integration_tests;
