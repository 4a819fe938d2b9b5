//! Environment-driven configuration for the policy loader.
//!
//! | Variable                          | Default                     |
//! |-----------------------------------|-----------------------------|
//! | `EVENTDESK_API_URL`               | `http://localhost:3000/api` |
//! | `EVENTDESK_POLICY_MAX_ATTEMPTS`   | `3`                         |
//! | `EVENTDESK_POLICY_BASE_DELAY_MS`  | `250`                       |
//! | `EVENTDESK_POLICY_MAX_DELAY_MS`   | `5000`                      |
//! | `EVENTDESK_ROLE_LEVELS_FILE`      | unset (builtin table)       |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;

use eventdesk_auth::{RoleHierarchy, RoleLevelTable};

use crate::retry::RetryPolicy;

pub const API_URL_VAR: &str = "EVENTDESK_API_URL";
pub const MAX_ATTEMPTS_VAR: &str = "EVENTDESK_POLICY_MAX_ATTEMPTS";
pub const BASE_DELAY_VAR: &str = "EVENTDESK_POLICY_BASE_DELAY_MS";
pub const MAX_DELAY_VAR: &str = "EVENTDESK_POLICY_MAX_DELAY_MS";
pub const ROLE_LEVELS_FILE_VAR: &str = "EVENTDESK_ROLE_LEVELS_FILE";

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 250;
const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} is set but empty")]
    Empty { var: &'static str },

    #[error("{var} must be at least 1")]
    ZeroAttempts { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    /// Base URL of the backend API, without trailing slash.
    pub api_url: String,
    pub retry: RetryPolicy,
    /// JSON role table replacing the builtin levels.
    pub role_levels_file: Option<PathBuf>,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            retry: RetryPolicy::exponential(
                DEFAULT_MAX_ATTEMPTS - 1,
                Duration::from_millis(DEFAULT_BASE_DELAY_MS),
                Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            ),
            role_levels_file: None,
        }
    }
}

impl InfraConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = match lookup(API_URL_VAR) {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::Empty { var: API_URL_VAR });
            }
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => {
                tracing::warn!(
                    var = API_URL_VAR,
                    default = DEFAULT_API_URL,
                    "API url not set, using default"
                );
                DEFAULT_API_URL.to_string()
            }
        };

        let max_attempts = number(&lookup, MAX_ATTEMPTS_VAR, u64::from(DEFAULT_MAX_ATTEMPTS))?;
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts { var: MAX_ATTEMPTS_VAR });
        }
        let max_retries = u32::try_from(max_attempts - 1).map_err(|_| ConfigError::InvalidNumber {
            var: MAX_ATTEMPTS_VAR,
            value: max_attempts.to_string(),
        })?;
        let base_delay = number(&lookup, BASE_DELAY_VAR, DEFAULT_BASE_DELAY_MS)?;
        let max_delay = number(&lookup, MAX_DELAY_VAR, DEFAULT_MAX_DELAY_MS)?;

        let role_levels_file = lookup(ROLE_LEVELS_FILE_VAR)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api_url,
            retry: RetryPolicy::exponential(
                max_retries,
                Duration::from_millis(base_delay),
                Duration::from_millis(max_delay.max(base_delay)),
            ),
            role_levels_file,
        })
    }

    /// The role hierarchy to use: the configured file, or the builtin table.
    pub fn load_role_hierarchy(&self) -> anyhow::Result<RoleHierarchy> {
        let Some(path) = &self.role_levels_file else {
            return Ok(RoleHierarchy::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read role table {}", path.display()))?;
        let table = RoleLevelTable::from_json(&raw)
            .with_context(|| format!("invalid role table {}", path.display()))?;

        tracing::info!(path = %path.display(), roles = table.len(), "loaded role table");
        Ok(RoleHierarchy::new(table))
    }
}

fn number(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use eventdesk_auth::RoleCode;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = InfraConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, InfraConfig::default());
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.role_levels_file.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = InfraConfig::from_lookup(lookup(&[
            (API_URL_VAR, "https://api.example.test/v2/"),
            (MAX_ATTEMPTS_VAR, "1"),
            (BASE_DELAY_VAR, "10"),
            (MAX_DELAY_VAR, "40"),
            (ROLE_LEVELS_FILE_VAR, "/etc/eventdesk/roles.json"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://api.example.test/v2");
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.retry.max_delay, Duration::from_millis(40));
        assert_eq!(
            config.role_levels_file,
            Some(PathBuf::from("/etc/eventdesk/roles.json"))
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            InfraConfig::from_lookup(lookup(&[(MAX_ATTEMPTS_VAR, "three")])).unwrap_err(),
            ConfigError::InvalidNumber {
                var: MAX_ATTEMPTS_VAR,
                value: "three".to_string()
            }
        );
        assert_eq!(
            InfraConfig::from_lookup(lookup(&[(MAX_ATTEMPTS_VAR, "0")])).unwrap_err(),
            ConfigError::ZeroAttempts { var: MAX_ATTEMPTS_VAR }
        );
        assert_eq!(
            InfraConfig::from_lookup(lookup(&[(API_URL_VAR, "  ")])).unwrap_err(),
            ConfigError::Empty { var: API_URL_VAR }
        );
    }

    #[test]
    fn builtin_hierarchy_without_file() {
        let hierarchy = InfraConfig::default().load_role_hierarchy().unwrap();
        assert_eq!(hierarchy.level_of(&RoleCode::HOSTESS), Some(6));
    }

    #[test]
    fn role_table_file_is_loaded() {
        let path = std::env::temp_dir()
            .join(format!("eventdesk-roles-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"code":"OWNER","level":1},{"code":"CLERK","level":4}]"#,
        )
        .unwrap();

        let config = InfraConfig {
            role_levels_file: Some(path.clone()),
            ..InfraConfig::default()
        };
        let hierarchy = config.load_role_hierarchy().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(hierarchy.level_of(&RoleCode::new("CLERK")), Some(4));
        assert_eq!(hierarchy.level_of(&RoleCode::ADMIN), None);
    }

    #[test]
    fn missing_role_table_file_is_an_error_with_context() {
        let config = InfraConfig {
            role_levels_file: Some(PathBuf::from("/nonexistent/eventdesk/roles.json")),
            ..InfraConfig::default()
        };
        let err = config.load_role_hierarchy().unwrap_err();
        assert!(err.to_string().contains("failed to read role table"));
    }
}
