use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role code used by the hierarchy checker (e.g. `"ADMIN"`).
///
/// Role codes are opaque at this layer; what a role may do is expressed by the
/// policy rules, and where it sits in the hierarchy by the [`RoleLevelTable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleCode(Cow<'static, str>);

impl RoleCode {
    pub const SUPER_ADMIN: RoleCode = RoleCode(Cow::Borrowed("SUPER_ADMIN"));
    pub const ADMIN: RoleCode = RoleCode(Cow::Borrowed("ADMIN"));
    pub const MANAGER: RoleCode = RoleCode(Cow::Borrowed("MANAGER"));
    pub const PARTNER: RoleCode = RoleCode(Cow::Borrowed("PARTNER"));
    pub const VIEWER: RoleCode = RoleCode(Cow::Borrowed("VIEWER"));
    pub const HOSTESS: RoleCode = RoleCode(Cow::Borrowed("HOSTESS"));

    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position in the role hierarchy. Lower is more privileged.
pub type RoleLevel = u32;

/// A role as listed by the backend: `{ "code": "MANAGER", "level": 3 }`.
///
/// `level` is optional on the wire; when absent the static table decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    pub code: RoleCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<RoleLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RoleDescriptor {
    pub fn new(code: RoleCode, level: RoleLevel) -> Self {
        Self {
            code,
            level: Some(level),
            name: None,
        }
    }

    /// A descriptor without an explicit level.
    pub fn unleveled(code: RoleCode) -> Self {
        Self {
            code,
            level: None,
            name: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleTableError {
    #[error("role table could not be decoded: {0}")]
    Decode(String),

    #[error("role table is empty")]
    Empty,

    #[error("role '{0}' appears more than once")]
    DuplicateCode(String),

    #[error("role '{0}' has no level")]
    MissingLevel(String),
}

/// Static mapping from role code to level.
///
/// Invariant: exactly one level per role code. Built once at startup and not
/// edited at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLevelTable {
    levels: HashMap<RoleCode, RoleLevel>,
}

impl RoleLevelTable {
    /// The default hierarchy shipped with the dashboard.
    pub fn builtin() -> Self {
        let levels = [
            (RoleCode::SUPER_ADMIN, 1),
            (RoleCode::ADMIN, 2),
            (RoleCode::MANAGER, 3),
            (RoleCode::PARTNER, 4),
            (RoleCode::VIEWER, 5),
            (RoleCode::HOSTESS, 6),
        ]
        .into_iter()
        .collect();
        Self { levels }
    }

    /// Build a table from descriptors; every entry needs a level and a unique code.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = RoleDescriptor>,
    ) -> Result<Self, RoleTableError> {
        let mut levels = HashMap::new();
        for descriptor in descriptors {
            let level = descriptor
                .level
                .ok_or_else(|| RoleTableError::MissingLevel(descriptor.code.to_string()))?;
            let code = descriptor.code;
            if levels.contains_key(&code) {
                return Err(RoleTableError::DuplicateCode(code.to_string()));
            }
            levels.insert(code, level);
        }

        if levels.is_empty() {
            return Err(RoleTableError::Empty);
        }
        Ok(Self { levels })
    }

    /// Parse `[{ "code": "...", "level": n }, ...]`.
    pub fn from_json(json: &str) -> Result<Self, RoleTableError> {
        let descriptors: Vec<RoleDescriptor> =
            serde_json::from_str(json).map_err(|e| RoleTableError::Decode(e.to_string()))?;
        Self::from_descriptors(descriptors)
    }

    pub fn level_of(&self, code: &RoleCode) -> Option<RoleLevel> {
        self.levels.get(code).copied()
    }

    pub fn contains(&self, code: &RoleCode) -> bool {
        self.levels.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// All roles ordered from most to least privileged.
    pub fn descriptors(&self) -> Vec<RoleDescriptor> {
        let mut out: Vec<RoleDescriptor> = self
            .levels
            .iter()
            .map(|(code, level)| RoleDescriptor::new(code.clone(), *level))
            .collect();
        out.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.code.cmp(&b.code)));
        out
    }
}

impl Default for RoleLevelTable {
    fn default() -> Self {
        Self::builtin()
    }
}
