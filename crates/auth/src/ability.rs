//! Ability evaluation over an ordered rule set.
//!
//! - No IO
//! - No panics
//! - Last matching rule decides; no matching rule denies

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::Record;
use crate::rule::Rule;

/// Server-issued identifier of a policy revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyVersion(String);

impl PolicyVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PolicyVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered rules plus the version they were issued under.
///
/// A rule set is immutable once built; a policy refresh replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
    version: Option<PolicyVersion>,
}

impl RuleSet {
    /// The fail-closed rule set: every check denies.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(rules: Vec<Rule>, version: PolicyVersion) -> Self {
        Self {
            rules,
            version: Some(version),
        }
    }

    /// Build an unversioned rule set (tests, local fixtures).
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            version: None,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn version(&self) -> Option<&PolicyVersion> {
        self.version.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn can(&self, action: &str, subject: &str, record: Option<&Record>) -> bool {
        can(self, action, subject, record)
    }

    pub fn cannot(&self, action: &str, subject: &str, record: Option<&Record>) -> bool {
        cannot(self, action, subject, record)
    }
}

/// One evaluation query: `(action, subject, record?)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Query<'a> {
    pub action: &'a str,
    pub subject: &'a str,
    pub record: Option<&'a Record>,
}

impl<'a> Query<'a> {
    pub fn new(action: &'a str, subject: &'a str) -> Self {
        Self {
            action,
            subject,
            record: None,
        }
    }

    /// Attach the record the query is about.
    pub fn on(mut self, record: &'a Record) -> Self {
        self.record = Some(record);
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbilityError {
    #[error("forbidden: cannot '{action}' on '{subject}'")]
    Forbidden { action: String, subject: String },
}

/// The rule that decides `query`, with its position in the rule set.
///
/// Rules are scanned from last to first; the first full match wins.
pub fn relevant_rule<'r>(rule_set: &'r RuleSet, query: &Query<'_>) -> Option<(usize, &'r Rule)> {
    rule_set
        .rules
        .iter()
        .enumerate()
        .rev()
        .find(|(_, rule)| rule.matches(query.action, query.subject, query.record))
}

/// Decide whether `action` on `subject` (optionally a specific `record`) is allowed.
pub fn can(rule_set: &RuleSet, action: &str, subject: &str, record: Option<&Record>) -> bool {
    let query = Query {
        action,
        subject,
        record,
    };
    relevant_rule(rule_set, &query).is_some_and(|(_, rule)| rule.is_allow())
}

pub fn cannot(rule_set: &RuleSet, action: &str, subject: &str, record: Option<&Record>) -> bool {
    !can(rule_set, action, subject, record)
}

/// Result-returning form of [`can`] for command and navigation boundaries.
pub fn authorize(rule_set: &RuleSet, query: &Query<'_>) -> Result<(), AbilityError> {
    if can(rule_set, query.action, query.subject, query.record) {
        return Ok(());
    }

    tracing::debug!(
        action = query.action,
        subject = query.subject,
        has_record = query.record.is_some(),
        policy_version = rule_set.version().map(PolicyVersion::as_str),
        "ability denied"
    );

    Err(AbilityError::Forbidden {
        action: query.action.to_string(),
        subject: query.subject.to_string(),
    })
}
