//! Binding points between the evaluator and its consumers.
//!
//! Views, menu entries and routes declare the abilities they need; the
//! functions here evaluate those declarations against the current rule set.

use crate::ability::{AbilityError, Query, RuleSet, authorize};
use crate::record::Record;
use crate::rule::{Action, Subject};

/// An owned ability requirement: `(action, subject, record?)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub action: Action,
    pub subject: Subject,
    pub record: Option<Record>,
}

impl Check {
    pub fn new(action: Action, subject: Subject) -> Self {
        Self {
            action,
            subject,
            record: None,
        }
    }

    pub fn on(mut self, record: Record) -> Self {
        self.record = Some(record);
        self
    }

    pub fn query(&self) -> Query<'_> {
        Query {
            action: self.action.as_str(),
            subject: self.subject.as_str(),
            record: self.record.as_ref(),
        }
    }

    pub fn evaluate(&self, rule_set: &RuleSet) -> bool {
        authorize(rule_set, &self.query()).is_ok()
    }
}

/// Items that need abilities before they may be shown or used.
///
/// Implement this on view models and actions; consumers call [`guard`] before
/// rendering or dispatching.
pub trait Gated {
    fn required_checks(&self) -> &[Check];
}

/// Evaluate every check of `item`; the first failing one is returned.
pub fn guard<G: Gated + ?Sized>(rule_set: &RuleSet, item: &G) -> Result<(), AbilityError> {
    for check in item.required_checks() {
        authorize(rule_set, &check.query())?;
    }
    Ok(())
}

/// Path-prefix → requirement table for navigation.
///
/// The longest registered prefix (matched on `/` boundaries) decides; paths
/// with no registered prefix are open.
#[derive(Debug, Clone, Default)]
pub struct NavigationGuard {
    routes: Vec<(String, Check)>,
}

impl NavigationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, prefix: impl Into<String>, check: Check) -> Self {
        let prefix = normalize(&prefix.into());
        self.routes.retain(|(p, _)| *p != prefix);
        self.routes.push((prefix, check));
        self
    }

    /// The requirement that governs `path`, if any.
    pub fn requirement_for(&self, path: &str) -> Option<&Check> {
        let path = normalize(path);
        self.routes
            .iter()
            .filter(|(prefix, _)| covers(prefix, &path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, check)| check)
    }

    pub fn authorize_path(&self, rule_set: &RuleSet, path: &str) -> Result<(), AbilityError> {
        match self.requirement_for(path) {
            Some(check) => authorize(rule_set, &check.query()),
            None => Ok(()),
        }
    }

    pub fn can_navigate(&self, rule_set: &RuleSet, path: &str) -> bool {
        self.authorize_path(rule_set, path).is_ok()
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn covers(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
