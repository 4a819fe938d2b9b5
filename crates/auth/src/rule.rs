use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use eventdesk_core::{DomainError, DomainResult};

use crate::record::{Conditions, FieldValue, Record};

/// Action name used in ability rules (e.g. `"read"`, `"update"`, `"print"`).
///
/// The special action [`Action::MANAGE`] matches every action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Cow<'static, str>);

impl Action {
    /// Wildcard action: a rule with this action grants every action.
    pub const MANAGE: Action = Action(Cow::Borrowed("manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_manage(&self) -> bool {
        self.as_str() == Self::MANAGE.as_str()
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subject type a rule applies to (e.g. `"Event"`, `"Attendee"`, `"User"`).
///
/// The special subject [`Subject::ALL`] matches every subject type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(Cow<'static, str>);

impl Subject {
    /// Wildcard subject: a rule scoped to `"all"` applies to every subject type.
    pub const ALL: Subject = Subject(Cow::Borrowed("all"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_all(&self) -> bool {
        self.as_str() == Self::ALL.as_str()
    }
}

impl core::fmt::Display for Subject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Polarity of a rule.
///
/// Policies issued without an `effect` field are grant-only, so the default is
/// [`Effect::Allow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// One ability rule: `(action, subject, conditions?, effect)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub action: Action,
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
    #[serde(default)]
    pub effect: Effect,
}

impl Rule {
    /// A grant for `action` on `subject`.
    pub fn allow(
        action: impl Into<Cow<'static, str>>,
        subject: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            action: Action::new(action),
            subject: Subject::new(subject),
            conditions: None,
            effect: Effect::Allow,
        }
    }

    /// A refusal for `action` on `subject`, overriding earlier grants.
    pub fn deny(
        action: impl Into<Cow<'static, str>>,
        subject: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::allow(action, subject)
        }
    }

    /// Add a field equality condition.
    pub fn when(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.conditions
            .get_or_insert_with(Conditions::default)
            .insert(field, value);
        self
    }

    pub fn is_allow(&self) -> bool {
        self.effect == Effect::Allow
    }

    /// Whether the rule targets `(action, subject)`, ignoring conditions.
    ///
    /// `"manage"` on the rule side matches any action and `"all"` on the rule
    /// side matches any subject; the reverse does not hold.
    pub fn applies_to(&self, action: &str, subject: &str) -> bool {
        let action_ok = self.action.is_manage() || self.action.as_str() == action;
        let subject_ok = self.subject.is_all() || self.subject.as_str() == subject;
        action_ok && subject_ok
    }

    /// Whether the rule's conditions are satisfied by `record`.
    ///
    /// Unconditioned rules (including an empty condition map) always pass;
    /// conditioned rules never pass without a record.
    pub fn conditions_hold(&self, record: Option<&Record>) -> bool {
        match (&self.conditions, record) {
            (None, _) => true,
            (Some(conditions), _) if conditions.is_empty() => true,
            (Some(_), None) => false,
            (Some(conditions), Some(record)) => conditions.matches(record),
        }
    }

    /// Full match: target plus conditions.
    pub fn matches(&self, action: &str, subject: &str, record: Option<&Record>) -> bool {
        self.applies_to(action, subject) && self.conditions_hold(record)
    }

    /// Reject rules that could never be matched by a well-formed query.
    pub fn validate(&self) -> DomainResult<()> {
        if self.action.as_str().trim().is_empty() {
            return Err(DomainError::validation("rule action cannot be empty"));
        }
        if self.subject.as_str().trim().is_empty() {
            return Err(DomainError::validation("rule subject cannot be empty"));
        }
        if let Some(conditions) = &self.conditions {
            if conditions.fields().any(|f| f.trim().is_empty()) {
                return Err(DomainError::validation("condition field name cannot be empty"));
            }
        }
        Ok(())
    }
}
