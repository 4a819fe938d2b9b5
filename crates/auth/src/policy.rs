//! Wire form of a policy as issued by the backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use eventdesk_core::DomainError;

use crate::ability::{PolicyVersion, RuleSet};
use crate::rule::Rule;

/// Policy payload: `{ "rules": [...], "version": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyPayload {
    pub rules: Vec<Rule>,
    pub version: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy payload could not be decoded: {0}")]
    Decode(String),

    #[error("policy version cannot be empty")]
    MissingVersion,

    #[error("rule #{index} is invalid: {source}")]
    InvalidRule { index: usize, source: DomainError },
}

impl PolicyPayload {
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(json).map_err(|e| PolicyError::Decode(e.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, PolicyError> {
        serde_json::from_value(value).map_err(|e| PolicyError::Decode(e.to_string()))
    }

    /// Validate every rule and build the evaluable rule set.
    ///
    /// Rule order is preserved. An empty `conditions` object carries no
    /// constraint and is normalized away.
    pub fn into_rule_set(self) -> Result<RuleSet, PolicyError> {
        if self.version.trim().is_empty() {
            return Err(PolicyError::MissingVersion);
        }

        let mut rules = self.rules;
        for (index, rule) in rules.iter_mut().enumerate() {
            rule.validate()
                .map_err(|source| PolicyError::InvalidRule { index, source })?;
            if rule.conditions.as_ref().is_some_and(|c| c.is_empty()) {
                rule.conditions = None;
            }
        }

        Ok(RuleSet::new(rules, PolicyVersion::new(self.version)))
    }
}

impl TryFrom<PolicyPayload> for RuleSet {
    type Error = PolicyError;

    fn try_from(payload: PolicyPayload) -> Result<Self, Self::Error> {
        payload.into_rule_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::rule::Effect;

    #[test]
    fn decodes_backend_payload() {
        let payload = PolicyPayload::from_json(
            r#"{
                "version": "2024-06-01.3",
                "rules": [
                    { "action": "read", "subject": "Event", "conditions": { "orgId": "org-1" } },
                    { "action": "print", "subject": "Badge" },
                    { "action": "delete", "subject": "Event", "effect": "deny" }
                ]
            }"#,
        )
        .unwrap();

        let rules = payload.into_rule_set().unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.version().map(|v| v.as_str()), Some("2024-06-01.3"));
        assert_eq!(rules.rules()[2].effect, Effect::Deny);

        let record = Record::new().with("orgId", "org-1");
        assert!(rules.can("read", "Event", Some(&record)));
        assert!(rules.can("print", "Badge", None));
    }

    #[test]
    fn empty_conditions_are_normalized() {
        let payload = PolicyPayload::from_json(
            r#"{ "version": "1",
                 "rules": [ { "action": "read", "subject": "Event", "conditions": {} } ] }"#,
        )
        .unwrap();
        let rules = payload.into_rule_set().unwrap();

        assert!(rules.rules()[0].conditions.is_none());
        assert!(rules.can("read", "Event", None));
    }

    #[test]
    fn rejects_blank_rule_fields_with_index() {
        let payload = PolicyPayload {
            rules: vec![Rule::allow("read", "Event"), Rule::allow("", "Event")],
            version: "1".to_string(),
        };
        let err = RuleSet::try_from(payload).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidRule { index: 1, .. }));
    }

    #[test]
    fn rejects_missing_version_and_garbage() {
        let payload = PolicyPayload {
            rules: vec![],
            version: " ".to_string(),
        };
        assert_eq!(payload.into_rule_set().unwrap_err(), PolicyError::MissingVersion);

        assert!(matches!(
            PolicyPayload::from_json("{\"rules\": 3}"),
            Err(PolicyError::Decode(_))
        ));
    }
}
