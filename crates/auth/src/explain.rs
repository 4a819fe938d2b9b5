// ─────────────────────────────────────────────────────────────────────────────
// Ability Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

use serde::Serialize;

use crate::ability::{Query, RuleSet, relevant_rule};
use crate::rule::Rule;

/// Detailed explanation of an ability decision.
///
/// Answers "why was this allowed/denied?" for admin tooling and support
/// diagnostics. Producing it is more expensive than [`crate::can`], so it is not
/// meant for the render path.
#[derive(Debug, Clone, Serialize)]
pub struct AbilityExplanation {
    pub action: String,
    pub subject: String,

    /// Whether the query was granted.
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Version of the policy the decision was made against.
    pub policy_version: Option<String>,

    /// The rule that decided the outcome, if any.
    pub deciding_rule: Option<RuleReference>,

    /// Rules targeting the query whose conditions did not hold.
    pub skipped_rules: Vec<SkippedRule>,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleReference {
    pub index: usize,
    pub rule: Rule,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRule {
    pub index: usize,
    pub cause: SkipCause,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipCause {
    /// The rule has conditions but the query carried no record.
    MissingRecord,
    /// These condition fields were absent from the record or differed.
    FieldMismatch { fields: Vec<String> },
}

/// Detailed reason why a query was denied.
#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    EmptyPolicy,
    NoMatchingRule,
    ConditionsNotMet,
    ExplicitDeny,
}

/// Explain the decision [`crate::can`] makes for `query`.
pub fn explain(rule_set: &RuleSet, query: &Query<'_>) -> AbilityExplanation {
    let skipped_rules: Vec<SkippedRule> = rule_set
        .rules()
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.applies_to(query.action, query.subject))
        .filter_map(|(index, rule)| {
            let conditions = rule.conditions.as_ref().filter(|c| !c.is_empty())?;
            let cause = match query.record {
                None => SkipCause::MissingRecord,
                Some(record) => {
                    let fields = conditions.mismatched_fields(record);
                    if fields.is_empty() {
                        return None;
                    }
                    SkipCause::FieldMismatch { fields }
                }
            };
            Some(SkippedRule { index, cause })
        })
        .collect();

    let deciding = relevant_rule(rule_set, query);
    let granted = deciding.is_some_and(|(_, rule)| rule.is_allow());
    let target = format!("'{}' on '{}'", query.action, query.subject);

    let (reason, denial_reason) = match deciding {
        Some((index, rule)) if rule.is_allow() => (
            format!(
                "Rule #{index} ({} {}) grants {target}",
                rule.action, rule.subject
            ),
            None,
        ),
        Some((index, rule)) => (
            format!(
                "Rule #{index} ({} {}) explicitly denies {target}",
                rule.action, rule.subject
            ),
            Some(DenialReason {
                kind: DenialKind::ExplicitDeny,
                message: format!("Denied by rule #{index}, which overrides all earlier rules"),
                suggestions: vec![
                    "Remove or narrow the deny rule in the role's policy".to_string(),
                    "Add a later grant rule if the deny should not apply here".to_string(),
                ],
            }),
        ),
        None if rule_set.is_empty() => (
            format!("No policy is loaded; {target} is denied"),
            Some(DenialReason {
                kind: DenialKind::EmptyPolicy,
                message: "The rule set is empty (not loaded, logged out, or fetch failed)"
                    .to_string(),
                suggestions: vec![
                    "Wait for the policy to finish loading".to_string(),
                    "Sign in again to fetch a fresh policy".to_string(),
                ],
            }),
        ),
        None if !skipped_rules.is_empty() => (
            format!("Rules target {target} but none of their conditions hold"),
            Some(DenialReason {
                kind: DenialKind::ConditionsNotMet,
                message: format!(
                    "{} rule(s) target {target}; conditions failed for this record",
                    skipped_rules.len()
                ),
                suggestions: vec![
                    "Check that the record carries the fields the rule conditions name"
                        .to_string(),
                    "Check that the record belongs to the organization in scope".to_string(),
                ],
            }),
        ),
        None => (
            format!("No rule grants {target}"),
            Some(DenialReason {
                kind: DenialKind::NoMatchingRule,
                message: format!("Missing a rule for {target}"),
                suggestions: vec![
                    format!(
                        "Grant '{}' on '{}' to the user's role",
                        query.action, query.subject
                    ),
                    "Assign a role whose policy includes this ability".to_string(),
                ],
            }),
        ),
    };

    AbilityExplanation {
        action: query.action.to_string(),
        subject: query.subject.to_string(),
        granted,
        reason,
        policy_version: rule_set.version().map(|v| v.as_str().to_string()),
        deciding_rule: deciding.map(|(index, rule)| RuleReference {
            index,
            rule: rule.clone(),
        }),
        skipped_rules,
        denial_reason,
    }
}
