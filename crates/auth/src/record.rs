//! Records and rule conditions.
//!
//! A record is the flat view of an entity an ability is checked against
//! (`{ "orgId": "org-1", "status": "draft" }`). Values are restricted to
//! scalars so that condition matching is plain equality.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use eventdesk_core::DomainError;

/// A scalar field value.
///
/// Equality is strict: values of different kinds never compare equal
/// (`"1" != 1`), and `NaN` is not equal to itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    /// JSON number as an IEEE-754 double. Integers are exact only within
    /// ±2^53 ([`FieldValue::MAX_SAFE_INTEGER`]); wider ids belong in `String`.
    Number(f64),
    String(String),
}

impl FieldValue {
    /// Largest integer magnitude a `Number` holds without rounding.
    pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

    /// Convert a JSON value; arrays and objects have no scalar form.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => Some(Self::Null),
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::Number(n) => n.as_f64().map(Self::Number),
            JsonValue::String(s) => Some(Self::String(s.clone())),
            JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl TryFrom<i64> for FieldValue {
    type Error = DomainError;

    /// Fails outside ±2^53, where distinct integers would round to one `f64`.
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value.unsigned_abs() > Self::MAX_SAFE_INTEGER.unsigned_abs() {
            return Err(DomainError::validation(format!(
                "integer {value} is not exactly representable as a field number"
            )));
        }
        Ok(Self::Number(value as f64))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Flat field map describing one entity instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build a record from an API object, keeping only scalar fields.
    ///
    /// Nested objects and arrays are dropped: no condition can match them.
    pub fn from_json_object(object: &serde_json::Map<String, JsonValue>) -> Self {
        object
            .iter()
            .filter_map(|(k, v)| FieldValue::from_json(v).map(|v| (k.clone(), v)))
            .collect()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Field equality constraints attached to a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(BTreeMap<String, FieldValue>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Every condition field is present in `record` with an equal value.
    pub fn matches(&self, record: &Record) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }

    /// Condition fields that `record` fails (missing or different), in key order.
    pub fn mismatched_fields(&self, record: &Record) -> Vec<String> {
        self.0
            .iter()
            .filter(|(field, expected)| record.get(field) != Some(*expected))
            .map(|(field, _)| field.clone())
            .collect()
    }
}

impl FromIterator<(String, FieldValue)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
