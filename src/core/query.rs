//! Query layer — assertions over synthesized documents.
//!
//! Functions taking a `Document` are pure and total: absence is `false`,
//! never an error. The `to_have_*` entry points take serialized text and only
//! fail when that text is not a synthesized document.

use super::document::{Attributes, Document};
use super::error::MalformedDocumentError;
use serde_json::{Map, Number, Value};

/// Partial property mapping. Listed keys must be present with matching
/// values; unlisted keys are ignored. Nested mappings match by the same rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate(Map<String, Value>);

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to match `value`.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Parse a predicate from a JSON object.
    pub fn from_json(text: &str) -> Result<Self, String> {
        match serde_json::from_str(text) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err("predicate must be a JSON object".to_string()),
            Err(e) => Err(format!("invalid predicate JSON: {}", e)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `attrs` satisfies every listed key.
    pub fn matches(&self, attrs: &Attributes) -> bool {
        object_matches(&self.0, attrs)
    }
}

impl From<Map<String, Value>> for Predicate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn object_matches(expected: &Map<String, Value>, actual: &Map<String, Value>) -> bool {
    expected
        .iter()
        .all(|(key, want)| actual.get(key).is_some_and(|have| value_matches(want, have)))
}

/// Subset rule for mappings, positional equality for lists, numeric
/// equality for numbers, plain equality otherwise.
fn value_matches(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(want), Value::Object(have)) => object_matches(want, have),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| value_matches(w, h))
        }
        (Value::Number(want), Value::Number(have)) => numbers_equal(want, have),
        _ => expected == actual,
    }
}

/// Integers compare exactly; a float equals an integer only if it converts
/// back to exactly that integer.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.is_f64(), b.is_f64()) {
        (true, true) => a.as_f64() == b.as_f64(),
        (true, false) => float_equals_integer(a.as_f64(), b),
        (false, true) => float_equals_integer(b.as_f64(), a),
        // negative i64 against a u64 above i64::MAX
        (false, false) => false,
    }
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

fn float_equals_integer(float: Option<f64>, int: &Number) -> bool {
    let Some(f) = float else {
        return false;
    };
    if !f.is_finite() || f.fract() != 0.0 {
        return false;
    }
    if let Some(i) = int.as_i64() {
        (-TWO_POW_63..TWO_POW_63).contains(&f) && f as i64 == i
    } else if let Some(u) = int.as_u64() {
        (0.0..TWO_POW_64).contains(&f) && f as u64 == u
    } else {
        false
    }
}

// ============================================================================
// Document queries
// ============================================================================

/// True iff at least one resource of `type_tag` exists (case-sensitive).
pub fn has_resource_of_type(doc: &Document, type_tag: &str) -> bool {
    doc.resources()
        .get(type_tag)
        .is_some_and(|instances| !instances.is_empty())
}

/// True iff at least one resource of `type_tag` matches `predicate`.
pub fn has_resource_with_properties(doc: &Document, type_tag: &str, predicate: &Predicate) -> bool {
    !find_resources(doc, type_tag, predicate).is_empty()
}

/// Logical ids of resources of `type_tag` matching `predicate`, in document order.
pub fn find_resources<'a>(doc: &'a Document, type_tag: &str, predicate: &Predicate) -> Vec<&'a str> {
    doc.resources()
        .get(type_tag)
        .into_iter()
        .flatten()
        .filter(|(_, attrs)| predicate.matches(attrs))
        .map(|(id, _)| id.as_str())
        .collect()
}

pub fn has_data_source_of_type(doc: &Document, type_tag: &str) -> bool {
    doc.data_sources()
        .get(type_tag)
        .is_some_and(|instances| !instances.is_empty())
}

pub fn has_data_source_with_properties(
    doc: &Document,
    type_tag: &str,
    predicate: &Predicate,
) -> bool {
    doc.data_sources()
        .get(type_tag)
        .is_some_and(|instances| instances.values().any(|attrs| predicate.matches(attrs)))
}

pub fn has_provider_of_type(doc: &Document, type_tag: &str) -> bool {
    doc.providers()
        .get(type_tag)
        .is_some_and(|configs| !configs.is_empty())
}

pub fn has_provider_with_properties(doc: &Document, type_tag: &str, predicate: &Predicate) -> bool {
    doc.providers()
        .get(type_tag)
        .is_some_and(|configs| configs.iter().any(|attrs| predicate.matches(attrs)))
}

// ============================================================================
// Serialized entry points
// ============================================================================

pub fn to_have_resource(synthesized: &str, type_tag: &str) -> Result<bool, MalformedDocumentError> {
    Ok(has_resource_of_type(&Document::from_json(synthesized)?, type_tag))
}

pub fn to_have_resource_with_properties(
    synthesized: &str,
    type_tag: &str,
    predicate: &Predicate,
) -> Result<bool, MalformedDocumentError> {
    let doc = Document::from_json(synthesized)?;
    Ok(has_resource_with_properties(&doc, type_tag, predicate))
}

pub fn to_have_data_source(synthesized: &str, type_tag: &str) -> Result<bool, MalformedDocumentError> {
    Ok(has_data_source_of_type(&Document::from_json(synthesized)?, type_tag))
}

pub fn to_have_data_source_with_properties(
    synthesized: &str,
    type_tag: &str,
    predicate: &Predicate,
) -> Result<bool, MalformedDocumentError> {
    let doc = Document::from_json(synthesized)?;
    Ok(has_data_source_with_properties(&doc, type_tag, predicate))
}

pub fn to_have_provider(synthesized: &str, type_tag: &str) -> Result<bool, MalformedDocumentError> {
    Ok(has_provider_of_type(&Document::from_json(synthesized)?, type_tag))
}

pub fn to_have_provider_with_properties(
    synthesized: &str,
    type_tag: &str,
    predicate: &Predicate,
) -> Result<bool, MalformedDocumentError> {
    let doc = Document::from_json(synthesized)?;
    Ok(has_provider_with_properties(&doc, type_tag, predicate))
}
