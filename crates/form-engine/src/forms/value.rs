use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Normalized wrapper around a single raw answer.
///
/// Normalization happens exactly once, at construction: blank strings become
/// null, non-finite numbers become null, and arrays are stripped of entries
/// that themselves normalize to null. Everything downstream (visibility,
/// validation, calculation) can therefore treat the inner value as canonical.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldValue(Value);

impl FieldValue {
    pub fn new(raw: Value) -> Self {
        Self(normalize(raw))
    }

    pub fn null() -> Self {
        Self(Value::Null)
    }

    /// Builds a numeric value, mapping NaN and infinities to null.
    pub fn from_f64(number: f64) -> Self {
        match serde_json::Number::from_f64(number) {
            Some(n) => Self(Value::Number(n)),
            None => Self::null(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Null, or an array filtered down to nothing.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn is_number(&self) -> bool {
        self.0.is_number()
    }

    pub fn is_string(&self) -> bool {
        self.0.is_string()
    }

    pub fn is_array(&self) -> bool {
        self.0.is_array()
    }

    pub fn is_boolean(&self) -> bool {
        self.0.is_boolean()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_f64()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }
}

impl From<Value> for FieldValue {
    fn from(raw: Value) -> Self {
        Self::new(raw)
    }
}

// Re-normalize on the way in from persistence; legacy rows may predate a
// normalization rule.
impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

fn normalize(raw: Value) -> Value {
    match raw {
        Value::String(text) => {
            if text.trim().is_empty() {
                Value::Null
            } else {
                Value::String(text)
            }
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(normalize)
                .filter(|item| !item.is_null())
                .collect(),
        ),
        other => other,
    }
}
