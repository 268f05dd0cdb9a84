//! Field values.
//!
//! A record's fields are a map from name to [`FieldValue`], a tagged union
//! over the kinds a schema can declare. Values arrive as JSON (CLI, HTTP,
//! tests) and are converted once at the boundary; from then on the
//! validator works on tags, never on runtime reflection.
//!
//! The serialized form is plain JSON: `Text("a")` is `"a"`, `Integer(5)` is
//! `5`, `Json(..)` is the embedded document. `Timestamp` serializes as
//! RFC 3339 text, so it reads back as `Text`; the validator accepts both
//! for `datetime` fields.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Field name -> value, ordered by name so serialization is canonical.
pub type Fields = BTreeMap<String, FieldValue>;

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit JSON `null`. Satisfies no field kind.
    Null,
    /// `true` / `false`.
    Boolean(bool),
    /// Whole number that fits in an `i64`.
    Integer(i64),
    /// Any other number.
    Real(f64),
    /// UTF-8 string.
    Text(String),
    /// Point in time, UTC.
    Timestamp(DateTime<Utc>),
    /// Structured document. Only objects and arrays satisfy `json` fields.
    Json(Value),
}

impl FieldValue {
    /// Convert into a `serde_json::Value`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Real(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
            Self::Timestamp(ts) => Value::String(format_timestamp(ts)),
            Self::Json(v) => v.clone(),
        }
    }

    /// Returns the boolean content if this is a `Boolean` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Equality used by search criteria.
    ///
    /// Numbers compare by value, so `Integer(5)` matches `Real(5.0)`.
    /// A `Timestamp` matches `Text` holding the same RFC 3339 rendering,
    /// which is how timestamps come back from storage.
    pub fn matches(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Integer(a), Self::Real(b)) | (Self::Real(b), Self::Integer(a)) => {
                *a as f64 == *b
            }
            (Self::Real(a), Self::Real(b)) => a == b,
            (Self::Timestamp(_), Self::Text(_)) | (Self::Text(_), Self::Timestamp(_)) => {
                self.to_json() == other.to_json()
            }
            _ => self == other,
        }
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                // u64 beyond i64::MAX and every fractional number.
                None => Self::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Text(s),
            v @ (Value::Array(_) | Value::Object(_)) => Self::Json(v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Real(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Real(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Timestamp(ts) => serializer.serialize_str(&format_timestamp(ts)),
            Self::Json(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldValue::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_split_into_integer_and_real() {
        assert_eq!(FieldValue::from(json!(5)), FieldValue::Integer(5));
        assert_eq!(FieldValue::from(json!(-5)), FieldValue::Integer(-5));
        assert_eq!(FieldValue::from(json!(5.5)), FieldValue::Real(5.5));
        assert_eq!(FieldValue::from(json!(5.0)), FieldValue::Real(5.0));
        assert_eq!(
            FieldValue::from(json!(u64::MAX)),
            FieldValue::Real(u64::MAX as f64)
        );
    }

    #[test]
    fn structured_values_become_json() {
        assert!(matches!(FieldValue::from(json!({"a": 1})), FieldValue::Json(_)));
        assert!(matches!(FieldValue::from(json!([1, 2])), FieldValue::Json(_)));
        assert_eq!(FieldValue::from(json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from(json!("x")), FieldValue::Text("x".into()));
        assert_eq!(FieldValue::from(json!(true)), FieldValue::Boolean(true));
    }

    #[test]
    fn serializes_as_plain_json() {
        let mut fields = Fields::new();
        fields.insert("name".into(), "Ada".into());
        fields.insert("age".into(), 36i64.into());
        fields.insert("score".into(), 9.5.into());
        fields.insert("tags".into(), FieldValue::Json(json!(["a", "b"])));
        let out = serde_json::to_value(&fields).unwrap();
        assert_eq!(
            out,
            json!({"age": 36, "name": "Ada", "score": 9.5, "tags": ["a", "b"]})
        );
    }

    #[test]
    fn fields_deserialize_from_object() {
        let fields: Fields =
            serde_json::from_str(r#"{"name":"A","age":5,"meta":{"k":[1]}}"#).unwrap();
        assert_eq!(fields["name"], FieldValue::Text("A".into()));
        assert_eq!(fields["age"], FieldValue::Integer(5));
        assert!(matches!(fields["meta"], FieldValue::Json(_)));
    }

    #[test]
    fn fields_reject_non_object_input() {
        assert!(serde_json::from_str::<Fields>("[1,2,3]").is_err());
    }

    #[test]
    fn timestamp_serializes_as_rfc3339_text() {
        let ts = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let v = FieldValue::Timestamp(ts);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"2026-01-02T03:04:05Z\"");
        let back: FieldValue = serde_json::from_str("\"2026-01-02T03:04:05Z\"").unwrap();
        assert_eq!(back, FieldValue::Text("2026-01-02T03:04:05Z".into()));
    }

    #[test]
    fn matching_is_numeric_and_timestamp_aware() {
        assert!(FieldValue::Integer(5).matches(&FieldValue::Real(5.0)));
        assert!(FieldValue::Real(5.0).matches(&FieldValue::Integer(5)));
        assert!(!FieldValue::Integer(5).matches(&FieldValue::Real(5.5)));
        assert!(!FieldValue::Integer(5).matches(&FieldValue::Text("5".into())));

        let ts = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let text = FieldValue::Text("2026-01-02T03:04:05Z".into());
        assert!(FieldValue::Timestamp(ts).matches(&text));
        assert!(text.matches(&FieldValue::Timestamp(ts)));
    }

    #[test]
    fn real_values_survive_json_roundtrip() {
        let v = FieldValue::Real(0.1 + 0.2);
        let s = serde_json::to_string(&v).unwrap();
        let back: FieldValue = serde_json::from_str(&s).unwrap();
        assert_eq!(v, back);
    }
}
