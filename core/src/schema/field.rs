//! Field declarations and record schemas.
//!
//! A [`RecordSchema`] is a named, ordered list of [`FieldSpec`]s. Schemas
//! are defined once and never change afterwards; the `version` string is
//! stored as given and is not bumped by anything in this crate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value::FieldValue;
use crate::config::DEFAULT_SCHEMA_VERSION;

// ---------------------------------------------------------------------------
// FieldKind
// ---------------------------------------------------------------------------

/// The declared type of a field.
///
/// Serialized with the labels used in error messages: `text`, `integer`,
/// `real`, `boolean`, `datetime`, `json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Any string.
    Text,
    /// Whole number.
    Integer,
    /// Any number, whole or fractional.
    Real,
    /// Exactly `true` or `false`.
    Boolean,
    /// A point in time: epoch number, RFC 3339 text, or a timestamp value.
    #[serde(rename = "datetime", alias = "timestamp")]
    Timestamp,
    /// An object or an array.
    Json,
}

/// Largest magnitude below which every integer is an exact `f64` (2^53).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl FieldKind {
    /// Label used in `InvalidType` errors and in the JSON form of a schema.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Timestamp => "datetime",
            Self::Json => "json",
        }
    }

    /// Returns `true` if `value` satisfies this kind.
    ///
    /// Numbers are not coerced from strings and booleans are never numbers.
    /// A `Real` with no fractional part counts as an integer as long as it
    /// is within the range `f64` holds exactly; anything larger has already
    /// lost digits. `Null` satisfies no kind.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (Self::Text, FieldValue::Text(_)) => true,
            (Self::Integer, FieldValue::Integer(_)) => true,
            (Self::Integer, FieldValue::Real(f)) => {
                f.fract() == 0.0 && f.abs() <= MAX_EXACT_INTEGER
            }
            (Self::Real, FieldValue::Integer(_)) => true,
            (Self::Real, FieldValue::Real(f)) => f.is_finite(),
            (Self::Boolean, FieldValue::Boolean(_)) => true,
            (Self::Timestamp, FieldValue::Timestamp(_)) => true,
            (Self::Timestamp, FieldValue::Integer(_)) => true,
            (Self::Timestamp, FieldValue::Real(f)) => f.is_finite(),
            (Self::Timestamp, FieldValue::Text(s)) => DateTime::parse_from_rfc3339(s).is_ok(),
            (Self::Json, FieldValue::Json(v)) => v.is_object() || v.is_array(),
            _ => false,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

fn default_required() -> bool {
    true
}

/// Declaration of one field in a schema.
///
/// Deserializes from the shape clients send: `required` defaults to `true`
/// and `type` is accepted as an alias of `kind`:
///
/// ```
/// use chainstore_core::schema::{FieldKind, FieldSpec};
///
/// let spec: FieldSpec =
///     serde_json::from_str(r#"{"name":"age","type":"integer"}"#).unwrap();
/// assert_eq!(spec.kind, FieldKind::Integer);
/// assert!(spec.required);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, unique within its schema.
    pub name: String,
    /// Declared type.
    #[serde(alias = "type")]
    pub kind: FieldKind,
    /// Whether the field must be present (after defaults are applied).
    #[serde(default = "default_required")]
    pub required: bool,
    /// Value materialized when the field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
    /// Free-form documentation.
    #[serde(default)]
    pub description: String,
}

impl FieldSpec {
    /// A required field of the given kind with no default.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: String::new(),
        }
    }

    /// Mark the field optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set the value materialized when the field is absent.
    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attach a description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// ---------------------------------------------------------------------------
// RecordSchema
// ---------------------------------------------------------------------------

/// A named data model: the set of typed fields a record may contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Globally unique schema name.
    pub name: String,
    /// Field declarations in validation order.
    pub fields: Vec<FieldSpec>,
    /// Free-form documentation.
    #[serde(default)]
    pub description: String,
    /// When the schema was defined.
    pub created_at: DateTime<Utc>,
    /// Caller-supplied version label.
    pub version: String,
}

impl RecordSchema {
    /// Build a schema stamped with the current time and the default version.
    pub fn new(
        name: impl Into<String>,
        fields: Vec<FieldSpec>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            fields,
            description: description.into(),
            created_at: Utc::now(),
            version: DEFAULT_SCHEMA_VERSION.to_string(),
        }
    }

    /// Look up a field declaration by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of all declared fields, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
