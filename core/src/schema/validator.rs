//! # Schema Validation
//!
//! Two checks live here:
//!
//! - [`validate_record`] runs a candidate field map against a schema,
//!   materializes defaults and returns the map that gets stored. Fields are
//!   visited in declaration order and the first failure is returned on its
//!   own, so the same input always produces the same error.
//! - [`validate_definition`] rejects schema definitions that could never be
//!   satisfied consistently (duplicate names, defaults of the wrong type).
//!
//! Fields the schema does not declare are copied through untouched.

use std::collections::HashSet;

use super::field::{FieldKind, FieldSpec, RecordSchema};
use super::value::Fields;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

/// A candidate record does not satisfy its schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingRequiredField(String),

    #[error("field '{field}' must be of type {expected}")]
    InvalidType { field: String, expected: FieldKind },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::MissingRequiredField(field) => field,
            Self::InvalidType { field, .. } => field,
        }
    }
}

/// A schema definition is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid schema name: {0:?}")]
    InvalidName(String),

    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("default for field '{field}' is not a valid {expected}")]
    InvalidDefault { field: String, expected: FieldKind },
}

// ---------------------------------------------------------------------------
// Record Validation
// ---------------------------------------------------------------------------

/// Validate `candidate` against `schema` and return the fields to store.
///
/// For each declared field, in order:
///
/// 1. Absent with a default: the default is inserted.
/// 2. Absent, no default, required: [`ValidationError::MissingRequiredField`].
/// 3. Absent, no default, optional: left out.
/// 4. Present: checked with [`FieldKind::accepts`], failing with
///    [`ValidationError::InvalidType`].
///
/// # Example
///
/// ```
/// use chainstore_core::schema::{validate_record, FieldKind, FieldSpec, Fields, RecordSchema};
///
/// let schema = RecordSchema::new(
///     "User",
///     vec![
///         FieldSpec::new("name", FieldKind::Text),
///         FieldSpec::new("active", FieldKind::Boolean).with_default(true),
///     ],
///     "",
/// );
/// let mut input = Fields::new();
/// input.insert("name".into(), "A".into());
///
/// let out = validate_record(&schema, &input).unwrap();
/// assert_eq!(out["active"].as_bool(), Some(true));
/// ```
pub fn validate_record(
    schema: &RecordSchema,
    candidate: &Fields,
) -> Result<Fields, ValidationError> {
    let mut validated = candidate.clone();

    for spec in &schema.fields {
        match candidate.get(&spec.name) {
            Some(value) => {
                if !spec.kind.accepts(value) {
                    return Err(ValidationError::InvalidType {
                        field: spec.name.clone(),
                        expected: spec.kind,
                    });
                }
            }
            None => {
                if let Some(default) = &spec.default {
                    validated.insert(spec.name.clone(), default.clone());
                } else if spec.required {
                    return Err(ValidationError::MissingRequiredField(spec.name.clone()));
                }
            }
        }
    }

    Ok(validated)
}

/// Keys of `candidate` the schema does not declare. [`validate_record`]
/// keeps them; callers can use this to report them.
pub fn undeclared_fields<'a>(schema: &RecordSchema, candidate: &'a Fields) -> Vec<&'a str> {
    candidate
        .keys()
        .filter(|key| schema.field(key).is_none())
        .map(String::as_str)
        .collect()
}

// ---------------------------------------------------------------------------
// Definition Validation
// ---------------------------------------------------------------------------

/// Check a schema definition before it is registered.
pub fn validate_definition(name: &str, fields: &[FieldSpec]) -> Result<(), SchemaError> {
    if name.trim().is_empty() {
        return Err(SchemaError::InvalidName(name.to_string()));
    }

    let mut seen = HashSet::with_capacity(fields.len());
    for spec in fields {
        if !seen.insert(spec.name.as_str()) {
            return Err(SchemaError::DuplicateField(spec.name.clone()));
        }
        if let Some(default) = &spec.default {
            if !spec.kind.accepts(default) {
                return Err(SchemaError::InvalidDefault {
                    field: spec.name.clone(),
                    expected: spec.kind,
                });
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
