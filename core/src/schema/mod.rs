//! # Schemas
//!
//! User-defined data models and the validator that enforces them.
//!
//! ```text
//! value.rs     FieldValue tagged union, Fields map
//! field.rs     FieldKind, FieldSpec, RecordSchema
//! validator.rs validate_record / validate_definition
//! ```

pub mod field;
pub mod validator;
pub mod value;

pub use field::{FieldKind, FieldSpec, RecordSchema};
pub use validator::{
    undeclared_fields, validate_definition, validate_record, SchemaError, ValidationError,
};
pub use value::{FieldValue, Fields};
