//! JSON Schema validation for drafts 04, 2019-09 and 2020-12.
//!
//! A raw schema document goes through three stages:
//! - [`structural`] checks it against its draft's grammar,
//! - [`lower`] turns it into an [`ir::SchemaNode`] tree,
//! - [`resolve`] ties every `$ref` to a definition in the root pool.
//!
//! The result is frozen inside a [`Validator`], which can be shared across
//! threads and re-serialised with [`emit`].
//!
//! ```no_run
//! use serde_json::json;
//!
//! let schema = json!({"type": "object", "required": ["id"]});
//! let validator = json_vet::Validator::new(&schema)?;
//! assert!(validator.is_valid(&json!({"id": 7})));
//! # Ok::<(), json_vet::Error>(())
//! ```
pub mod config;
pub mod draft;
pub mod emit;
pub mod equality;
pub mod error;
pub mod ir;
pub mod lower;
pub mod path_de;
pub mod resolve;
pub mod structural;
pub mod validate;

use serde_json::Value;

pub use config::Options;
pub use draft::Draft;
pub use equality::ArrayEquality;
pub use error::{
    Error, PathSegment, ReferenceError, Result, SchemaError, SchemaErrorKind, UnsupportedFeature,
    ValidationError,
};
pub use ir::SchemaNode;
pub use resolve::{DocumentSource, NoSource, SchemaSource};
pub use validate::{Evaluated, Members, Validator};

/// One-shot validation with default options and no external references.
pub fn validate(schema: &Value, instance: &Value) -> Result<()> {
    Validator::new(schema)?.validate(instance)
}

/// `false` when the schema is broken as well as when the instance fails.
pub fn is_valid(schema: &Value, instance: &Value) -> bool {
    validate(schema, instance).is_ok()
}
