//! Request input validation from declarative field descriptors.
//!
//! Descriptors name an attribute, a type and a set of validators; a
//! [`Schema`] compiled from them checks an input object and reports one
//! message per failing path. [`SchemaCache`] reuses compiled schemas for
//! descriptor lists with the same signature.

mod descriptor;
mod rules;
mod schema;

pub use descriptor::{FieldDescriptor, FieldType, FieldValue};
pub use rules::{is_known_validator, parse_regex, DEFAULT_MIN_COMPLEXITY, KNOWN_VALIDATORS};
pub use schema::{signature, Schema, SchemaCache, ValidationErrors, ROOT_PATH};
