//! snugmodel: typed entity fields, value pipelines and portable keys.
//!
//! A [`Model`] declares named [`FieldDef`]s. Setting a value on an [`Entity`] runs the
//! field's validation pipeline; persistence converts values to their base representation
//! and writes them as backend cells. [`Key`]s encode hierarchical identities as URL-safe
//! tokens.

pub mod backend;
pub mod entity;
pub mod errors;
pub mod field;
pub mod filters;
pub mod id;
pub mod keys;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod structured;
pub mod temporal;
pub mod validators;
pub mod value;

pub use backend::{Cell, CellSink, CellSource, CellValue, Meaning, Record};
pub use entity::Entity;
pub use errors::*;
pub use field::{FieldBuilder, FieldDef, FieldType, NAME_SEPARATOR, RESERVED_KEY_NAME, Validator};
pub use filters::{FilterNode, FilterOp, RepeatedStructuredPredicate};
pub use keys::{Key, KeyId};
pub use model::{FieldDecl, Model, ModelBuilder};
pub use registry::*;
pub use temporal::TemporalOptions;
pub use value::{JsonType, Value};
