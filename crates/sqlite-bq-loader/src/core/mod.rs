//! Core types shared by the reader, the coercion step, and the writer.
//!
//! - [`schema`]: field types, field specs, the default table registry
//! - [`value`]: cell values
//! - [`row_set`]: the named-column row buffer
//! - [`traits`]: [`SourceReader`] and [`TargetWriter`]

pub mod row_set;
pub mod schema;
pub mod traits;
pub mod value;

pub use row_set::RowSet;
pub use schema::{default_tables, FieldSpec, FieldType, TableSpec};
pub use traits::{DatasetLookup, LoadOutcome, SourceReader, TableRef, TargetWriter};
pub use value::Value;
