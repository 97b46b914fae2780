//! BigQuery target operations.

pub mod auth;
mod bigquery;
pub mod encode;

pub use auth::{ApplicationDefault, Credentials, StaticToken, TokenSource, BIGQUERY_SCOPE};
pub use bigquery::BigQueryWriter;
pub use encode::{encode_cell, load_schema, to_ndjson, SchemaField};
