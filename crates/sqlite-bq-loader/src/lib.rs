//! # sqlite-bq-loader
//!
//! One-shot SQLite to BigQuery loader.
//!
//! Reads whole tables from a local SQLite file, coerces each column to the
//! type declared for it, and replaces the matching BigQuery table with the
//! result:
//!
//! - **Dataset guard** creates the target dataset when it is missing
//! - **Schema-driven coercion** turns unparsable values into NULL
//! - **Truncate-and-replace loads** via BigQuery load jobs
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_bq_loader::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> sqlite_bq_loader::Result<()> {
//!     let config = Config::default().resolve_env();
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(false).await?;
//!     println!("Loaded {} rows", result.rows_total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, LoadConfig, SourceConfig, TargetConfig};
pub use crate::core::{
    default_tables, DatasetLookup, FieldSpec, FieldType, LoadOutcome, RowSet, SourceReader,
    TableRef, TableSpec, TargetWriter, Value,
};
pub use error::{LoadError, Result};
pub use orchestrator::{HealthCheckResult, LoadResult, Orchestrator, RunEvent, TableLoad};
pub use source::SqliteSource;
pub use target::{BigQueryWriter, Credentials, TokenSource};
pub use typemap::{coerce_row_set, CoercionStats};
