//! Core traits for the extract and load seams.
//!
//! - [`SourceReader`]: materializes whole tables from the local store
//! - [`TargetWriter`]: dataset lookup/creation and replacing bulk loads
//!
//! The orchestrator only talks to these traits, so tests can swap in
//! in-memory implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

use super::row_set::RowSet;
use super::schema::FieldSpec;

/// Fully qualified remote table identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Outcome of a dataset lookup. Any other failure is an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetLookup {
    Found,
    NotFound,
}

/// Result of a completed load job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Remote job identifier.
    pub job_id: String,
    /// Rows submitted in the load file.
    pub rows_submitted: usize,
    /// Rows the remote side reports as written, when it reports them.
    pub output_rows: Option<i64>,
}

/// Read whole tables from the local store.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Run an unfiltered `SELECT *` and materialize every row.
    async fn read_table(&self, table: &str) -> Result<RowSet>;

    /// Count rows in a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Identifier of the store (e.g. the database file path).
    fn describe(&self) -> String;

    /// Release the connection.
    async fn close(&self);
}

/// Write to the remote warehouse.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Project that datasets and tables live in.
    fn project(&self) -> &str;

    /// Look up a dataset; not-found is a value, not an error.
    async fn get_dataset(&self, dataset: &str) -> Result<DatasetLookup>;

    /// Create a dataset.
    async fn create_dataset(&self, dataset: &str) -> Result<()>;

    /// Truncate-and-replace `table` with `rows`, blocking until the job is done.
    ///
    /// `schema` is authoritative for the fields it names.
    async fn load_table(
        &self,
        table: &TableRef,
        rows: &RowSet,
        schema: &[FieldSpec],
    ) -> Result<LoadOutcome>;
}
