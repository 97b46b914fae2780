//! Load orchestrator - main workflow coordinator.
//!
//! Runs the fixed sequence: ensure the dataset exists, then for each table
//! read → coerce → load. Tables are processed one at a time and the first
//! error aborts the run.

use crate::config::Config;
use crate::core::{DatasetLookup, SourceReader, TableRef, TableSpec, TargetWriter};
use crate::error::{LoadError, Result};
use crate::source::SqliteSource;
use crate::target::BigQueryWriter;
use crate::typemap::coerce_row_set;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Placeholder project shown in dry-run table ids when none is configured.
const UNSET_PROJECT: &str = "<project>";

/// User-facing milestones of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    DatasetExists { dataset: String },
    DatasetCreated { dataset: String },
    TableLoaded { table_id: String, rows: usize },
    TablePlanned { table_id: String, rows: usize },
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::DatasetExists { dataset } => write!(f, "Dataset {} already exists.", dataset),
            RunEvent::DatasetCreated { dataset } => write!(f, "Created dataset {}", dataset),
            RunEvent::TableLoaded { table_id, rows } => {
                write!(f, "Loaded {} rows into {}.", rows, table_id)
            }
            RunEvent::TablePlanned { table_id, rows } => {
                write!(f, "Would load {} rows into {}.", rows, table_id)
            }
        }
    }
}

type Reporter = Box<dyn Fn(&RunEvent) + Send + Sync>;

/// Per-table outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableLoad {
    /// Source table name.
    pub table: String,

    /// Fully qualified destination.
    pub table_id: String,

    /// Rows read from SQLite.
    pub rows_read: usize,

    /// Rows submitted to the load job (zero on dry runs).
    pub rows_loaded: usize,

    /// Non-null values that coercion replaced with NULL.
    pub nulls_coerced: usize,

    /// Remote job id (absent on dry runs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// Result of a load run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResult {
    /// Unique run identifier.
    pub run_id: String,

    /// "completed" or "dry_run".
    pub status: String,

    /// SHA256 of the effective configuration.
    pub config_hash: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Whether this run created the dataset.
    pub dataset_created: bool,

    /// Per-table outcomes, in load order.
    pub tables: Vec<TableLoad>,

    /// Sum of rows loaded.
    pub rows_total: usize,
}

impl LoadResult {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source: String,
    pub source_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    /// Row count per configured table, or the error reading it.
    pub table_counts: Vec<TableCount>,
    pub target_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_exists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Load orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceReader>,
    target: Option<Arc<dyn TargetWriter>>,
    reporter: Option<Reporter>,
}

impl Orchestrator {
    /// Open the SQLite source, resolve BigQuery credentials, and build the
    /// writer.
    pub async fn new(config: Config) -> Result<Self> {
        let source = SqliteSource::open(&config.source)?;
        let poll = Duration::from_millis(config.load.job_poll_interval_ms);
        let target: Arc<dyn TargetWriter> =
            Arc::new(BigQueryWriter::connect(&config.target, poll).await?);

        Ok(Self::with_components(config, Arc::new(source), Some(target)))
    }

    /// Open only the SQLite source; the result can dry-run and health-check.
    pub async fn source_only(config: Config) -> Result<Self> {
        let source = SqliteSource::open(&config.source)?;
        Ok(Self::with_components(config, Arc::new(source), None))
    }

    /// Assemble from explicit components.
    pub fn with_components(
        config: Config,
        source: Arc<dyn SourceReader>,
        target: Option<Arc<dyn TargetWriter>>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            reporter: None,
        }
    }

    /// Receive [`RunEvent`]s as they happen.
    pub fn with_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.reporter = Some(Box::new(reporter));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn report(&self, event: RunEvent) {
        info!("{}", event);
        if let Some(reporter) = &self.reporter {
            reporter(&event);
        }
    }

    fn target(&self) -> Result<&Arc<dyn TargetWriter>> {
        self.target
            .as_ref()
            .ok_or_else(|| LoadError::Config("no BigQuery target configured".into()))
    }

    fn project(&self) -> String {
        match &self.target {
            Some(t) => t.project().to_string(),
            None => self
                .config
                .target
                .project
                .clone()
                .unwrap_or_else(|| UNSET_PROJECT.to_string()),
        }
    }

    fn table_ref(&self, table: &TableSpec) -> TableRef {
        TableRef::new(self.project(), &self.config.target.dataset, &table.name)
    }

    /// Create the dataset unless it already exists. Returns true if created.
    pub async fn ensure_dataset(&self) -> Result<bool> {
        let target = self.target()?;
        let dataset = &self.config.target.dataset;
        let qualified = format!("{}.{}", target.project(), dataset);

        match target.get_dataset(dataset).await? {
            DatasetLookup::Found => {
                self.report(RunEvent::DatasetExists { dataset: qualified });
                Ok(false)
            }
            DatasetLookup::NotFound => {
                target.create_dataset(dataset).await?;
                self.report(RunEvent::DatasetCreated { dataset: qualified });
                Ok(true)
            }
        }
    }

    /// Run the load. With `dry_run`, tables are read and coerced but
    /// BigQuery is never contacted.
    pub async fn run(&self, dry_run: bool) -> Result<LoadResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let config_hash = self.config.hash();

        info!(
            "Starting load run {} ({} -> {}, config {})",
            run_id,
            self.source.describe(),
            self.config.target.dataset,
            &config_hash[..12]
        );

        let outcome = self.run_tables(dry_run).await;
        self.source.close().await;
        let (dataset_created, tables) = outcome?;

        let completed_at = Utc::now();
        let rows_total = tables.iter().map(|t| t.rows_loaded).sum();
        let result = LoadResult {
            run_id,
            status: if dry_run { "dry_run" } else { "completed" }.to_string(),
            config_hash,
            duration_seconds: timer.elapsed().as_secs_f64(),
            started_at,
            completed_at,
            dataset_created,
            tables,
            rows_total,
        };

        info!(
            "Load {}: {} tables, {} rows in {:.1}s",
            result.status,
            result.tables.len(),
            result.rows_total,
            result.duration_seconds
        );
        Ok(result)
    }

    async fn run_tables(&self, dry_run: bool) -> Result<(bool, Vec<TableLoad>)> {
        let dataset_created = if dry_run {
            false
        } else {
            info!("Phase 1: Ensuring dataset {}", self.config.target.dataset);
            self.ensure_dataset().await?
        };

        info!("Phase 2: Loading {} tables", self.config.load.tables.len());
        let mut loads = Vec::with_capacity(self.config.load.tables.len());
        for table in &self.config.load.tables {
            loads.push(self.load_table(table, dry_run).await?);
        }
        Ok((dataset_created, loads))
    }

    /// Read, coerce, and load a single table.
    pub async fn load_table(&self, table: &TableSpec, dry_run: bool) -> Result<TableLoad> {
        let table_ref = self.table_ref(table);
        let table_id = table_ref.to_string();

        debug!("Reading table {}", table.name);
        let mut rows = self.source.read_table(&table.name).await?;
        let rows_read = rows.len();

        let stats = coerce_row_set(&mut rows, &table.fields);
        let nulls_coerced: usize = stats.values().sum();
        if nulls_coerced > 0 {
            debug!("{}: {} value(s) coerced to NULL", table.name, nulls_coerced);
        }

        if dry_run {
            self.report(RunEvent::TablePlanned {
                table_id: table_id.clone(),
                rows: rows_read,
            });
            return Ok(TableLoad {
                table: table.name.clone(),
                table_id,
                rows_read,
                rows_loaded: 0,
                nulls_coerced,
                job_id: None,
            });
        }

        let outcome = self
            .target()?
            .load_table(&table_ref, &rows, &table.fields)
            .await?;
        if let Some(written) = outcome.output_rows {
            if written != outcome.rows_submitted as i64 {
                warn!(
                    "{}: submitted {} rows but BigQuery reports {} written",
                    table_id, outcome.rows_submitted, written
                );
            }
        }

        self.report(RunEvent::TableLoaded {
            table_id: table_id.clone(),
            rows: rows.len(),
        });

        Ok(TableLoad {
            table: table.name.clone(),
            table_id,
            rows_read,
            rows_loaded: outcome.rows_submitted,
            nulls_coerced,
            job_id: Some(outcome.job_id),
        })
    }

    /// Check that the database opens, each table is countable, and the
    /// dataset lookup succeeds. Never creates anything.
    pub async fn health_check(&self) -> HealthCheckResult {
        let mut table_counts = Vec::with_capacity(self.config.load.tables.len());
        for table in &self.config.load.tables {
            match self.source.row_count(&table.name).await {
                Ok(rows) => table_counts.push(TableCount {
                    table: table.name.clone(),
                    rows: Some(rows),
                    error: None,
                }),
                Err(e) => table_counts.push(TableCount {
                    table: table.name.clone(),
                    rows: None,
                    error: Some(e.to_string()),
                }),
            }
        }
        let source_connected = table_counts.iter().all(|t| t.error.is_none());
        let source_error = table_counts
            .iter()
            .find_map(|t| t.error.clone());

        let (target_connected, dataset_exists, target_error) = match self.target() {
            Ok(target) => match target.get_dataset(&self.config.target.dataset).await {
                Ok(lookup) => (true, Some(lookup == DatasetLookup::Found), None),
                Err(e) => (false, None, Some(e.to_string())),
            },
            Err(e) => (false, None, Some(e.to_string())),
        };

        self.source.close().await;

        HealthCheckResult {
            source: self.source.describe(),
            source_connected,
            source_error,
            table_counts,
            target_connected,
            dataset_exists,
            target_error,
            healthy: source_connected && target_connected,
        }
    }
}
