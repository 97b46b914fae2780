//! Configuration type definitions.
//!
//! Every field has a default, so an empty document (or no file at all)
//! yields the stock `mock_resq.db` → `resq_data` load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::core::{default_tables, TableSpec};

/// Environment variables consulted when the project is not configured.
pub const PROJECT_ENV_VARS: &[&str] = &["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

/// Environment variable consulted when no access token is configured.
pub const ACCESS_TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local SQLite database.
    #[serde(default)]
    pub source: SourceConfig,

    /// BigQuery destination.
    #[serde(default)]
    pub target: TargetConfig,

    /// Tables and load behaviour.
    #[serde(default)]
    pub load: LoadConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the database file (default: "mock_resq.db").
    #[serde(default = "default_source_path")]
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
        }
    }
}

/// Target warehouse (BigQuery) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// GCP project. Falls back to GOOGLE_CLOUD_PROJECT / GCLOUD_PROJECT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Dataset name (default: "resq_data").
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Dataset location used when the dataset has to be created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Static OAuth2 bearer token. Falls back to GOOGLE_OAUTH_ACCESS_TOKEN;
    /// when neither is set, Application Default Credentials are used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// API root (default: "https://bigquery.googleapis.com").
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request HTTP timeout in seconds (default: 300).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            project: None,
            dataset: default_dataset(),
            location: None,
            access_token: None,
            api_base_url: default_api_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("project", &self.project)
            .field("dataset", &self.dataset)
            .field("location", &self.location)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_base_url", &self.api_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Load behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Tables to load, in order, with their target schemas.
    #[serde(default = "default_tables")]
    pub tables: Vec<TableSpec>,

    /// Delay between load job status polls in milliseconds (default: 1000).
    #[serde(default = "default_poll_interval_ms")]
    pub job_poll_interval_ms: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            tables: default_tables(),
            job_poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_source_path() -> PathBuf {
    PathBuf::from("mock_resq.db")
}

fn default_dataset() -> String {
    "resq_data".to_string()
}

fn default_api_base_url() -> String {
    "https://bigquery.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}
