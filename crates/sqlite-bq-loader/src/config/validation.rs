//! Configuration validation.

use std::collections::HashSet;

use super::Config;
use crate::error::{LoadError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.path.as_os_str().is_empty() {
        return Err(LoadError::Config("source.path is required".into()));
    }

    if config.target.dataset.is_empty() {
        return Err(LoadError::Config("target.dataset is required".into()));
    }
    if let Some(project) = &config.target.project {
        if project.is_empty() {
            return Err(LoadError::Config(
                "target.project must not be empty when set".into(),
            ));
        }
    }
    let base = &config.target.api_base_url;
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(LoadError::Config(format!(
            "target.api_base_url must be an http(s) URL, got '{}'",
            base
        )));
    }
    if config.target.timeout_secs == 0 {
        return Err(LoadError::Config(
            "target.timeout_secs must be at least 1".into(),
        ));
    }

    if config.load.job_poll_interval_ms == 0 {
        return Err(LoadError::Config(
            "load.job_poll_interval_ms must be at least 1".into(),
        ));
    }
    if config.load.tables.is_empty() {
        return Err(LoadError::Config("load.tables must not be empty".into()));
    }

    let mut table_names = HashSet::new();
    for table in &config.load.tables {
        if table.name.is_empty() {
            return Err(LoadError::Config("table name must not be empty".into()));
        }
        if !table_names.insert(table.name.as_str()) {
            return Err(LoadError::Config(format!(
                "table '{}' is listed more than once",
                table.name
            )));
        }

        let mut field_names = HashSet::new();
        for field in &table.fields {
            if field.name.is_empty() {
                return Err(LoadError::Config(format!(
                    "table '{}' has a field with an empty name",
                    table.name
                )));
            }
            if field.name != field.name.to_lowercase() {
                return Err(LoadError::Config(format!(
                    "field '{}' in table '{}' must be lowercase",
                    field.name, table.name
                )));
            }
            if !field_names.insert(field.name.as_str()) {
                return Err(LoadError::Config(format!(
                    "field '{}' appears twice in table '{}'",
                    field.name, table.name
                )));
            }
        }
    }

    Ok(())
}
