//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{LoadError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Copy of the configuration with secrets blanked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.target.access_token.is_some() {
            config.target.access_token = Some("[REDACTED]".to_string());
        }
        config
    }

    /// SHA256 of the (redacted) configuration, logged to identify a run.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(&self.redacted()).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Fill `project` and `access_token` from the process environment.
    ///
    /// Application Default Credentials are discovered later, only when no
    /// token is set.
    pub fn resolve_env(self) -> Self {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Fill `project` and `access_token` from `lookup` where unset.
    pub fn resolve_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.target.project.is_none() {
            self.target.project = PROJECT_ENV_VARS
                .iter()
                .find_map(|key| lookup(key).filter(|v| !v.is_empty()));
        }
        if self.target.access_token.is_none() {
            self.target.access_token = lookup(ACCESS_TOKEN_ENV_VAR).filter(|v| !v.is_empty());
        }
        self
    }
}

impl TargetConfig {
    /// The project, or a configuration error naming where to set it.
    pub fn require_project(&self) -> Result<&str> {
        self.project.as_deref().ok_or_else(|| {
            LoadError::Config(format!(
                "target.project is not set (set it in the config file or via {})",
                PROJECT_ENV_VARS.join(" / ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldType;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.source.path, PathBuf::from("mock_resq.db"));
        assert_eq!(config.target.dataset, "resq_data");
        assert_eq!(config.load.tables.len(), 3);
        assert_eq!(config.load.job_poll_interval_ms, 1000);
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
source:
  path: /data/resq.db
target:
  project: acme-analytics
  location: EU
load:
  tables:
    - name: users
      fields:
        - name: id
          type: INTEGER
        - name: registereddate
          type: TIMESTAMP
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.path, PathBuf::from("/data/resq.db"));
        assert_eq!(config.target.project.as_deref(), Some("acme-analytics"));
        assert_eq!(config.target.dataset, "resq_data");
        assert_eq!(config.load.tables.len(), 1);
        assert_eq!(config.load.tables[0].fields[1].field_type, FieldType::Timestamp);
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let err = Config::from_yaml("target:\n  timeout_secs: 0\n").unwrap_err();
        assert!(matches!(err, LoadError::Config(_)));
    }

    #[test]
    fn test_resolve_with_fills_missing_values() {
        let env: HashMap<&str, &str> = [
            ("GCLOUD_PROJECT", "fallback-project"),
            ("GOOGLE_OAUTH_ACCESS_TOKEN", "token-123"),
        ]
        .into_iter()
        .collect();
        let config = Config::default().resolve_with(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.target.require_project().unwrap(), "fallback-project");
        assert_eq!(config.target.access_token.as_deref(), Some("token-123"));
    }

    #[test]
    fn test_resolve_with_keeps_explicit_values() {
        let mut config = Config::default();
        config.target.project = Some("explicit".into());
        let config = config.resolve_with(|_| Some("from-env".to_string()));
        assert_eq!(config.target.project.as_deref(), Some("explicit"));
        assert_eq!(config.target.access_token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_missing_project_is_config_error() {
        let config = Config::default().resolve_with(|_| None);
        assert!(matches!(
            config.target.require_project(),
            Err(LoadError::Config(_))
        ));
    }

    #[test]
    fn test_hash_is_stable_and_ignores_token() {
        let mut a = Config::default();
        let mut b = Config::default();
        a.target.access_token = Some("one".into());
        b.target.access_token = Some("two".into());
        assert_eq!(a.hash(), b.hash());

        b.target.dataset = "other".into();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_redacted_hides_token() {
        let mut config = Config::default();
        config.target.access_token = Some("secret".into());
        let yaml = serde_yaml::to_string(&config.redacted()).unwrap();
        assert!(!yaml.contains("secret"));
        assert!(yaml.contains("[REDACTED]"));
    }
}
