//! BigQuery credentials: a static bearer token or Application Default
//! Credentials.
//!
//! Resolution order:
//! 1. `target.access_token` (or `GOOGLE_OAUTH_ACCESS_TOKEN`), used as is
//! 2. Application Default Credentials via `gcp_auth`
//!    (`GOOGLE_APPLICATION_CREDENTIALS`, gcloud user credentials, or the
//!    metadata server)
//!
//! The project is `target.project` (or its environment fallbacks), else the
//! project the credentials belong to.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::TokenProvider as _;
use tracing::{debug, info};

use crate::config::{TargetConfig, ACCESS_TOKEN_ENV_VAR};
use crate::error::{LoadError, Result};

/// OAuth2 scope requested from Application Default Credentials.
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Supplies bearer tokens for BigQuery requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently valid access token.
    async fn access_token(&self) -> Result<String>;

    /// Project the credentials belong to, if known.
    async fn project_id(&self) -> Option<String>;

    /// Short name for logs.
    fn kind(&self) -> &'static str;
}

/// Fixed token from config or the environment. Never refreshed.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    async fn project_id(&self) -> Option<String> {
        None
    }

    fn kind(&self) -> &'static str {
        "static token"
    }
}

/// Application Default Credentials. `gcp_auth` caches tokens and refreshes
/// them before they expire.
pub struct ApplicationDefault {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl ApplicationDefault {
    /// Discover credentials the way the Google client libraries do.
    pub async fn discover() -> Result<Self> {
        let provider = gcp_auth::provider().await.map_err(|e| {
            LoadError::Config(format!(
                "no BigQuery access token and no Application Default Credentials \
                 (set target.access_token, {} or GOOGLE_APPLICATION_CREDENTIALS): {}",
                ACCESS_TOKEN_ENV_VAR, e
            ))
        })?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl TokenSource for ApplicationDefault {
    async fn access_token(&self) -> Result<String> {
        let token = self.provider.token(&[BIGQUERY_SCOPE]).await?;
        Ok(token.as_str().to_string())
    }

    async fn project_id(&self) -> Option<String> {
        match self.provider.project_id().await {
            Ok(project) => Some(project.to_string()),
            Err(e) => {
                debug!("Credentials carry no project id: {}", e);
                None
            }
        }
    }

    fn kind(&self) -> &'static str {
        "application default credentials"
    }
}

/// Resolved project plus the token source for it.
pub struct Credentials {
    pub project: String,
    pub tokens: Arc<dyn TokenSource>,
}

impl Credentials {
    /// Resolve credentials from config, falling back to ADC discovery.
    pub async fn resolve(config: &TargetConfig) -> Result<Self> {
        Self::resolve_with(config, || async {
            let adc: Arc<dyn TokenSource> = Arc::new(ApplicationDefault::discover().await?);
            Ok::<_, LoadError>(adc)
        })
        .await
    }

    /// Resolve with a custom fallback; `discover` only runs when no static
    /// token is configured.
    pub async fn resolve_with<F, Fut>(config: &TargetConfig, discover: F) -> Result<Self>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn TokenSource>>>,
    {
        let tokens: Arc<dyn TokenSource> = match &config.access_token {
            Some(token) => Arc::new(StaticToken::new(token.clone())),
            None => discover().await?,
        };

        let project = match &config.project {
            Some(project) => project.clone(),
            None => match tokens.project_id().await {
                Some(project) => {
                    info!("Using project {} from {}", project, tokens.kind());
                    project
                }
                None => config.require_project()?.to_string(),
            },
        };

        debug!("BigQuery auth: {} for project {}", tokens.kind(), project);
        Ok(Self { project, tokens })
    }
}
