//! BigQuery REST v2 client: dataset lookup/creation and replacing loads.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::TargetConfig;
use crate::core::{DatasetLookup, FieldSpec, LoadOutcome, RowSet, TableRef, TargetWriter};
use crate::error::{LoadError, Result};

use super::auth::{Credentials, TokenSource};
use super::encode::{load_schema, to_ndjson, SchemaField};

/// Load job status reported once the job has finished.
const JOB_STATE_DONE: &str = "DONE";

/// BigQuery writer backed by the REST API.
pub struct BigQueryWriter {
    client: Client,
    base_url: String,
    project: String,
    location: Option<String>,
    tokens: Arc<dyn TokenSource>,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatus,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorProto {
    fn describe(&self) -> String {
        match (&self.reason, &self.message) {
            (Some(r), Some(m)) => format!("{}: {}", r, m),
            (None, Some(m)) => m.clone(),
            (Some(r), None) => r.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    /// int64 values arrive as JSON strings.
    #[serde(default)]
    output_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

impl BigQueryWriter {
    /// Resolve credentials for `config` and build a writer.
    pub async fn connect(config: &TargetConfig, poll_interval: Duration) -> Result<Self> {
        let credentials = Credentials::resolve(config).await?;
        Self::with_credentials(config, credentials, poll_interval)
    }

    /// Build a writer from already resolved credentials.
    pub fn with_credentials(
        config: &TargetConfig,
        credentials: Credentials,
        poll_interval: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            project: credentials.project,
            location: config.location.clone(),
            tokens: credentials.tokens,
            poll_interval,
        })
    }

    /// Attach a current bearer token.
    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request.bearer_auth(self.tokens.access_token().await?))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/bigquery/v2/projects/{}{}", self.base_url, self.project, path)
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.base_url, self.project
        )
    }

    /// Load job configuration for a truncate-and-replace NDJSON load.
    fn job_body(
        &self,
        job_id: &str,
        table: &TableRef,
        schema: &[SchemaField],
    ) -> serde_json::Value {
        let reference = JobReference {
            project_id: self.project.clone(),
            job_id: job_id.to_string(),
            location: self.location.clone(),
        };
        json!({
            "jobReference": reference,
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": table.project,
                        "datasetId": table.dataset,
                        "tableId": table.table,
                    },
                    "schema": { "fields": schema },
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "writeDisposition": "WRITE_TRUNCATE",
                    "createDisposition": "CREATE_IF_NEEDED",
                }
            }
        })
    }

    async fn get_job(&self, reference: &JobReference) -> Result<JobResource> {
        let mut request = self
            .authorized(self.client.get(self.api_url(&format!("/jobs/{}", reference.job_id))))
            .await?;
        if let Some(location) = &reference.location {
            request = request.query(&[("location", location)]);
        }
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Poll until the job reaches DONE.
    async fn wait_for_job(&self, mut job: JobResource) -> Result<JobResource> {
        while job.status.state != JOB_STATE_DONE {
            debug!(
                "Job {} is {}, polling again in {:?}",
                job.job_reference.job_id, job.status.state, self.poll_interval
            );
            tokio::time::sleep(self.poll_interval).await;
            job = self.get_job(&job.job_reference).await?;
        }
        Ok(job)
    }
}

/// Pass 2xx responses through; turn anything else into `LoadError::Api`.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(api_error(status, response).await)
}

async fn api_error(status: StatusCode, response: Response) -> LoadError {
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|b| b.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(text);
    LoadError::api(status.as_u16(), message)
}

/// Assemble a `multipart/related` body of JSON metadata plus media.
fn multipart_body(boundary: &str, metadata: &[u8], media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + media.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[async_trait]
impl TargetWriter for BigQueryWriter {
    fn project(&self) -> &str {
        &self.project
    }

    async fn get_dataset(&self, dataset: &str) -> Result<DatasetLookup> {
        let response = self
            .authorized(self.client.get(self.api_url(&format!("/datasets/{}", dataset))))
            .await?
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(DatasetLookup::NotFound),
            s if s.is_success() => Ok(DatasetLookup::Found),
            s => Err(api_error(s, response).await),
        }
    }

    async fn create_dataset(&self, dataset: &str) -> Result<()> {
        let mut body = json!({
            "datasetReference": {
                "projectId": self.project,
                "datasetId": dataset,
            }
        });
        if let Some(location) = &self.location {
            body["location"] = json!(location);
        }

        let response = self
            .authorized(self.client.post(self.api_url("/datasets")))
            .await?
            .json(&body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn load_table(
        &self,
        table: &TableRef,
        rows: &RowSet,
        schema: &[FieldSpec],
    ) -> Result<LoadOutcome> {
        let fields = load_schema(rows, schema);
        let media = to_ndjson(rows, &fields);
        let job_id = format!("sqlite_bq_load_{}_{}", table.table, uuid::Uuid::new_v4().simple());
        let metadata = serde_json::to_vec(&self.job_body(&job_id, table, &fields))?;

        let boundary = format!("bq_{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, &metadata, &media);

        info!(
            "Submitting load job {} for {} ({} rows, {} bytes)",
            job_id,
            table,
            rows.len(),
            media.len()
        );
        let response = self
            .authorized(self.client.post(self.upload_url()))
            .await?
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;
        let job: JobResource = check(response).await?.json().await?;
        let job = self.wait_for_job(job).await?;

        if let Some(err) = &job.status.error_result {
            let mut message = err.describe();
            for detail in job.status.errors.iter().take(5) {
                message.push_str(&format!("; {}", detail.describe()));
            }
            return Err(LoadError::load_job(table.to_string(), message));
        }

        let output_rows = job
            .statistics
            .and_then(|s| s.load)
            .and_then(|l| l.output_rows)
            .and_then(|r| r.parse::<i64>().ok());

        Ok(LoadOutcome {
            job_id: job.job_reference.job_id,
            rows_submitted: rows.len(),
            output_rows,
        })
    }
}
