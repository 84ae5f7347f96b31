//! HTTP client for the remote document-extraction service.

use std::time::Duration;

use ledgergraph::retry::{retry_with_backoff, BackoffPolicy};
use ledgergraph::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(480);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response of the Parse endpoint (and of a completed parse job).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseResponse {
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub metadata: ParseMetadata,
    #[serde(default)]
    pub extraction_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseMetadata {
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseJobSubmitted {
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseJobStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub result: Option<ParseResponse>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ParseJobStatus {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "succeeded" | "done")
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "failed" | "error" | "cancelled")
    }
}

/// Thin client over the extraction service. All calls run through the
/// shared retry helper with the remote-call backoff policy.
#[derive(Clone)]
pub struct AdeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AdeClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn classify(err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::network(format!("request timed out: {err}"))
        } else if err.is_connect() || err.is_request() {
            Error::network(err.to_string())
        } else {
            Error::other(err.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::api(status.as_u16(), body))
    }

    /// Parse a document to markdown.
    pub async fn parse(
        &self,
        filename: &str,
        content: Vec<u8>,
        mime_type: &str,
    ) -> Result<ParseResponse> {
        let url = format!("{}/ade/parse", self.base_url);
        retry_with_backoff(BackoffPolicy::remote_call(), "ade_parse", || {
            let part = reqwest::multipart::Part::bytes(content.clone())
                .file_name(filename.to_string())
                .mime_str(mime_type)
                .unwrap_or_else(|_| {
                    reqwest::multipart::Part::bytes(content.clone())
                        .file_name(filename.to_string())
                });
            let form = reqwest::multipart::Form::new().part("document", part);
            let request = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .multipart(form);
            async move {
                let response = request.send().await.map_err(Self::classify)?;
                let response = Self::check_status(response).await?;
                response
                    .json::<ParseResponse>()
                    .await
                    .map_err(|e| Error::other(format!("unparseable parse response: {e}")))
            }
        })
        .await
    }

    /// Run schema extraction over parsed markdown. The schema travels as a
    /// JSON string form field.
    pub async fn extract(&self, markdown: &str, schema: &Value) -> Result<Value> {
        let url = format!("{}/ade/extract", self.base_url);
        let schema_json = serde_json::to_string(schema)?;
        retry_with_backoff(BackoffPolicy::remote_call(), "ade_extract", || {
            let form = [
                ("schema", schema_json.clone()),
                ("markdown", markdown.to_string()),
            ];
            let request = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .form(&form);
            async move {
                let response = request.send().await.map_err(Self::classify)?;
                let response = Self::check_status(response).await?;
                response
                    .json::<Value>()
                    .await
                    .map_err(|e| Error::other(format!("unparseable extract response: {e}")))
            }
        })
        .await
    }

    /// Submit an async parse job for a large document.
    pub async fn submit_parse_job(
        &self,
        filename: &str,
        content: Vec<u8>,
        mime_type: &str,
    ) -> Result<String> {
        let url = format!("{}/ade/parse-jobs", self.base_url);
        let submitted = retry_with_backoff(BackoffPolicy::remote_call(), "ade_submit_job", || {
            let part = reqwest::multipart::Part::bytes(content.clone())
                .file_name(filename.to_string())
                .mime_str(mime_type)
                .unwrap_or_else(|_| {
                    reqwest::multipart::Part::bytes(content.clone())
                        .file_name(filename.to_string())
                });
            let form = reqwest::multipart::Form::new().part("document", part);
            let request = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .multipart(form);
            async move {
                let response = request.send().await.map_err(Self::classify)?;
                let response = Self::check_status(response).await?;
                response
                    .json::<ParseJobSubmitted>()
                    .await
                    .map_err(|e| Error::other(format!("unparseable job submission: {e}")))
            }
        })
        .await?;
        Ok(submitted.job_id)
    }

    /// Read the status (and, when completed, the result) of a parse job.
    pub async fn parse_job_status(&self, job_id: &str) -> Result<ParseJobStatus> {
        let url = format!("{}/ade/parse-jobs/{job_id}", self.base_url);
        retry_with_backoff(BackoffPolicy::remote_call(), "ade_job_status", || {
            let request = self.http.get(&url).bearer_auth(&self.api_key);
            async move {
                let response = request.send().await.map_err(Self::classify)?;
                let response = Self::check_status(response).await?;
                response
                    .json::<ParseJobStatus>()
                    .await
                    .map_err(|e| Error::other(format!("unparseable job status: {e}")))
            }
        })
        .await
    }
}
