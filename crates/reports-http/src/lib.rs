#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! HTTP gateway for the reporting backend.
//!
//! This crate implements [`ReportsGateway`] over the backend's JSON API:
//!
//! - `POST /report` - Submit one monthly report
//! - `POST /reports/upload` - Upload a CSV (multipart field `file`)
//! - `GET /job-status/{job_id}` - Read an ingestion job's status
//! - `GET /dashboard?month=YYYY-MM` - Read a month's aggregates
//!
//! Responses may arrive bare or wrapped in a `{"data": ...}` envelope; both
//! shapes are accepted for every endpoint, including error bodies.
//!
//! # Usage
//!
//! ```rust,ignore
//! use reports_http::HttpGateway;
//! use reports_core::{ReportsGateway, Month};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = HttpGateway::new("http://localhost:8000/api")?;
//!     let month: Month = "2025-09".parse()?;
//!     let snapshot = gateway.dashboard(month).await?;
//!     println!("{} NGOs reported", snapshot.total_ngos_reporting);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use reports_core::{
    CSV_MIME, CsvUpload, DashboardSnapshot, FieldErrors, IngestionJob, JobId, JobStatus, Month,
    Report, ReportsError, ReportsGateway, Result, SubmitAck, UploadAccepted,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Payload tag the dashboard uses for "no reports this month".
const EMPTY_TAG: &str = "empty";

/// Reporting backend reached over HTTP.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl HttpGateway {
    /// Create a gateway for `base_url` with the default timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a gateway whose requests time out after `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportsError::Network(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(client, base_url)
    }

    /// Create a gateway with a custom HTTP client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ReportsError::InvalidParameter(format!("invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ReportsError::InvalidParameter(format!(
                "base URL cannot have paths appended: {base_url}"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// The URL every endpoint path is appended to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded,
    /// so opaque job ids cannot escape their path position.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request and return its status and body text.
    async fn execute(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        debug!(status = status.as_u16(), bytes = body.len(), "Response received");
        Ok((status, body))
    }

    /// Send a request and decode a successful, possibly enveloped, body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let (status, body) = self.execute(request).await?;
        if !status.is_success() {
            return Err(server_error(status, &body));
        }
        decode(&body)
    }
}

#[async_trait]
impl ReportsGateway for HttpGateway {
    #[instrument(skip(self, report), fields(ngo_id = report.ngo_id(), month = %report.month()))]
    async fn submit_report(&self, report: &Report) -> Result<SubmitAck> {
        let request = self.client.post(self.endpoint(&["report"])).json(report);
        let (status, body) = self.execute(request).await?;
        if !status.is_success() {
            return Err(server_error(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(SubmitAck::default());
        }
        decode_ack(&body)
    }

    #[instrument(skip(self, file), fields(file = file.file_name(), bytes = file.len()))]
    async fn upload_csv(&self, file: &CsvUpload) -> Result<UploadAccepted> {
        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.file_name().to_string())
            .mime_str(CSV_MIME)
            .map_err(|e| ReportsError::InvalidParameter(e.to_string()))?;
        let form = Form::new().part("file", part);

        let accepted: UploadAccepted = self
            .send(
                self.client
                    .post(self.endpoint(&["reports", "upload"]))
                    .multipart(form),
            )
            .await?;
        debug!(job_id = %accepted.job_id, "Upload accepted");
        Ok(accepted)
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn job_status(&self, job_id: &JobId) -> Result<IngestionJob> {
        let payload: JobStatusPayload = self
            .send(self.client.get(self.endpoint(&["job-status", job_id.as_str()])))
            .await?;
        Ok(payload.into_job(job_id.clone()))
    }

    #[instrument(skip(self), fields(month = %month))]
    async fn dashboard(&self, month: Month) -> Result<DashboardSnapshot> {
        let request = self
            .client
            .get(self.endpoint(&["dashboard"]))
            .query(&[("month", month.to_string())]);
        let (status, body) = self.execute(request).await?;

        if status == StatusCode::NOT_FOUND || has_empty_tag(&body) {
            debug!("No reports for month");
            return Err(ReportsError::EmptyState { month });
        }
        if !status.is_success() {
            return Err(server_error(status, &body));
        }

        let payload: DashboardPayload = decode(&body)?;
        Ok(payload.into_snapshot(month))
    }
}

// ============================================================================
// Response decoding
// ============================================================================

/// A payload that may or may not be wrapped in `{"data": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(inner) => inner,
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str::<Envelope<T>>(body)
        .map(Envelope::into_inner)
        .map_err(|e| ReportsError::Parse(format!("{e}: {body}")))
}

/// Submit acknowledgements carry their message at the top level, next to an
/// optional `data` echo of the stored report.
fn decode_ack(body: &str) -> Result<SubmitAck> {
    let ack: SubmitAck =
        serde_json::from_str(body).map_err(|e| ReportsError::Parse(format!("{e}: {body}")))?;
    if !ack.message.is_empty() {
        return Ok(ack);
    }
    Ok(decode(body).unwrap_or(ack))
}

fn transport_error(err: reqwest::Error) -> ReportsError {
    if err.is_timeout() {
        ReportsError::Network(format!("request timed out: {err}"))
    } else {
        ReportsError::Network(err.to_string())
    }
}

/// Error body as the backend sends it. The fields may also sit inside a
/// `data` envelope.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "fieldErrors", alias = "field_errors")]
    field_errors: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    data: Option<Value>,
}

impl ErrorBody {
    fn parse(body: &str) -> Option<Self> {
        let mut parsed: Self = serde_json::from_str(body).ok()?;
        let bare = parsed.message.is_some() || parsed.error.is_some() || parsed.field_errors.is_some();
        if !bare {
            if let Some(inner) = parsed.data.take().and_then(|data| Self::deserialize(data).ok()) {
                return Some(inner);
            }
        }
        Some(parsed)
    }
}

/// Classify a non-2xx response, keeping whatever message and field errors the
/// body carries. Undecodable bodies still produce a `Server` error.
fn server_error(status: StatusCode, body: &str) -> ReportsError {
    let parsed = ErrorBody::parse(body).unwrap_or_else(|| {
        if !body.trim().is_empty() {
            warn!(status = status.as_u16(), "Undecodable error body");
        }
        ErrorBody::default()
    });

    let message = parsed
        .message
        .or(parsed.error)
        .map(|m| m.trim().to_string())
        .unwrap_or_default();

    let field_errors: FieldErrors = parsed
        .field_errors
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(field, value)| field_message(value).map(|message| (field, message)))
        .collect();

    ReportsError::Server {
        status: status.as_u16(),
        message,
        field_errors,
    }
}

/// A field error is a string, or a list whose first string is used.
fn field_message(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Array(items) => items.into_iter().find_map(field_message),
        _ => None,
    }
}

/// True when the body, bare or enveloped, carries `"status": "empty"`.
fn has_empty_tag(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    let tagged = |v: &Value| v.get("status").and_then(Value::as_str) == Some(EMPTY_TAG);
    tagged(&value) || value.get("data").is_some_and(tagged)
}

/// `GET /job-status/{job_id}` response.
#[derive(Debug, Clone, Deserialize)]
struct JobStatusPayload {
    status: JobStatus,
    #[serde(default)]
    processed: Option<u64>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    error_message: Option<String>,
}

impl JobStatusPayload {
    fn into_job(self, job_id: JobId) -> IngestionJob {
        let job = IngestionJob::new(job_id, self.status)
            .with_progress(self.processed.unwrap_or(0), self.total.unwrap_or(0));
        match (self.status, self.error_message) {
            (JobStatus::Failed, Some(message)) => job.with_error(message),
            _ => job,
        }
    }
}

/// `GET /dashboard` response.
#[derive(Debug, Clone, Deserialize)]
struct DashboardPayload {
    total_ngos_reporting: u64,
    total_people_helped: u64,
    total_events_conducted: u64,
    total_funds_utilized: u64,
}

impl DashboardPayload {
    const fn into_snapshot(self, month: Month) -> DashboardSnapshot {
        DashboardSnapshot {
            month,
            total_ngos_reporting: self.total_ngos_reporting,
            total_people_helped: self.total_people_helped,
            total_events_conducted: self.total_events_conducted,
            total_funds_utilized: self.total_funds_utilized,
        }
    }
}
