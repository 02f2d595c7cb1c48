use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::core::util::time_range::AlignedRange;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus client is not initialized")]
    ClientUninitialized,

    #[error("prometheus request failed: {0}")]
    Upstream(String),

    #[error("prometheus query timed out: {0}")]
    Timeout(String),

    #[error("the query {query} expects one element, got {got}; please check the status of metrics service")]
    UnexpectedSampleCount { query: String, got: usize },

    #[error("label {label:?} not found in sample metric: {metric:?}")]
    MissingLabel { label: String, metric: Labels },

    #[error("failed to decode prometheus response: {0}")]
    Decode(String),
}

impl MetricsError {
    /// Transport-level failures: the endpoint is unconfigured, unreachable or slow.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            MetricsError::ClientUninitialized | MetricsError::Upstream(_) | MetricsError::Timeout(_)
        )
    }
}

/// One element of an instant-query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: Labels,
    pub value: f64,
    pub timestamp_ms: i64,
}

impl Sample {
    pub fn label(&self, name: &str) -> &str {
        self.metric.get(name).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePair {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// One stream of a range-query matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStream {
    pub metric: Labels,
    pub values: Vec<SamplePair>,
}

pub type Vector = Vec<Sample>;
pub type Matrix = Vec<SampleStream>;

/// The metrics endpoint as seen by the view assemblers.
#[async_trait]
pub trait PromClient: Send + Sync {
    async fn query(&self, query: &str, at: DateTime<Utc>) -> Result<Vector, MetricsError>;

    async fn query_range(&self, query: &str, range: &AlignedRange) -> Result<Matrix, MetricsError>;
}

/// Prometheus HTTP API client. Built without an address it answers every call with
/// [`MetricsError::ClientUninitialized`].
pub struct HttpPromClient {
    base_url: Option<String>,
    http: reqwest::Client,
}

impl HttpPromClient {
    pub fn new(address: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        let address = address.trim().trim_end_matches('/');
        Ok(Self {
            base_url: (!address.is_empty()).then(|| address.to_string()),
            http,
        })
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<PromData, MetricsError> {
        let base = self.base_url.as_ref().ok_or(MetricsError::ClientUninitialized)?;
        let url = format!("{}{}", base, path);

        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "error querying prometheus");
                if e.is_timeout() {
                    MetricsError::Timeout(e.to_string())
                } else {
                    MetricsError::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MetricsError::Upstream(e.to_string()))?;

        // Prometheus answers bad queries with 400/422 and an error envelope
        if !status.is_success() && !status.is_client_error() {
            return Err(MetricsError::Upstream(format!("status {}: {}", status, body)));
        }
        decode_response(&body)
    }
}

#[async_trait]
impl PromClient for HttpPromClient {
    async fn query(&self, query: &str, at: DateTime<Utc>) -> Result<Vector, MetricsError> {
        debug!(%query, "prometheus instant query");
        let params = [
            ("query", query.to_string()),
            ("time", format_time(at)),
        ];
        self.get("/api/v1/query", &params).await?.into_vector()
    }

    async fn query_range(&self, query: &str, range: &AlignedRange) -> Result<Matrix, MetricsError> {
        debug!(%query, "prometheus range query");
        let params = [
            ("query", query.to_string()),
            ("start", format_time(range.start)),
            ("end", format_time(range.end)),
            ("step", range.step_seconds().to_string()),
        ];
        self.get("/api/v1/query_range", &params).await?.into_matrix()
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    format!("{:.3}", t.timestamp_millis() as f64 / 1000.0)
}

// ==================== Wire format ====================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEnvelope {
    status: String,
    #[serde(default)]
    data: Option<PromData>,
    #[serde(default)]
    error_type: String,
    #[serde(default)]
    error: String,
}

#[derive(Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum PromData {
    Vector(Vec<RawSample>),
    Matrix(Vec<RawStream>),
    Scalar(RawValue),
    String(RawValue),
}

#[derive(Deserialize)]
struct RawSample {
    #[serde(default)]
    metric: Labels,
    value: RawValue,
}

#[derive(Deserialize)]
struct RawStream {
    #[serde(default)]
    metric: Labels,
    #[serde(default)]
    values: Vec<RawValue>,
}

/// `[<unix seconds>, "<value>"]`
#[derive(Deserialize)]
struct RawValue(f64, String);

impl RawValue {
    fn parse(&self) -> Result<SamplePair, MetricsError> {
        let value = self
            .1
            .parse::<f64>()
            .map_err(|_| MetricsError::Decode(format!("invalid sample value {:?}", self.1)))?;
        Ok(SamplePair {
            timestamp_ms: (self.0 * 1000.0).round() as i64,
            value,
        })
    }
}

impl PromData {
    fn into_vector(self) -> Result<Vector, MetricsError> {
        match self {
            PromData::Vector(samples) => samples
                .into_iter()
                .map(|s| {
                    let pair = s.value.parse()?;
                    Ok(Sample {
                        metric: s.metric,
                        value: pair.value,
                        timestamp_ms: pair.timestamp_ms,
                    })
                })
                .collect(),
            PromData::Scalar(v) => {
                let pair = v.parse()?;
                Ok(vec![Sample {
                    metric: Labels::new(),
                    value: pair.value,
                    timestamp_ms: pair.timestamp_ms,
                }])
            }
            _ => Err(MetricsError::Decode("expected a vector result".into())),
        }
    }

    fn into_matrix(self) -> Result<Matrix, MetricsError> {
        match self {
            PromData::Matrix(streams) => streams
                .into_iter()
                .map(|s| {
                    let values = s
                        .values
                        .iter()
                        .map(RawValue::parse)
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(SampleStream { metric: s.metric, values })
                })
                .collect(),
            _ => Err(MetricsError::Decode("expected a matrix result".into())),
        }
    }
}

fn decode_response(body: &str) -> Result<PromData, MetricsError> {
    let envelope: ApiEnvelope =
        serde_json::from_str(body).map_err(|e| MetricsError::Decode(e.to_string()))?;
    if envelope.status != "success" {
        return Err(MetricsError::Upstream(format!(
            "{}: {}",
            envelope.error_type, envelope.error
        )));
    }
    envelope
        .data
        .ok_or_else(|| MetricsError::Decode("missing data".into()))
}
