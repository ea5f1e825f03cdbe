//! Scoring endpoint client.
//!
//! One JSON POST with the fixed question/context shape, optionally bearer
//! authenticated. Any HTTP status is a completed exchange worth showing the
//! operator - only transport failures are errors.

use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::instrument;

use crate::errors::{Error, Result};

/// The payload every scoring endpoint in these landing zones accepts.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRequest {
    pub query: String,
    pub context: String,
}

/// What came back: status plus the body as the service sent it.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreOutcome {
    pub status: u16,
    pub body: Value,
}

/// Client for a deployed scoring endpoint.
pub struct ScoringClient {
    http: Client,
}

impl ScoringClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: super::http_client(request_timeout)?,
        })
    }

    /// POST the request and return whatever the service answered.
    ///
    /// Non-JSON bodies are wrapped as `{"raw": ...}` so the report always
    /// carries the service's exact words.
    #[instrument(skip(self, key, request))]
    pub async fn score(&self, uri: &str, key: Option<&str>, request: &ScoreRequest) -> Result<ScoreOutcome> {
        let mut builder = self.http.post(uri).json(request);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await.map_err(Error::Http)?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| json!({ "raw": text }));
        Ok(ScoreOutcome { status, body })
    }
}
