//! Scoring endpoint probe: one JSON POST, raw answer shown to the operator.

use std::time::Instant;
use tracing::{info, instrument};

use super::ProbeReport;
use crate::clients::scoring::{ScoreRequest, ScoringClient};
use crate::config::Config;
use crate::errors::Result;

/// Overrides for the configured payload and target.
#[derive(Debug, Default, Clone)]
pub struct ScoreOptions {
    pub query: Option<String>,
    pub context: Option<String>,
    pub uri: Option<String>,
}

/// POST the payload and report what came back. Needs no vault credential:
/// the endpoint's own key (if any) comes from configuration.
#[instrument(skip(config, options))]
pub async fn run(config: &Config, options: ScoreOptions) -> Result<ProbeReport> {
    let uri = match options.uri {
        Some(uri) => uri,
        None => {
            config.scoring.validate()?;
            config.scoring.uri.clone()
        }
    };

    let request = ScoreRequest {
        query: options.query.unwrap_or_else(|| config.scoring.query.clone()),
        context: options.context.unwrap_or_else(|| config.scoring.context.clone()),
    };

    let client = ScoringClient::new(config.request_timeout)?;

    let started = Instant::now();
    let outcome = client.score(&uri, config.scoring.key.as_deref(), &request).await?;
    info!(status = outcome.status, "scoring endpoint answered");

    let success = (200..300).contains(&outcome.status);
    Ok(ProbeReport {
        probe: "score",
        success,
        elapsed_ms: started.elapsed().as_millis() as u64,
        status_code: Some(outcome.status),
        error_message: (!success).then(|| format!("scoring endpoint answered HTTP {}", outcome.status)),
        response_data: Some(outcome.body),
    })
}
