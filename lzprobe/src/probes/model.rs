//! Model probe: download the artifact, register it, deploy it (or package it
//! as an image), and score the resulting endpoint.
//!
//! This is the longest sequence and it is still a straight line: every step
//! is awaited to completion before the next, including the registry's
//! long-running deployment operation, which the client polls on the probe's
//! behalf.

use serde_json::json;
use std::time::Instant;
use tracing::{info, instrument};

use super::ProbeReport;
use crate::clients::registry::{InferenceConfig, ModelRegistryClient};
use crate::clients::scoring::{ScoreRequest, ScoringClient};
use crate::config::Config;
use crate::credentials::TokenCredential;
use crate::errors::Result;

#[instrument(skip(config, credential))]
pub async fn run(config: &Config, credential: &dyn TokenCredential, package_only: bool) -> Result<ProbeReport> {
    let workspace = &config.workspace;
    workspace.validate()?;

    let token = credential.get_token(&workspace.scope).await?;
    let client = ModelRegistryClient::new(&workspace.url, config.request_timeout)?;

    let inference = InferenceConfig {
        environment: workspace.environment.clone(),
        entry_script: workspace.entry_script.clone(),
        source_directory: workspace.source_directory.clone(),
    };

    let started = Instant::now();

    let artifact = client.download_artifact(&workspace.model_url).await?;
    let model = client.register_model(&token, &workspace.model_name, artifact).await?;
    info!(model = %model.name, version = ?model.version, "registered model");

    client.update_image_build_compute(&token, &workspace.image_build_compute).await?;

    if package_only {
        let operation = client.package(&token, &model, &inference, &workspace.image_name).await?;
        client
            .wait_for_completion(&token, &operation, workspace.poll_interval, workspace.deployment_timeout)
            .await?;
        info!(image = %workspace.image_name, "model package built");

        return Ok(ProbeReport::success(
            "model",
            started,
            json!({
                "model": model,
                "image_name": workspace.image_name,
                "operation_id": operation.operation_id,
            }),
        ));
    }

    let operation = client
        .deploy(&token, &workspace.service_name, &model, &inference, &workspace.deployment)
        .await?;
    client
        .wait_for_completion(&token, &operation, workspace.poll_interval, workspace.deployment_timeout)
        .await?;

    let service = client.get_service(&token, &workspace.service_name).await?;
    let keys = client.get_keys(&token, &workspace.service_name).await?;
    let logs = client.get_logs(&token, &workspace.service_name).await?;
    info!(service = %service.name, state = %service.state, "service deployed");

    // Score the fresh endpoint with the fixture payload, exactly as an
    // operator would by hand
    let score = match &service.scoring_uri {
        Some(uri) => {
            let scoring = ScoringClient::new(config.request_timeout)?;
            let request = ScoreRequest {
                query: config.scoring.query.clone(),
                context: config.scoring.context.clone(),
            };
            Some(scoring.score(uri, keys.primary_key.as_deref(), &request).await?)
        }
        None => None,
    };

    let scored_ok = score.as_ref().map_or(true, |outcome| (200..300).contains(&outcome.status));
    let response = json!({
        "model": model,
        "service": service,
        "primary_key": keys.primary_key,
        "logs": logs,
        "score": score,
    });

    if scored_ok {
        Ok(ProbeReport::success("model", started, response))
    } else {
        Ok(ProbeReport::failure(
            "model",
            started,
            "deployed service did not answer the fixture payload with a 2xx".to_string(),
            response,
        ))
    }
}
