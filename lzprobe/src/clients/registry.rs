//! Model registry and deployment client.
//!
//! Covers the registry surface the model probe exercises: artifact download,
//! model registration, service deployment and image packaging (both
//! long-running operations polled to a terminal state), and the service
//! record/keys/logs lookups that follow a successful deployment. The polling
//! loop lives here, in the client layer, so probes stay straight-line
//! sequences.

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

use crate::config::DeploymentTarget;
use crate::credentials::AccessToken;
use crate::errors::{Error, Result};

/// A registered model as the registry identifies it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHandle {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub version: Option<i64>,
}

/// How to run the model for serving: environment plus entry point.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceConfig {
    pub environment: String,
    pub entry_script: String,
    pub source_directory: String,
}

/// Reference to a long-running registry operation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationRef {
    pub operation_id: String,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    state: String,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// A deployed service as the registry reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub scoring_uri: Option<String>,
}

/// Access keys for an authenticated service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceKeys {
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub secondary_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceLogs {
    #[serde(default)]
    content: String,
}

/// Client for one registry workspace.
pub struct ModelRegistryClient {
    http: Client,
    base_url: String,
}

impl ModelRegistryClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: super::http_client(request_timeout)?,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Download the model artifact. Artifact URLs are plain public
    /// downloads; no bearer token is attached.
    #[instrument(skip(self))]
    pub async fn download_artifact(&self, artifact_url: &str) -> Result<Bytes> {
        let response = self.http.get(artifact_url).send().await?;
        if !response.status().is_success() {
            return Err(unexpected("model artifact host", response).await);
        }
        let bytes = response.bytes().await?;
        info!(bytes = bytes.len(), "downloaded model artifact");
        Ok(bytes)
    }

    /// Register artifact bytes under `name`. The registry owns versioning;
    /// re-registering an existing name creates the next version.
    #[instrument(skip(self, token, artifact))]
    pub async fn register_model(&self, token: &AccessToken, name: &str, artifact: Bytes) -> Result<ModelHandle> {
        let response = self
            .http
            .post(self.url(&format!("models/{name}/versions")))
            .header("content-type", "application/octet-stream")
            .bearer_auth(&token.token)
            .body(artifact)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected("model registry", response).await);
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| Error::Decode { what: "model handle", source })
    }

    /// Point image builds at the named compute target.
    #[instrument(skip(self, token))]
    pub async fn update_image_build_compute(&self, token: &AccessToken, compute: &str) -> Result<()> {
        let response = self
            .http
            .patch(self.url("settings"))
            .bearer_auth(&token.token)
            .json(&serde_json::json!({ "image_build_compute": compute }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected("model registry", response).await);
        }
        Ok(())
    }

    /// Request a service deployment. Returns the operation to poll.
    #[instrument(skip(self, token, model, inference), fields(model = %model.name))]
    pub async fn deploy(
        &self,
        token: &AccessToken,
        service_name: &str,
        model: &ModelHandle,
        inference: &InferenceConfig,
        target: &DeploymentTarget,
    ) -> Result<OperationRef> {
        let response = self
            .http
            .post(self.url("services"))
            .bearer_auth(&token.token)
            .json(&serde_json::json!({
                "name": service_name,
                "models": [model],
                "inference_config": inference,
                "deployment_target": target,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected("model registry", response).await);
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| Error::Decode { what: "deployment", source })
    }

    /// Request a container image build from the model. Returns the operation
    /// to poll.
    #[instrument(skip(self, token, model, inference), fields(model = %model.name))]
    pub async fn package(
        &self,
        token: &AccessToken,
        model: &ModelHandle,
        inference: &InferenceConfig,
        image_name: &str,
    ) -> Result<OperationRef> {
        let response = self
            .http
            .post(self.url("packages"))
            .bearer_auth(&token.token)
            .json(&serde_json::json!({
                "models": [model],
                "inference_config": inference,
                "image_name": image_name,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected("model registry", response).await);
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| Error::Decode { what: "package", source })
    }

    /// Poll an operation until it reaches a terminal state.
    ///
    /// Blocks the probe, by design: deployment is awaited to completion, not
    /// scheduled. Fails with [`Error::OperationTimeout`] once `deadline`
    /// elapses and with [`Error::OperationFailed`] on a failed/canceled
    /// terminal state.
    #[instrument(skip(self, token), fields(operation_id = %operation.operation_id))]
    pub async fn wait_for_completion(
        &self,
        token: &AccessToken,
        operation: &OperationRef,
        poll_interval: Duration,
        deadline: Duration,
    ) -> Result<()> {
        let started = Instant::now();
        loop {
            let response = self
                .http
                .get(self.url(&format!("operations/{}", operation.operation_id)))
                .bearer_auth(&token.token)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(unexpected("model registry", response).await);
            }
            let body = response.text().await?;
            let status: OperationStatus = serde_json::from_str(&body).map_err(|source| Error::Decode {
                what: "operation status",
                source,
            })?;

            match status.state.as_str() {
                "Succeeded" => return Ok(()),
                "Failed" | "Canceled" => {
                    return Err(Error::OperationFailed {
                        id: operation.operation_id.clone(),
                        state: status.state,
                        detail: status.error.map(|e| e.to_string()).unwrap_or_default(),
                    });
                }
                state => debug!(state, "operation still running"),
            }

            if started.elapsed() >= deadline {
                return Err(Error::OperationTimeout {
                    id: operation.operation_id.clone(),
                    deadline,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Fetch the service record (state, scoring URI).
    #[instrument(skip(self, token))]
    pub async fn get_service(&self, token: &AccessToken, service_name: &str) -> Result<ServiceRecord> {
        let response = self
            .http
            .get(self.url(&format!("services/{service_name}")))
            .bearer_auth(&token.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound {
                resource: "service",
                name: service_name.to_string(),
            }),
            status if status.is_success() => {
                let body = response.text().await?;
                serde_json::from_str(&body).map_err(|source| Error::Decode { what: "service record", source })
            }
            _ => Err(unexpected("model registry", response).await),
        }
    }

    /// Fetch the service's access keys. Services on local compute are
    /// unauthenticated and return empty keys.
    #[instrument(skip(self, token))]
    pub async fn get_keys(&self, token: &AccessToken, service_name: &str) -> Result<ServiceKeys> {
        let response = self
            .http
            .post(self.url(&format!("services/{service_name}/listkeys")))
            .bearer_auth(&token.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected("model registry", response).await);
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| Error::Decode { what: "service keys", source })
    }

    /// Fetch the service's console logs.
    #[instrument(skip(self, token))]
    pub async fn get_logs(&self, token: &AccessToken, service_name: &str) -> Result<String> {
        let response = self
            .http
            .get(self.url(&format!("services/{service_name}/logs")))
            .bearer_auth(&token.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected("model registry", response).await);
        }
        let body = response.text().await?;
        let logs: ServiceLogs = serde_json::from_str(&body).map_err(|source| Error::Decode { what: "service logs", source })?;
        Ok(logs.content)
    }
}

async fn unexpected(service: &'static str, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::UnexpectedStatus { service, status, body }
}
