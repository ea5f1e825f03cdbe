//! Secret vault client.
//!
//! Named-secret retrieval over the vault's REST surface: one GET per secret,
//! bearer-authenticated. A missing secret is the service's 404 surfaced as
//! [`Error::NotFound`]; everything else comes back verbatim.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

use crate::credentials::AccessToken;
use crate::errors::{Error, Result};

/// REST API version sent with every vault request.
const API_VERSION: &str = "7.4";

/// A retrieved secret: the value plus the identifying metadata the vault
/// returns alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretBundle {
    /// The secret value
    pub value: String,
    /// Versioned secret identifier URL
    #[serde(default)]
    pub id: Option<String>,
    /// Service-defined attributes (enabled flag, timestamps)
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

/// Client for one vault.
pub struct SecretClient {
    http: Client,
    vault_url: String,
}

impl SecretClient {
    pub fn new(vault_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: super::http_client(request_timeout)?,
            vault_url: vault_url.into(),
        })
    }

    /// Fetch a secret by name.
    #[instrument(skip(self, token))]
    pub async fn get_secret(&self, token: &AccessToken, name: &str) -> Result<SecretBundle> {
        let url = format!("{}/secrets/{}", self.vault_url.trim_end_matches('/'), name);

        let response = self
            .http
            .get(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&token.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound {
                resource: "secret",
                name: name.to_string(),
            }),
            status if status.is_success() => {
                let body = response.text().await?;
                serde_json::from_str(&body).map_err(|source| Error::Decode { what: "secret", source })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::UnexpectedStatus {
                    service: "vault",
                    status,
                    body,
                })
            }
        }
    }
}
