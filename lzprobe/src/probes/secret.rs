//! Vault secret probe: fetch one named secret and show the bundle.

use serde_json::json;
use std::time::Instant;
use tracing::{info, instrument};

use super::ProbeReport;
use crate::clients::vault::SecretClient;
use crate::config::Config;
use crate::credentials::TokenCredential;
use crate::errors::Result;

/// Fetch the secret and report the bundle the vault returned.
///
/// `name` overrides `vault.secret_name` from configuration. A missing secret
/// is the vault's own not-found error, surfaced unmodified.
#[instrument(skip(config, credential))]
pub async fn run(config: &Config, credential: &dyn TokenCredential, name: Option<&str>) -> Result<ProbeReport> {
    config.vault.validate_url()?;
    let name = match name {
        Some(name) => name.to_string(),
        None => {
            config.vault.validate()?;
            config.vault.secret_name.clone()
        }
    };

    let token = credential.get_token(&config.vault.scope).await?;
    let client = SecretClient::new(&config.vault.url, config.request_timeout)?;

    let started = Instant::now();
    let bundle = client.get_secret(&token, &name).await?;
    info!(secret = %name, "retrieved secret from vault");

    Ok(ProbeReport::success("secret", started, json!(bundle)))
}
