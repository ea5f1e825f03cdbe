//! Data lake probe: write the sample table, list the filesystem, read the
//! table back, and compare.

use bytes::Bytes;
use serde_json::json;
use std::time::Instant;
use tracing::{info, instrument};

use super::ProbeReport;
use crate::clients::datalake::{DataLakeClient, DataLakePath};
use crate::config::Config;
use crate::credentials::TokenCredential;
use crate::errors::Result;
use crate::table::Table;

/// Probe variants: the default write-then-read-back, or a read-only pass
/// over an existing file.
#[derive(Debug, Clone, Copy)]
pub struct StorageOptions {
    pub read_only: bool,
    /// Row limit for read-only display
    pub limit: usize,
}

#[instrument(skip(config, credential))]
pub async fn run(config: &Config, credential: &dyn TokenCredential, options: StorageOptions) -> Result<ProbeReport> {
    config.storage.validate()?;
    let path = DataLakePath::parse(&config.storage.path)?;

    let token = credential.get_token(&config.storage.scope).await?;
    let client = DataLakeClient::new(config.request_timeout)?;

    if options.read_only {
        let started = Instant::now();
        let bytes = client.read(&token, &path).await?;
        let table = Table::from_csv(&String::from_utf8_lossy(&bytes))?;
        info!(rows = table.rows().len(), "read table from data lake");
        return Ok(ProbeReport::success(
            "storage",
            started,
            table.first_n(options.limit).to_json(),
        ));
    }

    let written = Table::sample();
    let csv = written.to_csv()?;

    let started = Instant::now();
    client.write(&token, &path, Bytes::from(csv)).await?;
    info!(path = %path, "wrote sample table");

    let listing = client.list(&token, &path).await?;
    let bytes = client.read(&token, &path).await?;
    let read_back = Table::from_csv(&String::from_utf8_lossy(&bytes))?;

    let response = json!({
        "listing": listing,
        "written": written.to_json(),
        "read_back": read_back.to_json(),
    });

    if written.rows_match_unordered(&read_back) {
        Ok(ProbeReport::success("storage", started, response))
    } else {
        Ok(ProbeReport::failure(
            "storage",
            started,
            "read-back rows differ from the written sample".to_string(),
            response,
        ))
    }
}
