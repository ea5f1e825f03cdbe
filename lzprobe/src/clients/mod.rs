//! Thin typed clients, one per external interface.
//!
//! Each client owns a `reqwest` client with the configured per-request
//! timeout, takes an already-resolved bearer token per operation, and
//! surfaces failures verbatim - no retries, no local recovery. Clients are
//! constructed by a probe, used for its handful of calls, and dropped.

pub mod datalake;
pub mod registry;
pub mod scoring;
pub mod vault;

use reqwest::Client;
use std::time::Duration;

use crate::errors::Result;

/// Build the HTTP client every service client uses.
pub(crate) fn http_client(request_timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(request_timeout).build()?)
}
