//! The probe sequences and their shared report envelope.
//!
//! Every probe is the same shape: resolve a credential, construct short-lived
//! clients, perform one domain operation (plus at most one follow-up read to
//! confirm a write), and hand back a [`ProbeReport`] carrying the service's
//! raw response. Probes never retry, never clean up the remote side effects
//! they create, and never run concurrently with each other.
//!
//! Hard failures - bad config, authentication, transport, a missing resource -
//! propagate as errors exactly as the client layer raised them. A probe that
//! completed its exchange but observed something off (a non-200 score, a
//! read-back mismatch) returns a report with `success: false` so the operator
//! sees what actually came back.

pub mod model;
pub mod score;
pub mod secret;
pub mod sql;
pub mod storage;

use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

/// The result of one probe run, printed as JSON for the operator.
///
/// `elapsed_ms` covers the domain operation only; interactive credential
/// acquisition is not timed (an operator fetching coffee mid-prompt is not a
/// service latency).
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Which probe ran
    pub probe: &'static str,
    /// Whether the probe's exchange came back as expected
    pub success: bool,
    /// Wall time of the domain operation in milliseconds
    pub elapsed_ms: u64,
    /// HTTP status code, where the probe's operation has exactly one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// What went wrong, for completed-but-unsuccessful probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The service's raw response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}

impl ProbeReport {
    pub fn success(probe: &'static str, started: Instant, response_data: Value) -> Self {
        Self {
            probe,
            success: true,
            elapsed_ms: started.elapsed().as_millis() as u64,
            status_code: None,
            error_message: None,
            response_data: Some(response_data),
        }
    }

    pub fn failure(probe: &'static str, started: Instant, message: String, response_data: Value) -> Self {
        Self {
            probe,
            success: false,
            elapsed_ms: started.elapsed().as_millis() as u64,
            status_code: None,
            error_message: Some(message),
            response_data: Some(response_data),
        }
    }
}
