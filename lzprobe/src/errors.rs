use thiserror::Error as ThisError;

/// Probe failures.
///
/// There is no local error taxonomy beyond what the underlying client
/// libraries report: a probe either completes (and its report says what the
/// service answered) or the failure from the client layer propagates here
/// unmodified. Nothing is retried and nothing is downgraded to a warning.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Credential acquisition failed (device-code prompt abandoned, expired,
    /// denied, or the identity endpoint rejected the request)
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// The named remote resource does not exist
    #[error("{resource} {name:?} not found")]
    NotFound { resource: &'static str, name: String },

    /// A service answered with a status the operation cannot proceed from.
    /// The body is carried verbatim for operator inspection.
    #[error("{service} returned HTTP {status}: {body}")]
    UnexpectedStatus {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    /// Transport-level HTTP failure (connect, TLS, timeout)
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Relational store failure
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A response body that should have been JSON wasn't
    #[error("failed to decode {what} response: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A long-running service operation did not reach a terminal state
    /// before the configured deadline
    #[error("operation {id} did not complete within {deadline:?}")]
    OperationTimeout { id: String, deadline: std::time::Duration },

    /// A long-running service operation ended in a non-success terminal
    /// state; `detail` is the service's own error payload
    #[error("operation {id} ended in state {state}: {detail}")]
    OperationFailed { id: String, state: String, detail: String },

    /// Invalid or incomplete configuration (placeholder values included)
    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config { message: message.into() }
    }
}

/// Type alias for probe operation results
pub type Result<T> = std::result::Result<T, Error>;
