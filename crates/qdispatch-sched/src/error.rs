//! Error handling for backend selection and job monitoring.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use qdispatch_hal::HalError;

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur during selection, monitoring and catalog access.
#[derive(Error, Debug)]
pub enum SchedError {
    /// Provider unreachable or credential rejected. Not retried here.
    #[error("Connection to {provider} ({routing_group}) failed: {reason}")]
    Connection {
        /// Provider name.
        provider: String,
        /// Routing group the session was requested for.
        routing_group: String,
        /// Underlying failure.
        reason: String,
    },

    /// No verified-live eligible backend could be chosen.
    #[error("Backend selection failed in {routing_group}: {reason}")]
    Selection {
        /// Routing group the selection ran in.
        routing_group: String,
        /// Why no backend was chosen.
        reason: String,
    },

    /// Unknown owner/provider pairing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-side failure outside the connection phase.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Catalog persistence error.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SchedError {
    /// Wrap a HAL error raised while opening a session.
    pub fn connection(provider: &str, routing_group: &str, err: &HalError) -> Self {
        SchedError::Connection {
            provider: provider.to_string(),
            routing_group: routing_group.to_string(),
            reason: err.to_string(),
        }
    }

    /// Build a selection error.
    pub fn selection(routing_group: &str, reason: impl Into<String>) -> Self {
        SchedError::Selection {
            routing_group: routing_group.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<HalError> for SchedError {
    fn from(e: HalError) -> Self {
        match e {
            HalError::NotFound(msg) => SchedError::NotFound(msg),
            other => SchedError::Provider(other.to_string()),
        }
    }
}

impl From<serde_yaml_ng::Error> for SchedError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        SchedError::Config(e.to_string())
    }
}

/// A job reached `Done` but its outcome counts could not be fetched.
///
/// Carried inside the job result rather than returned as an error, so the
/// terminal status is never lost.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Result fetch failed for job {job_id} on {backend} ({routing_group}): {reason}")]
pub struct ResultFetchError {
    /// Provider job identifier.
    pub job_id: String,
    /// Backend the job ran on.
    pub backend: String,
    /// Routing group of the job.
    pub routing_group: String,
    /// Underlying failure.
    pub reason: String,
}
