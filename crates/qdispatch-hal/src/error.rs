//! Error types for the HAL crate.

use thiserror::Error;

/// Errors that can occur in HAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Provider unreachable or the session could not be opened.
    #[error("Connection to {provider} failed: {reason}")]
    Connection {
        /// Provider name (e.g. "ibmq").
        provider: String,
        /// What went wrong.
        reason: String,
    },

    /// Credential rejected by the provider.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Unknown owner/provider pairing or unregistered provider.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Job not known to the provider.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Backend is not available.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Provider returned a response the adapter could not interpret.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Generic backend error.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl HalError {
    /// Build a connection error for a provider.
    pub fn connection(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        HalError::Connection {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the provider could not be reached or refused
    /// the credential, as opposed to a failure of a single request.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            HalError::Connection { .. } | HalError::AuthenticationFailed(_)
        )
    }
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_display() {
        let err = HalError::connection("ibmq", "dns failure");
        assert_eq!(err.to_string(), "Connection to ibmq failed: dns failure");
        assert!(err.is_connection());
    }

    #[test]
    fn test_not_found_is_not_connection() {
        let err = HalError::NotFound("owner alice / provider ibmq".into());
        assert!(!err.is_connection());
        assert!(err.to_string().contains("alice"));
    }
}
