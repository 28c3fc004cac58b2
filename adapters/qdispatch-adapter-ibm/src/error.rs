//! Error types for the IBM Quantum adapter.

use qdispatch_hal::HalError;
use thiserror::Error;

/// Result type for IBM operations.
pub type IbmResult<T> = Result<T, IbmError>;

/// Provider name used in errors handed to the core.
pub(crate) const PROVIDER: &str = "ibmq";

/// Errors that can occur when talking to IBM Quantum.
#[derive(Debug, Error)]
pub enum IbmError {
    /// Credential carries no token.
    #[error("IBM Quantum credential has no API token")]
    MissingToken,

    /// Token cannot be used as a header value.
    #[error("Invalid IBM Quantum API token")]
    InvalidToken,

    /// IAM token exchange failed.
    #[error("IAM token exchange failed: {0}")]
    IamTokenExchange(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error.
    #[error("IBM Quantum API error: {message}")]
    ApiError {
        /// Error code from API.
        code: Option<String>,
        /// Error message.
        message: String,
    },

    /// Job not found.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Backend not available.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl IbmError {
    /// Whether the failure happened before any response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, IbmError::HttpError(e) if e.is_connect() || e.is_timeout() || e.is_request())
    }
}

impl From<IbmError> for HalError {
    fn from(e: IbmError) -> Self {
        if e.is_transport() {
            return HalError::connection(PROVIDER, e.to_string());
        }
        match e {
            IbmError::MissingToken | IbmError::InvalidToken | IbmError::IamTokenExchange(_) => {
                HalError::AuthenticationFailed(e.to_string())
            }
            IbmError::ApiError {
                code: Some(ref code),
                ..
            } if code == "401" || code == "403" => HalError::AuthenticationFailed(e.to_string()),
            IbmError::JobNotFound(id) => HalError::JobNotFound(id),
            IbmError::BackendUnavailable(msg) => HalError::BackendUnavailable(msg),
            IbmError::JsonError(err) => HalError::InvalidResponse(err.to_string()),
            IbmError::InvalidParameter(msg) => HalError::Configuration(msg),
            _ => HalError::Backend(e.to_string()),
        }
    }
}
