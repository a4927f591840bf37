//! Error types for the Raven SDK
//!
//! Configuration errors fail fast when a delivery attempt is built. Everything
//! else is caught by the client and handed to the error reporter, so the host
//! application never crashes because an event could not be delivered.

use thiserror::Error;

/// Main error type for Raven operations
#[derive(Error, Debug)]
pub enum RavenError {
    /// No DSN configured, the SDK is disabled
    #[error("Missing configuration: no DSN provided")]
    MissingConfig,

    /// DSN could not be parsed into an ingestion endpoint and keys
    #[error("Invalid DSN: {0}")]
    InvalidDsn(String),

    /// Network-related errors (connection, DNS, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Ingestion endpoint answered with a non-success status code
    #[error("Failed to send event: HTTP {status}: {body}")]
    SendFailed {
        status: reqwest::StatusCode,
        body: String,
    },

    /// JSON serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the compressed body failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request body could not be read while capturing context
    #[error("Failed to read request body: {0}")]
    BodyRead(#[from] BodyReadError),

    /// A request header value was not valid UTF-8
    #[error("Failed to convert request header '{name}'")]
    HeaderConversion { name: String },

    /// Generic error for unexpected failures
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl RavenError {
    /// Create a generic error from any message
    pub fn from_string(msg: impl Into<String>) -> Self {
        RavenError::Other(msg.into())
    }
}

/// Error returned by a [`BodyReader`](crate::context::BodyReader)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BodyReadError(pub String);

impl BodyReadError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RavenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RavenError::MissingConfig;
        assert!(err.to_string().contains("Missing configuration"));

        let err = RavenError::from_string("test error");
        assert_eq!(err.to_string(), "Unexpected error: test error");

        let err = RavenError::HeaderConversion {
            name: "x-binary".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to convert request header 'x-binary'");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<()>("invalid").unwrap_err();
        let err: RavenError = json_err.into();
        assert!(matches!(err, RavenError::Serialization(_)));
    }

    #[test]
    fn test_error_from_body_read() {
        let err: RavenError = BodyReadError::new("stream closed").into();
        assert_eq!(err.to_string(), "Failed to read request body: stream closed");
    }
}
