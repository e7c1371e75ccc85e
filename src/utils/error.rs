//! Error types for supplier communication
//!
//! Transport failures and payload failures are kept apart so adapters can log
//! them differently; both end up as an empty result for the caller.

use thiserror::Error;

/// Errors that can occur while talking to a supplier endpoint
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request denied by a rate limiter before it was sent
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Non-success status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Invalid endpoint URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Classify a reqwest error, separating timeouts from other failures
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }

    /// Whether a later attempt could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimit | Self::Timeout => true,
            Self::ServerError(status) => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::InvalidUrl(_) => false,
        }
    }
}

/// Errors that can occur while decoding a supplier payload
#[derive(Error, Debug)]
pub enum ParseError {
    /// Body is not well-formed XML
    #[error("Malformed XML: {0}")]
    Xml(String),

    /// Body is not well-formed JSON
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is well-formed but does not have the expected structure
    #[error("Unexpected payload shape: {0}")]
    UnexpectedShape(String),

    /// Response content type is not what the protocol requires
    #[error("Unexpected content type: {0}")]
    ContentType(String),

    /// The supplier reported an error inside an otherwise valid response
    #[error("Supplier reported error: {0}")]
    Supplier(String),

    /// A single field could not be interpreted
    #[error("Invalid value for field `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

impl From<roxmltree::Error> for ParseError {
    fn from(err: roxmltree::Error) -> Self {
        Self::Xml(err.to_string())
    }
}
