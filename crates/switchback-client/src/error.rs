//! Error types for the client library.

use serde::Deserialize;
use thiserror::Error;

/// Error envelope returned by the API.
///
/// The `error` object can appear in a non-2xx body or inside a 200 body.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// The error detail object from the API.
    pub error: ErrorDetail,
}

/// Detailed error information from the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Error category (e.g. `invalid_request_error`, `server_error`).
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    /// Machine-readable code; the API sends strings or numbers.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Request parameter the error refers to.
    #[serde(default)]
    pub param: Option<serde_json::Value>,
}

fn value_to_string(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// A server-reported error, surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Message text from the server.
    pub message: String,
    /// Error category, when reported.
    pub error_type: Option<String>,
    /// Error code, when reported.
    pub code: Option<String>,
    /// Offending request parameter, when reported.
    pub param: Option<String>,
    /// HTTP status the error arrived with.
    pub status: Option<u16>,
}

impl ApiError {
    /// Creates an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            code: None,
            param: None,
            status: None,
        }
    }

    /// Builds an error from the API's error object.
    #[must_use]
    pub fn from_detail(detail: ErrorDetail, status: u16) -> Self {
        let code = value_to_string(detail.code);
        let message = detail
            .message
            .filter(|m| !m.is_empty())
            .or_else(|| code.clone())
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self {
            message,
            error_type: detail.error_type,
            code,
            param: value_to_string(detail.param),
            status: Some(status),
        }
    }

    /// Builds an error for a non-2xx response without a decodable error object.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body.to_string()
        };

        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    /// Returns `true` when the server marked the error as transient.
    ///
    /// Transient errors are rate limits and server-side failures, identified by
    /// type, code or HTTP status.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        let transient_type = self
            .error_type
            .as_deref()
            .is_some_and(|t| matches!(t, "server_error" | "rate_limit_error" | "rate_limit_exceeded"));
        let transient_code = self
            .code
            .as_deref()
            .is_some_and(|c| matches!(c, "server_error" | "rate_limit_exceeded" | "server_is_overloaded"));
        let transient_status = self
            .status
            .is_some_and(|s| s == 429 || (500..=599).contains(&s));

        transient_type || transient_code || transient_status
    }
}

/// Errors that can occur when talking to the Responses API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Network or HTTP request failure.
    ///
    /// Indicates issues like DNS resolution, connection failures, or socket errors.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Middleware layer error.
    ///
    /// Errors from the retry layer, including exhausted retries.
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error reported by the server.
    #[error("API error: {0}")]
    Api(ApiError),

    /// Client configuration issue.
    ///
    /// Invalid base URL, missing API key, or an HTTP client that failed to build.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request took longer than the configured timeout.
    #[error("Timeout error")]
    Timeout,

    /// The request was rejected before it was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The API returned data that doesn't match the expected format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ApiError> for ClientError {
    fn from(error: ApiError) -> Self {
        Self::Api(error)
    }
}

impl ClientError {
    /// Check if this error is potentially retryable.
    ///
    /// Returns `true` for network errors, timeouts and transient API errors.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Middleware(_) | Self::Timeout => true,
            Self::Api(api) => api.is_transient(),
            _ => false,
        }
    }

    /// The API error, if the server reported one.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(api) => Some(api),
            _ => None,
        }
    }
}
