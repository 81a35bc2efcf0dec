use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::messages::anthropic::{ErrorDetail, ErrorResponse};

pub type Result<T> = std::result::Result<T, Error>;

/// Proxy errors, mapped to HTTP statuses and the Anthropic error envelope.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing required fields or parameter values outside their ranges.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The inbound api_key does not match the configured one.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Unknown route.
    #[error("{0}")]
    NotFound(String),

    /// The request body does not match the schema.
    #[error("Request validation failed: {0}")]
    Validation(String),

    /// Rate limit surfaced from the upstream.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Internal server error.
    /// If Some(message), it came from the upstream and can be shown.
    /// If None, details must not leak to the client.
    #[error("Internal server error")]
    Internal(Option<String>),

    /// The upstream response could not be interpreted.
    #[error("Invalid upstream response: {0}")]
    InvalidUpstream(String),

    /// The upstream answered with a non-2xx status.
    #[error("Upstream API error ({status}): {message}")]
    UpstreamApi {
        /// The upstream HTTP status.
        status: u16,
        /// The upstream response body.
        message: String,
    },

    /// The upstream could not be reached at all.
    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// The end-to-end deadline elapsed.
    #[error("Request timed out")]
    Timeout,
}

impl Error {
    /// The HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidUpstream(_) | Self::UpstreamApi { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// The taxonomy slot reported in the error envelope.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Authentication(_) => "authentication_error",
            Self::NotFound(_) => "not_found_error",
            Self::Validation(_) => "validation_error",
            Self::RateLimit(_) => "rate_limit_error",
            Self::Internal(_) | Self::InvalidUpstream(_) | Self::UpstreamApi { .. } => "api_error",
            Self::UpstreamUnreachable(_) => "server_error",
            Self::Timeout => "timeout_error",
        }
    }

    /// Message that is safe to expose to API consumers.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(Some(upstream_message)) => upstream_message.clone(),
            Self::Internal(None) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Maps an upstream non-2xx status and body onto the taxonomy.
    pub fn from_upstream_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimit(body),
            _ => Self::UpstreamApi { status, message: body },
        }
    }

    /// Maps transport-level failures of the upstream exchange.
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::UpstreamUnreachable(error.to_string())
        } else {
            Self::InvalidUpstream(error.to_string())
        }
    }

}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = ErrorResponse {
            kind: "error".to_string(),
            error: ErrorDetail {
                error_type: self.error_type().to_string(),
                message: self.client_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}
