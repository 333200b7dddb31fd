//! Error types for the exporter.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Why an upstream scrape produced no data.
///
/// These never escape the refresh cycle; they are logged and turned into an
/// empty snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Every credential candidate was answered with 401.
    #[error("upstream rejected all credentials")]
    AuthRejected,

    /// 401 from an upstream that is expected to be open.
    #[error("upstream answered 401 - check external authentication configuration")]
    AuthMisconfigured,

    /// The per-attempt timeout elapsed.
    #[error("upstream request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    /// A non-success status other than 401.
    #[error("upstream returned HTTP {0}")]
    HttpStatus(u16),

    /// Any other request failure (body read, redirect, builder).
    #[error("upstream request failed: {0}")]
    Request(String),
}

impl UpstreamError {
    /// Classify a transport error from the HTTP client.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }

    /// Short label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthRejected => "auth_rejected",
            Self::AuthMisconfigured => "auth_misconfigured",
            Self::Timeout => "timeout",
            Self::Unreachable(_) => "unreachable",
            Self::HttpStatus(_) => "http_status",
            Self::Request(_) => "request",
        }
    }
}

/// Errors raised while answering an HTTP request.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to render metrics: {0}")]
    Render(#[from] std::fmt::Error),

    #[error("request handler panicked: {0}")]
    Panic(String),
}

impl HandlerError {
    /// Build the 500 response sent for this error.
    pub fn to_response(&self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("# Error: {}\n", self),
        )
            .into_response()
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        error!(error = %self, "Error serving request");
        self.to_response()
    }
}
