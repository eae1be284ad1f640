//! Unified error handling for the client.

use crate::config::ConfigError;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Conflict, not-found and other document-level failures
    #[error(transparent)]
    Document(#[from] ottoman_engine::Error),

    #[error("Server returned {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether this is a write conflict, merged or not.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Document(e) if e.is_conflict())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Document(e) if e.is_not_found())
    }
}

/// Result type alias for client calls.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error body returned by the server.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ErrorBody {
    fn describe(self, status: StatusCode) -> String {
        match (self.error.is_empty(), self.reason) {
            (false, Some(reason)) => format!("{}: {}", self.error, reason),
            (false, None) => self.error,
            (true, Some(reason)) => reason,
            (true, None) => status.canonical_reason().unwrap_or("unknown").to_string(),
        }
    }
}

/// Map a non-success response to an error.
///
/// `subject` names the document or database the request was about and is
/// carried by conflict and not-found errors.
pub(crate) async fn check(response: Response, subject: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::CONFLICT => Err(ottoman_engine::Error::Conflict(subject.to_string()).into()),
        StatusCode::NOT_FOUND => Err(ottoman_engine::Error::NotFound(subject.to_string()).into()),
        _ => {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            let reason = body.describe(status);
            tracing::debug!(status = status.as_u16(), %reason, subject, "request failed");
            Err(ClientError::Status {
                status: status.as_u16(),
                reason,
            })
        }
    }
}

/// Per-document error from a bulk response.
pub(crate) fn bulk_error(id: String, error: &str, reason: Option<String>) -> ottoman_engine::Error {
    match error {
        "conflict" => ottoman_engine::Error::Conflict(id),
        "not_found" => ottoman_engine::Error::NotFound(id),
        _ => ottoman_engine::Error::InvalidDocument(match reason {
            Some(reason) => format!("{}: {}: {}", id, error, reason),
            None => format!("{}: {}", id, error),
        }),
    }
}
