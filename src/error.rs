//! Error types for the offline orchestrator
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Fetch Error Enum ==
/// Failure of a single network attempt.
///
/// Any of these counts as a connectivity failure for the fallback chains;
/// an HTTP error status is a *successful* fetch and never shows up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The network could not be reached or the connection broke mid-response
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    /// The attempt did not settle within the configured bound
    #[error("Network request timed out after {0:?}")]
    TimedOut(Duration),

    /// The request could not be turned into a network call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == Orchestrator Error Enum ==
/// Unified error type for the orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Network failure with no safe fallback
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A required manifest asset could not be fetched during install
    #[error("Install failed fetching {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// Lifecycle signal received in a state that does not accept it
    #[error("Invalid lifecycle transition: {0}")]
    InvalidTransition(String),

    /// Durable storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Stored data could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::Fetch(FetchError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Error::Fetch(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::InstallFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::InvalidTransition(_) => StatusCode::CONFLICT,
            Error::Storage(_) | Error::Serialization(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the orchestrator.
pub type Result<T> = std::result::Result<T, Error>;
