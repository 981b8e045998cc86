//! Error types for the AUTOMAT service

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error type for registry and proxy operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AutomatError {
    /// Missing or malformed configuration; fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// A backend could not be reached (a backend that answered, even with
    /// an error status, is relayed verbatim instead)
    #[error("failed to reach backend: {0}")]
    Upstream(String),

    /// The first path segment matches no registered tag and no static asset
    #[error("no registered backend servers on {0}")]
    NotFound(String),

    /// Anything else that should surface as a 500
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for AUTOMAT operations
pub type Result<T> = std::result::Result<T, AutomatError>;

impl IntoResponse for AutomatError {
    fn into_response(self) -> Response {
        let status = match &self {
            AutomatError::NotFound(_) => StatusCode::NOT_FOUND,
            AutomatError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AutomatError::Config(_) | AutomatError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(%self, "request failed");
        }
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AutomatError::NotFound("/plater-z/thing".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upstream_maps_to_502() {
        let response = AutomatError::Upstream("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_maps_to_500() {
        let response = AutomatError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
