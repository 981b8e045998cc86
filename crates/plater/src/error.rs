//! Error types for the PLATER service

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use plater_graph::GraphError;
use plater_trapi::TrapiError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error type for service operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaterError {
    /// Missing or malformed configuration; fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// The request body could not be parsed
    #[error("{0}")]
    BadRequest(String),

    /// Error from the question pipeline
    #[error(transparent)]
    Trapi(#[from] TrapiError),

    /// Error from the graph layer
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Anything else that should surface as a 500
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, PlaterError>;

fn graph_error_response(error: GraphError) -> Response {
    match error {
        GraphError::Query { cypher, message } => {
            // the offending cypher is logged, never surfaced
            error!(%cypher, %message, "cypher failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "graph query failed"})),
            )
                .into_response()
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": other.to_string()})),
        )
            .into_response(),
    }
}

impl IntoResponse for PlaterError {
    fn into_response(self) -> Response {
        match self {
            PlaterError::BadRequest(message)
            | PlaterError::Trapi(TrapiError::InvalidQuery(message)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"Error": message})),
            )
                .into_response(),
            PlaterError::Trapi(TrapiError::OverlayUnsupported) => (
                StatusCode::NOT_IMPLEMENTED,
                Json(json!({"error": TrapiError::OverlayUnsupported.to_string()})),
            )
                .into_response(),
            PlaterError::Trapi(TrapiError::Graph(error)) | PlaterError::Graph(error) => {
                graph_error_response(error)
            }
            PlaterError::Trapi(other) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": other.to_string()})),
            )
                .into_response(),
            PlaterError::Config(message) | PlaterError::Internal(message) => {
                error!(%message, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": message})),
                )
                    .into_response()
            }
        }
    }
}
