//! Error types for graph access

use thiserror::Error;

/// Error type for driver and interface operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphError {
    /// Graph database unreachable, timed out, or returned a non-success status
    #[error("graph backend error: {0}")]
    Backend(String),

    /// Cypher failed to compile or run; carries the offending statement
    #[error("cypher failed: {message}")]
    Query {
        /// The statement the server rejected
        cypher: String,
        /// The server's error message
        message: String,
    },

    /// An index with the configured name exists but is not a relationship fulltext index
    #[error("index misconfigured: {0}")]
    IndexMismatch(String),
}

impl From<reqwest::Error> for GraphError {
    fn from(error: reqwest::Error) -> Self {
        GraphError::Backend(error.to_string())
    }
}

/// Result type alias for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
