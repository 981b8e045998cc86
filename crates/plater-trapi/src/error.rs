//! Error types for the question pipeline

use thiserror::Error;

/// Error type for query-graph handling and answer assembly
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrapiError {
    /// The query graph failed validation; names the first failing invariant
    #[error("{0}")]
    InvalidQuery(String),

    /// The graph database lacks the set-cover primitive the overlay needs
    #[error("graph database does not support the set-cover procedure; overlay unavailable")]
    OverlayUnsupported,

    /// Error from the graph layer
    #[error(transparent)]
    Graph(#[from] plater_graph::GraphError),
}

/// Result type alias for question operations
pub type Result<T> = std::result::Result<T, TrapiError>;
