//! # PLATER TrAPI
//!
//! The "Question → cypher → answer" pipeline: typed query graphs, pure
//! validation, compilation into a cypher MATCH/WHERE/RETURN, answer
//! assembly into bindings plus a knowledge sub-graph, the yank phase that
//! re-fetches full properties by identifier, and the support-edge overlay.

pub mod cypher;
pub mod error;
pub mod overlay;
pub mod qgraph;
pub mod question;

pub use error::{Result, TrapiError};
pub use overlay::overlay_support_edges;
pub use qgraph::{
    Answer, Binding, Curie, KnowledgeGraph, QEdge, QNode, QueryGraph, ReasonerRequest,
    ReasonerResponse,
};
pub use question::Question;
