//! # PLATER
//!
//! A per-graph query service exposing a typed HTTP API over a Neo4j
//! knowledge graph: node lookup, one-hop traversal, free-form cypher, and
//! structured graph-pattern queries, with routes synthesized from the live
//! graph schema at startup.

pub mod apidocs;
pub mod bl;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod heartbeat;
pub mod openapi;
pub mod validators;

pub use config::PlaterConfig;
pub use endpoints::{build_router, AppState, EndpointKind};
pub use error::{PlaterError, Result};
