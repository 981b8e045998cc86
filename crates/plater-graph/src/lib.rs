//! # PLATER Graph Access
//!
//! Thin client over a Neo4j transactional HTTP endpoint plus the domain
//! operations PLATER needs on top of it: schema discovery, summary
//! statistics, node and one-hop lookups, and APOC set-cover queries.
//!
//! The [`driver::Neo4jHttpDriver`] speaks the batch-statement wire protocol
//! and normalizes rows-with-columns responses into flat records. The
//! [`interface::GraphInterface`] wraps a single driver for the lifetime of
//! the process and memoizes the graph schema behind a once-latch.

pub mod cypher;
pub mod driver;
pub mod error;
pub mod interface;

pub use driver::{Neo4jHttpDriver, Record, TxResponse};
pub use error::{GraphError, Result};
pub use interface::{CoverEdge, GraphInterface, MiniSchemaRow, Schema, Summary, SummaryEntry};
