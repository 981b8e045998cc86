//! # AUTOMAT
//!
//! A reverse proxy and service registry that aggregates many PLATER
//! instances behind a single endpoint: liveness via heartbeats, transparent
//! proxying by build tag, and a merged OpenAPI document assembled by
//! fetching every backend's spec concurrently.

pub mod aggregator;
pub mod apidocs;
pub mod config;
pub mod error;
pub mod proxy;
pub mod registry;

pub use config::AutomatConfig;
pub use error::{AutomatError, Result};
pub use proxy::{build_router, AutomatState};
pub use registry::{Heartbeat, Liveness, Registry, RegistryEntry};
