//! AUTOMAT entry point: federate PLATER instances behind one endpoint.

use automat::config::AutomatConfig;
use automat::error::AutomatError;
use automat::proxy::{build_router, AutomatState};
use automat::registry::Registry;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        error!(%err, "automat exited");
        let code = match err {
            AutomatError::Config(_) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run() -> Result<(), AutomatError> {
    let config = AutomatConfig::from_env()?;
    let registry = Arc::new(Registry::new(config.age));
    let state = AutomatState::new(registry, config.static_dir.clone());
    let app = build_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind((config.web_host.as_str(), config.web_port))
        .await
        .map_err(|e| {
            AutomatError::Internal(format!(
                "could not bind {}:{}: {e}",
                config.web_host, config.web_port
            ))
        })?;
    info!(host = %config.web_host, port = config.web_port, "AUTOMAT listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| AutomatError::Internal(format!("server error: {e}")))
}
