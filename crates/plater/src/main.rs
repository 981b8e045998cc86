//! PLATER entry point: stand up a REST API in front of a Neo4j knowledge graph.

use clap::Parser;
use plater::config::PlaterConfig;
use plater::endpoints::{build_router, AppState};
use plater::error::PlaterError;
use plater::heartbeat::{spawn_heartbeat, HeartbeatPayload};
use plater::validators::{BuildComparisonValidator, ValidatorRegistry};
use plater_graph::{GraphInterface, Neo4jHttpDriver};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "plater",
    about = "Stand up a REST API in front of a Neo4j knowledge graph."
)]
struct Cli {
    /// Identifier for this build; appears in URL paths and the OpenAPI metadata
    build_tag: String,

    /// Full http(s) URL of an AUTOMAT registry to announce this instance to.
    /// Requires PLATER_SERVICE_ADDRESS to be set to this instance's public host.
    #[arg(short = 'a', long = "automat-host")]
    automat_host: Option<String>,

    /// Run registered graph validators before serving
    #[arg(short = 'v', long = "validate")]
    validate: bool,

    /// Rewrite the stored graph summary used for build comparison
    #[arg(long = "reset-summary")]
    reset_summary: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!(%err, "plater exited");
        let code = match err {
            PlaterError::Config(_) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), PlaterError> {
    let config = PlaterConfig::from_env()?;
    if cli.automat_host.is_some() && config.service_address.is_none() {
        return Err(PlaterError::Config(
            "PLATER_SERVICE_ADDRESS is required when an automat host is configured".to_string(),
        ));
    }

    let driver = Neo4jHttpDriver::new(
        &config.neo4j_host,
        config.neo4j_http_port,
        &config.neo4j_username,
        &config.neo4j_password,
    )?;
    driver.ping().await?;
    driver.ensure_edge_index(&config.edge_index_name).await?;

    let graph = Arc::new(GraphInterface::new(driver, config.edge_index_name.clone()));
    // warm the schema and summary before the routes are synthesized
    graph.get_schema().await?;

    if cli.validate || cli.reset_summary {
        let summary = graph.summary().await?.clone();
        let mut registry = ValidatorRegistry::new();
        registry.register(Box::new(BuildComparisonValidator::new(
            summary,
            &config.log_dir,
            cli.reset_summary,
        )?));
        match registry.validate_all().await {
            Ok(true) => info!("graph validation passed"),
            Ok(false) => warn!("graph validation failed, reports are in the logs directory"),
            Err(err) => warn!(%err, "graph validation could not run"),
        }
    }

    if let Some(automat_host) = cli.automat_host.clone() {
        let host = config.service_address.clone().unwrap_or_default();
        let payload = HeartbeatPayload {
            host,
            port: config.web_port,
            tag: cli.build_tag.clone(),
        };
        info!(%automat_host, tag = %payload.tag, "starting heartbeat sender");
        // dropping the handle detaches the task; it runs until process shutdown
        let _sender = spawn_heartbeat(automat_host, payload, Duration::from_secs(config.heart_rate));
    }

    let state = AppState::new(graph, Arc::new(config.clone()), cli.build_tag.clone());
    let app = build_router(state).await?.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind((config.web_host.as_str(), config.web_port))
        .await
        .map_err(|e| {
            PlaterError::Internal(format!(
                "could not bind {}:{}: {e}",
                config.web_host, config.web_port
            ))
        })?;
    info!(
        host = %config.web_host,
        port = config.web_port,
        build_tag = %cli.build_tag,
        "PLATER listening"
    );
    axum::serve(listener, app)
        .await
        .map_err(|e| PlaterError::Internal(format!("server error: {e}")))
}
