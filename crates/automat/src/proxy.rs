//! Proxy router
//!
//! Dispatch by first path segment: fixed handlers for the docs page,
//! the merged spec, heartbeats and the registry listing; any other
//! segment is looked up in the registry and the rest of the request is
//! proxied to that backend with its response relayed verbatim. Unknown
//! segments fall through to static documentation assets, then 404.

use crate::aggregator::merged_openapi;
use crate::apidocs;
use crate::error::{AutomatError, Result};
use crate::registry::{Heartbeat, Registry, RegistrySnapshot};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use tower_http::services::ServeDir;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_PROXY_BODY: usize = 64 * 1024 * 1024;

/// State shared across handlers
#[derive(Clone)]
pub struct AutomatState {
    pub registry: Arc<Registry>,
    /// Pool for proxied backend requests
    pub proxy_client: reqwest::Client,
    /// Pool for spec aggregation fetches
    pub spec_client: reqwest::Client,
    pub static_dir: PathBuf,
}

impl AutomatState {
    #[must_use]
    pub fn new(registry: Arc<Registry>, static_dir: PathBuf) -> Self {
        let client = || {
            reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_default()
        };
        Self {
            registry,
            proxy_client: client(),
            spec_client: client(),
            static_dir,
        }
    }
}

/// Assemble the AUTOMAT router.
pub fn build_router(state: AutomatState) -> Router {
    Router::new()
        .route("/", get(apidocs_handler))
        .route("/apidocs", get(apidocs_handler))
        .route("/openapi.json", get(openapi_handler))
        .route("/openapi.yml", get(openapi_handler))
        .route("/heartbeat", post(heartbeat_handler))
        .route("/registry", get(registry_handler))
        .fallback(proxy_handler)
        .with_state(state)
}

async fn apidocs_handler() -> Result<Html<String>> {
    apidocs::render_swagger_ui("Automat", "./openapi.json")
        .map(Html)
        .map_err(|e| AutomatError::Internal(format!("could not render api docs: {e}")))
}

async fn openapi_handler(State(state): State<AutomatState>) -> Json<Value> {
    Json(merged_openapi(&state.registry, &state.spec_client).await)
}

async fn heartbeat_handler(
    State(state): State<AutomatState>,
    Json(heartbeat): Json<Heartbeat>,
) -> Json<RegistrySnapshot> {
    debug!(tag = %heartbeat.tag, url = %heartbeat.url(), "heartbeat received");
    Json(state.registry.refresh(heartbeat))
}

async fn registry_handler(State(state): State<AutomatState>) -> Json<Vec<String>> {
    Json(state.registry.get_registry().into_keys().collect())
}

async fn proxy_handler(State(state): State<AutomatState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    let Some((tag, remainder)) = segments.split_first() else {
        return AutomatError::NotFound(path).into_response();
    };

    if let Some(host) = state.registry.get_host_by_tag(tag) {
        debug!(%tag, %host, "found backend for request");
        return match proxy_to_backend(&state, &host, remainder, request).await {
            Ok(response) => response,
            Err(error) => error.into_response(),
        };
    }
    serve_static(&state, &path, request).await
}

/// Forward the request, preserving method, query string, headers and
/// body, and relay the backend's status and body verbatim.
async fn proxy_to_backend(
    state: &AutomatState,
    host: &str,
    remainder: &[String],
    request: Request,
) -> Result<Response> {
    let query = request
        .uri()
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    let url = format!("http://{host}/{}{query}", remainder.join("/"));
    let method = request.method().clone();
    let mut headers = request.headers().clone();
    // the proxy sets its own connection-level headers
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    let body = axum::body::to_bytes(request.into_body(), MAX_PROXY_BODY)
        .await
        .map_err(|e| AutomatError::Internal(format!("could not read request body: {e}")))?;

    debug!(%url, "proxying request");
    let backend = state
        .proxy_client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| AutomatError::Upstream(format!("{url}: {e}")))?;

    let status = backend.status();
    let content_type = backend.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = backend
        .bytes()
        .await
        .map_err(|e| AutomatError::Upstream(format!("{url}: {e}")))?;

    let mut response = Response::builder().status(status);
    if let Some(content_type) = content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(bytes))
        .map_err(|e| AutomatError::Internal(e.to_string()))
}

async fn serve_static(state: &AutomatState, path: &str, request: Request) -> Response {
    let service = ServeDir::new(&state.static_dir);
    match service.oneshot(request).await {
        Ok(response) if response.status() != StatusCode::NOT_FOUND => {
            response.map(Body::new).into_response()
        }
        _ => AutomatError::NotFound(path.to_string()).into_response(),
    }
}
