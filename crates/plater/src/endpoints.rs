//! Endpoint factory: HTTP routes synthesized from the live graph schema
//!
//! Every endpoint kind is a variant of [`EndpointKind`] with one
//! construction site in [`build_router`]. Schema-driven routes come first:
//! a `/{type}/{curie}` lookup per node type and a
//! `/{source}/{target}/{curie}` traversal per connected pair, then the
//! fixed routes (cypher, schema, summary, structured query, overlay,
//! OpenAPI, docs).

use crate::apidocs;
use crate::bl::BlLookup;
use crate::config::PlaterConfig;
use crate::error::{PlaterError, Result};
use crate::openapi;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use plater_graph::driver::{Record, TxResponse};
use plater_graph::{GraphInterface, Schema, Summary};
use plater_trapi::question::one_hop_templates;
use plater_trapi::{overlay_support_edges, Question, ReasonerRequest, ReasonerResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// The kinds of endpoint PLATER serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Hop,
    Node,
    Cypher,
    OpenApi,
    Schema,
    SwaggerUi,
    ReasonerApi,
    Simple,
    Summary,
    Overlay,
    About,
    Predicates,
    Query,
}

impl EndpointKind {
    /// Stable name used in structured log records
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointKind::Hop => "hop",
            EndpointKind::Node => "node",
            EndpointKind::Cypher => "cypher",
            EndpointKind::OpenApi => "open_api",
            EndpointKind::Schema => "graph_schema",
            EndpointKind::SwaggerUi => "swagger_ui",
            EndpointKind::ReasonerApi => "reasonerapi",
            EndpointKind::Simple => "simple",
            EndpointKind::Summary => "graph_summary",
            EndpointKind::Overlay => "overlay",
            EndpointKind::About => "about",
            EndpointKind::Predicates => "predicates",
            EndpointKind::Query => "query",
        }
    }
}

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<GraphInterface>,
    pub config: Arc<PlaterConfig>,
    pub build_tag: String,
    pub bl: Arc<BlLookup>,
}

impl AppState {
    pub fn new(graph: Arc<GraphInterface>, config: Arc<PlaterConfig>, build_tag: String) -> Self {
        let bl = Arc::new(BlLookup::new(config.bl_url.clone()));
        Self {
            graph,
            config,
            build_tag,
            bl,
        }
    }
}

/// Node types and connected `(source, target)` pairs a schema gives routes to
#[must_use]
pub fn schema_routes(schema: &Schema) -> (Vec<String>, Vec<(String, String)>) {
    let mut node_types = BTreeSet::new();
    let mut pairs = BTreeSet::new();
    for (source, targets) in schema {
        node_types.insert(source.clone());
        for target in targets.keys() {
            node_types.insert(target.clone());
            pairs.insert((source.clone(), target.clone()));
        }
    }
    (
        node_types.into_iter().collect(),
        pairs.into_iter().collect(),
    )
}

/// Assemble the service router from the live schema.
pub async fn build_router(state: AppState) -> Result<Router> {
    let schema = state.graph.get_schema().await?.clone();
    let (node_types, hop_pairs) = schema_routes(&schema);
    info!(
        node_routes = node_types.len(),
        hop_routes = hop_pairs.len(),
        "synthesizing routes from graph schema"
    );

    let mut router = Router::new();
    for node_type in node_types {
        let path = format!("/{node_type}/:curie");
        router = router.route(
            &path,
            get(move |State(state): State<AppState>, Path(curie): Path<String>| {
                let node_type = node_type.clone();
                async move { node_handler(state, node_type, curie).await }
            }),
        );
    }
    for (source_type, target_type) in hop_pairs {
        let path = format!("/{source_type}/{target_type}/:curie");
        router = router.route(
            &path,
            get(move |State(state): State<AppState>, Path(curie): Path<String>| {
                let source_type = source_type.clone();
                let target_type = target_type.clone();
                async move { hop_handler(state, source_type, target_type, curie).await }
            }),
        );
    }

    let router = router
        .route("/cypher", post(cypher_handler))
        .route("/graph/schema", get(schema_handler))
        .route("/predicates", get(predicates_handler))
        .route("/graph/summary", get(summary_handler))
        .route("/simple_spec", get(simple_spec_handler))
        .route(
            "/reasonerapi",
            get(reasoner_templates_handler).post(reasoner_query_handler),
        )
        .route("/query", post(query_handler))
        .route("/overlay", post(overlay_handler))
        .route("/about", get(about_handler))
        .route("/openapi.json", get(openapi_handler))
        .route("/apidocs", get(apidocs_handler));

    Ok(router.with_state(state))
}

#[instrument(skip(state), fields(endpoint = EndpointKind::Node.as_str()))]
async fn node_handler(
    state: AppState,
    node_type: String,
    curie: String,
) -> Result<Json<Vec<Record>>> {
    let started = Instant::now();
    let nodes = state.graph.get_node(&node_type, &curie).await.map_err(|e| {
        error!("node lookup failed: {e}");
        e
    })?;
    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        rows = nodes.len(),
        "node lookup completed"
    );
    Ok(Json(nodes))
}

#[instrument(skip(state), fields(endpoint = EndpointKind::Hop.as_str()))]
async fn hop_handler(
    state: AppState,
    source_type: String,
    target_type: String,
    curie: String,
) -> Result<Json<Vec<Vec<Value>>>> {
    let started = Instant::now();
    let hops = state
        .graph
        .get_single_hops(&source_type, &target_type, &curie)
        .await
        .map_err(|e| {
            error!("one-hop lookup failed: {e}");
            e
        })?;
    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        rows = hops.len(),
        "one-hop lookup completed"
    );
    Ok(Json(hops))
}

#[derive(Debug, Deserialize)]
struct CypherRequest {
    query: String,
}

#[instrument(skip(state, body), fields(endpoint = EndpointKind::Cypher.as_str()))]
async fn cypher_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TxResponse>> {
    let request: CypherRequest = serde_json::from_slice(&body)
        .map_err(|e| PlaterError::BadRequest(format!("could not parse request: {e}")))?;
    let started = Instant::now();
    let response = state.graph.run_cypher(&request.query).await.map_err(|e| {
        error!("cypher request failed: {e}");
        e
    })?;
    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        "cypher request completed"
    );
    Ok(Json(response))
}

#[instrument(skip(state), fields(endpoint = EndpointKind::Schema.as_str()))]
async fn schema_handler(State(state): State<AppState>) -> Result<Json<Schema>> {
    Ok(Json(state.graph.get_schema().await.map(Clone::clone)?))
}

#[instrument(skip(state), fields(endpoint = EndpointKind::Predicates.as_str()))]
async fn predicates_handler(State(state): State<AppState>) -> Result<Json<Schema>> {
    Ok(Json(state.graph.get_schema().await.map(Clone::clone)?))
}

#[instrument(skip(state), fields(endpoint = EndpointKind::Summary.as_str()))]
async fn summary_handler(State(state): State<AppState>) -> Result<Json<Summary>> {
    Ok(Json(state.graph.summary().await.map(Clone::clone)?))
}

#[derive(Debug, Default, Deserialize)]
struct SimpleSpecParams {
    source: Option<String>,
    target: Option<String>,
}

/// One flattened schema triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SimpleSpecRow {
    pub source_type: String,
    pub target_type: String,
    pub edge_type: String,
}

/// Flatten the nested schema map into triples
#[must_use]
pub fn flatten_schema(schema: &Schema) -> Vec<SimpleSpecRow> {
    let mut rows = Vec::new();
    for (source_type, targets) in schema {
        for (target_type, predicates) in targets {
            for edge_type in predicates {
                rows.push(SimpleSpecRow {
                    source_type: source_type.clone(),
                    target_type: target_type.clone(),
                    edge_type: edge_type.clone(),
                });
            }
        }
    }
    rows
}

#[instrument(skip(state), fields(endpoint = EndpointKind::Simple.as_str()))]
async fn simple_spec_handler(
    State(state): State<AppState>,
    Query(params): Query<SimpleSpecParams>,
) -> Result<Json<Vec<SimpleSpecRow>>> {
    let triples = simple_spec(&state, params).await?;
    info!(rows = triples.len(), "simple spec assembled");
    Ok(Json(triples))
}

async fn simple_spec(state: &AppState, params: SimpleSpecParams) -> Result<Vec<SimpleSpecRow>> {
    if params.source.is_none() && params.target.is_none() {
        let schema = state.graph.get_schema().await?;
        return Ok(flatten_schema(schema));
    }

    let rows = state
        .graph
        .get_mini_schema(params.source.as_deref(), params.target.as_deref())
        .await?;
    let mut triples = Vec::new();
    let mut seen = HashSet::new();
    for row in rows {
        let source_labels = state.bl.most_specific_concepts(&row.source_label).await;
        let target_labels = state.bl.most_specific_concepts(&row.target_label).await;
        for source_type in &source_labels {
            for target_type in &target_labels {
                let triple = SimpleSpecRow {
                    source_type: source_type.clone(),
                    target_type: target_type.clone(),
                    edge_type: row.predicate.clone(),
                };
                if seen.insert(triple.clone()) {
                    triples.push(triple);
                }
            }
        }
    }
    Ok(triples)
}

#[instrument(skip(state), fields(endpoint = EndpointKind::ReasonerApi.as_str()))]
async fn reasoner_templates_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReasonerRequest>>> {
    Ok(Json(state.graph.get_schema().await.map(one_hop_templates)?))
}

async fn reasoner_query_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ReasonerResponse>> {
    run_question(state, body, EndpointKind::ReasonerApi).await
}

async fn query_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ReasonerResponse>> {
    run_question(state, body, EndpointKind::Query).await
}

#[instrument(skip(state, body, kind), fields(endpoint = kind.as_str()))]
async fn run_question(
    state: AppState,
    body: Bytes,
    kind: EndpointKind,
) -> Result<Json<ReasonerResponse>> {
    let request: ReasonerRequest = serde_json::from_slice(&body)
        .map_err(|e| PlaterError::BadRequest(format!("could not parse request: {e}")))?;
    let question = Question::new(request.query_graph)?;
    let started = Instant::now();
    let response = question.answer(&state.graph, true).await.map_err(|e| {
        error!("question failed: {e}");
        e
    })?;
    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        answers = response.results.len(),
        "question answered"
    );
    Ok(Json(response))
}

#[instrument(skip(state, body), fields(endpoint = EndpointKind::Overlay.as_str()))]
async fn overlay_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ReasonerResponse>> {
    let request: ReasonerResponse = serde_json::from_slice(&body)
        .map_err(|e| PlaterError::BadRequest(format!("could not parse request: {e}")))?;
    let started = Instant::now();
    let response = overlay_support_edges(&state.graph, request).await.map_err(|e| {
        error!("overlay failed: {e}");
        e
    })?;
    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        "overlay completed"
    );
    Ok(Json(response))
}

#[instrument(skip(state), fields(endpoint = EndpointKind::About.as_str()))]
async fn about_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(read_about(&state.config.about_file).await?))
}

async fn read_about(path: &std::path::Path) -> Result<Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PlaterError::Internal(format!("could not read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| PlaterError::Internal(format!("{} is not valid json: {e}", path.display())))
}

#[instrument(skip(state), fields(endpoint = EndpointKind::OpenApi.as_str()))]
async fn openapi_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    let started = Instant::now();
    let spec = openapi::build_spec(&state.graph, &state.build_tag).await?;
    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        "openapi document assembled"
    );
    Ok(Json(spec))
}

#[instrument(skip(state), fields(endpoint = EndpointKind::SwaggerUi.as_str()))]
async fn apidocs_handler(State(state): State<AppState>) -> Result<Html<String>> {
    apidocs::render_swagger_ui(&format!("PLATER - {}", state.build_tag), "./openapi.json")
        .map(Html)
        .map_err(|e| PlaterError::Internal(format!("could not render api docs: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .entry("chemical_substance".to_string())
            .or_default()
            .insert("gene".to_string(), vec!["directly_interacts_with".to_string()]);
        schema
            .entry("gene".to_string())
            .or_default()
            .insert("chemical_substance".to_string(), vec!["is_affected_by".to_string()]);
        schema
    }

    #[test]
    fn test_schema_routes_cover_nodes_and_pairs() {
        let (node_types, pairs) = schema_routes(&demo_schema());
        assert_eq!(node_types, vec!["chemical_substance", "gene"]);
        assert_eq!(
            pairs,
            vec![
                ("chemical_substance".to_string(), "gene".to_string()),
                ("gene".to_string(), "chemical_substance".to_string()),
            ]
        );
    }

    #[test]
    fn test_schema_routes_deduplicate_node_types() {
        let mut schema = demo_schema();
        schema
            .entry("gene".to_string())
            .or_default()
            .insert("gene".to_string(), vec!["similar_to".to_string()]);
        let (node_types, _) = schema_routes(&schema);
        assert_eq!(
            node_types.iter().filter(|t| t.as_str() == "gene").count(),
            1
        );
    }

    #[test]
    fn test_flatten_schema_yields_one_row_per_triple() {
        let rows = flatten_schema(&demo_schema());
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&SimpleSpecRow {
            source_type: "chemical_substance".to_string(),
            target_type: "gene".to_string(),
            edge_type: "directly_interacts_with".to_string(),
        }));
    }

    #[test]
    fn test_endpoint_kind_names_are_distinct() {
        let kinds = [
            EndpointKind::Hop,
            EndpointKind::Node,
            EndpointKind::Cypher,
            EndpointKind::OpenApi,
            EndpointKind::Schema,
            EndpointKind::SwaggerUi,
            EndpointKind::ReasonerApi,
            EndpointKind::Simple,
            EndpointKind::Summary,
            EndpointKind::Overlay,
            EndpointKind::About,
            EndpointKind::Predicates,
            EndpointKind::Query,
        ];
        let names: HashSet<&str> = kinds.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), kinds.len());
    }
}
