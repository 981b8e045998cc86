//! Support-edge overlay
//!
//! Enriches an already-formed answer document with every edge that
//! connects any pair of bound nodes, fetched in one batched set-cover
//! call. New bindings get synthesized `qg_id`s `s_0, s_1, ...` per answer;
//! knowledge-graph edges are only ever added once.

use crate::error::{Result, TrapiError};
use crate::qgraph::{Binding, ReasonerResponse};
use crate::question::collect_binding_ids;
use plater_graph::{CoverEdge, GraphInterface};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Overlay support edges onto an answer document.
///
/// Refuses with [`TrapiError::OverlayUnsupported`] when the database lacks
/// the set-cover procedure.
pub async fn overlay_support_edges(
    graph: &GraphInterface,
    response: ReasonerResponse,
) -> Result<ReasonerResponse> {
    if !graph.supports_apoc().await? {
        return Err(TrapiError::OverlayUnsupported);
    }
    let (node_ids, _) = collect_binding_ids(&response.results);
    let cover = graph.run_apoc_cover(&node_ids).await?;
    info!(nodes = node_ids.len(), cover_edges = cover.len(), "overlay cover fetched");
    Ok(apply_cover(response, cover))
}

/// Attach cover edges to each answer and to the knowledge graph.
///
/// Pure so the enrichment is testable without a database: partition the
/// cover by `(source_id, target_id)`, then for every ordered pair of each
/// answer's bound nodes attach the connecting edges as new edge bindings.
#[must_use]
pub fn apply_cover(mut response: ReasonerResponse, cover: Vec<CoverEdge>) -> ReasonerResponse {
    let mut by_pair: HashMap<(String, String), Vec<serde_json::Map<String, Value>>> =
        HashMap::new();
    for cover_edge in cover {
        let mut edge = cover_edge.edge;
        edge.insert(
            "source_id".to_string(),
            Value::String(cover_edge.source_id.clone()),
        );
        edge.insert(
            "target_id".to_string(),
            Value::String(cover_edge.target_id.clone()),
        );
        by_pair
            .entry((cover_edge.source_id, cover_edge.target_id))
            .or_default()
            .push(edge);
    }

    let mut known_edges: HashSet<String> = response
        .knowledge_graph
        .edges
        .iter()
        .filter_map(|edge| edge.get("id").and_then(Value::as_str).map(str::to_string))
        .collect();

    for answer in &mut response.results {
        let mut answer_node_ids: Vec<String> = Vec::new();
        {
            let mut seen = HashSet::new();
            for binding in &answer.node_bindings {
                if seen.insert(binding.kg_id.as_str()) {
                    answer_node_ids.push(binding.kg_id.clone());
                }
            }
        }

        let mut suffix = 0;
        let mut new_bindings = Vec::new();
        for source in &answer_node_ids {
            for target in &answer_node_ids {
                if source == target {
                    continue;
                }
                let Some(edges) = by_pair.get(&(source.clone(), target.clone())) else {
                    continue;
                };
                for edge in edges {
                    let kg_id = edge
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    new_bindings.push(Binding {
                        qg_id: format!("s_{suffix}"),
                        kg_id: kg_id.clone(),
                    });
                    suffix += 1;
                    if known_edges.insert(kg_id) {
                        response.knowledge_graph.edges.push(edge.clone());
                    }
                }
            }
        }
        answer.edge_bindings.extend(new_bindings);
    }
    response
}
