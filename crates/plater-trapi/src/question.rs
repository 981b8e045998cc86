//! Question execution: compile, run, bind, yank
//!
//! A [`Question`] wraps a validated query graph. Answering it compiles the
//! graph to cypher, executes it, reassembles the rows into query-graph
//! bindings plus a knowledge sub-graph, and (by default) yanks the full
//! node and edge property maps back by identifier.

use crate::cypher;
use crate::error::Result;
use crate::qgraph::{Answer, Binding, KnowledgeGraph, QueryGraph, ReasonerRequest, ReasonerResponse};
use crate::qgraph::{QEdge, QNode};
use plater_graph::cypher::string_literal;
use plater_graph::driver::Record;
use plater_graph::{GraphInterface, Schema};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info};

/// Identifier batch size for the fulltext edge fetch
pub(crate) const EDGE_CHUNK_SIZE: usize = 1024;

/// A validated structured query, ready to compile and execute
#[derive(Debug, Clone)]
pub struct Question {
    query_graph: QueryGraph,
}

impl Question {
    /// Validate a query graph and wrap it. Fails with `InvalidQuery` before
    /// anything touches the database.
    pub fn new(query_graph: QueryGraph) -> Result<Self> {
        query_graph.validate()?;
        Ok(Self { query_graph })
    }

    /// The wrapped query graph
    #[must_use]
    pub fn query_graph(&self) -> &QueryGraph {
        &self.query_graph
    }

    /// Compile the query graph into one cypher statement
    #[must_use]
    pub fn compile_cypher(&self) -> String {
        cypher::compile(&self.query_graph)
    }

    /// Execute the question and assemble the response document.
    ///
    /// With `yank` on (the default for the HTTP surface), the knowledge
    /// graph is rebuilt from full property maps fetched by identifier;
    /// otherwise it carries whatever the answer rows returned.
    pub async fn answer(&self, graph: &GraphInterface, yank: bool) -> Result<ReasonerResponse> {
        let statement = self.compile_cypher();
        debug!(cypher = %statement, "compiled question");
        let started = Instant::now();
        let records = graph.run_cypher(&statement).await?.records();
        info!(
            rows = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "question executed"
        );

        let (results, knowledge_graph) = self.assemble(&records);
        let knowledge_graph = if yank {
            self.yank(graph, &results).await?
        } else {
            knowledge_graph
        };
        Ok(ReasonerResponse {
            query_graph: self.query_graph.clone(),
            knowledge_graph,
            results,
        })
    }

    /// Turn answer rows into bindings and a deduplicated knowledge graph,
    /// preserving the database's row order.
    pub(crate) fn assemble(&self, records: &[Record]) -> (Vec<Answer>, KnowledgeGraph) {
        let mut results = Vec::new();
        let mut knowledge_graph = KnowledgeGraph::default();
        let mut seen_nodes: HashSet<String> = HashSet::new();
        let mut seen_edges: HashSet<String> = HashSet::new();

        for record in records {
            let mut answer = Answer::default();

            for node in &self.query_graph.nodes {
                let Some(props) = record.get(&node.id).and_then(Value::as_object) else {
                    continue;
                };
                let Some(kg_id) = props.get("id").and_then(Value::as_str) else {
                    continue;
                };
                answer.node_bindings.push(Binding {
                    qg_id: node.id.clone(),
                    kg_id: kg_id.to_string(),
                });
                if seen_nodes.insert(kg_id.to_string()) {
                    let mut full = props.clone();
                    if let Some(labels) = record.get(&format!("type_{}", node.id)) {
                        full.insert("type".to_string(), labels.clone());
                    }
                    knowledge_graph.nodes.push(full);
                }
            }

            for edge in &self.query_graph.edges {
                let Some(props) = record.get(&edge.id).and_then(Value::as_object) else {
                    continue;
                };
                let Some(kg_id) = props.get("id").and_then(Value::as_str) else {
                    continue;
                };
                answer.edge_bindings.push(Binding {
                    qg_id: edge.id.clone(),
                    kg_id: kg_id.to_string(),
                });
                if seen_edges.insert(kg_id.to_string()) {
                    let mut full = props.clone();
                    if let Some(predicate) = record.get(&format!("type_{}", edge.id)) {
                        full.insert("type".to_string(), predicate.clone());
                    }
                    // the row's internal endpoint references are replaced by
                    // the resolved node identifiers from the same row
                    for (key, endpoint) in
                        [("source_id", &edge.source_id), ("target_id", &edge.target_id)]
                    {
                        if let Some(id) = record
                            .get(endpoint)
                            .and_then(Value::as_object)
                            .and_then(|node| node.get("id"))
                        {
                            full.insert(key.to_string(), id.clone());
                        }
                    }
                    knowledge_graph.edges.push(full);
                }
            }

            results.push(answer);
        }
        (results, knowledge_graph)
    }

    /// Re-fetch full property maps for every bound identifier.
    async fn yank(&self, graph: &GraphInterface, results: &[Answer]) -> Result<KnowledgeGraph> {
        let (node_ids, edge_ids) = collect_binding_ids(results);
        let nodes = fetch_node_properties(graph, &node_ids).await?;
        let edges = fetch_edge_properties(graph, &edge_ids).await?;
        Ok(KnowledgeGraph { nodes, edges })
    }
}

/// Deduplicated node and edge identifiers across all bindings, in
/// first-seen order.
pub(crate) fn collect_binding_ids(results: &[Answer]) -> (Vec<String>, Vec<String>) {
    let mut node_ids = Vec::new();
    let mut edge_ids = Vec::new();
    let mut seen_nodes: HashSet<&str> = HashSet::new();
    let mut seen_edges: HashSet<&str> = HashSet::new();
    for answer in results {
        for binding in &answer.node_bindings {
            if seen_nodes.insert(binding.kg_id.as_str()) {
                node_ids.push(binding.kg_id.clone());
            }
        }
        for binding in &answer.edge_bindings {
            if seen_edges.insert(binding.kg_id.as_str()) {
                edge_ids.push(binding.kg_id.clone());
            }
        }
    }
    (node_ids, edge_ids)
}

async fn fetch_node_properties(
    graph: &GraphInterface,
    node_ids: &[String],
) -> Result<Vec<serde_json::Map<String, Value>>> {
    if node_ids.is_empty() {
        return Ok(Vec::new());
    }
    let id_list = node_ids
        .iter()
        .map(|id| string_literal(id))
        .collect::<Vec<_>>()
        .join(", ");
    let statement = format!(
        "MATCH (node) WHERE node.id IN [{id_list}] \
         RETURN collect({{node: node, type: labels(node)}}) AS nodes"
    );
    let records = graph.run_cypher(&statement).await?.records();

    let mut nodes = Vec::new();
    if let Some(Value::Array(collected)) = records.first().and_then(|record| record.get("nodes")) {
        for entry in collected {
            let Some(entry) = entry.as_object() else { continue };
            let mut props = entry
                .get("node")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            if let Some(labels) = entry.get("type") {
                props.insert("type".to_string(), labels.clone());
            }
            nodes.push(props);
        }
    }
    Ok(nodes)
}

/// Fetch edge property maps through the fulltext index, 1024 identifiers
/// per statement, all chunks in flight concurrently. Any failing chunk
/// fails the whole fetch.
async fn fetch_edge_properties(
    graph: &GraphInterface,
    edge_ids: &[String],
) -> Result<Vec<serde_json::Map<String, Value>>> {
    if edge_ids.is_empty() {
        return Ok(Vec::new());
    }
    let index = string_literal(graph.edge_index_name());
    let fetches = edge_ids.chunks(EDGE_CHUNK_SIZE).map(|chunk| {
        let batch = string_literal(&chunk.join(" "));
        let statement = format!(
            "CALL db.index.fulltext.queryRelationships({index}, {batch}) YIELD relationship \
             WITH relationship AS e \
             RETURN collect(e{{.*, type: type(e), source_id: startNode(e).id, \
             target_id: endNode(e).id}}) AS edges"
        );
        async move { graph.run_cypher(&statement).await }
    });
    let responses = futures::future::try_join_all(fetches).await?;

    let mut edges = Vec::new();
    for response in responses {
        let records = response.records();
        if let Some(Value::Array(collected)) = records.first().and_then(|record| record.get("edges"))
        {
            for entry in collected {
                if let Some(edge) = entry.as_object() {
                    edges.push(edge.clone());
                }
            }
        }
    }
    Ok(edges)
}

/// Enumerate one-hop question templates from the schema, one per connected
/// `(source, target)` pair with an edge per recorded predicate.
#[must_use]
pub fn one_hop_templates(schema: &Schema) -> Vec<ReasonerRequest> {
    let mut templates = Vec::new();
    for (source_type, targets) in schema {
        for (target_type, predicates) in targets {
            let edges = predicates
                .iter()
                .enumerate()
                .map(|(index, predicate)| QEdge {
                    id: format!("e{index}"),
                    source_id: "n1".to_string(),
                    target_id: "n2".to_string(),
                    edge_type: Some(predicate.clone()),
                })
                .collect();
            templates.push(ReasonerRequest {
                query_graph: QueryGraph {
                    nodes: vec![
                        QNode {
                            id: "n1".to_string(),
                            node_type: source_type.clone(),
                            curie: None,
                        },
                        QNode {
                            id: "n2".to_string(),
                            node_type: target_type.clone(),
                            curie: None,
                        },
                    ],
                    edges,
                },
            });
        }
    }
    templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qgraph::Curie;
    use serde_json::json;

    fn one_hop_question() -> Question {
        Question::new(QueryGraph {
            nodes: vec![
                QNode {
                    id: "n1".to_string(),
                    node_type: "T1".to_string(),
                    curie: Some(Curie::One("C:1".to_string())),
                },
                QNode {
                    id: "n2".to_string(),
                    node_type: "T2".to_string(),
                    curie: None,
                },
            ],
            edges: vec![QEdge {
                id: "e0".to_string(),
                source_id: "n1".to_string(),
                target_id: "n2".to_string(),
                edge_type: Some("P".to_string()),
            }],
        })
        .expect("valid graph")
    }

    fn record_from(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn test_invalid_graph_is_rejected_at_construction() {
        let graph = QueryGraph {
            nodes: vec![],
            edges: vec![],
        };
        assert!(Question::new(graph).is_err());
    }

    #[test]
    fn test_assemble_binds_nodes_and_edges() {
        let question = one_hop_question();
        let record = record_from(json!({
            "n1": {"id": "A"},
            "n2": {"id": "B"},
            "e0": {"id": "E"},
            "type_n1": ["T1"],
            "type_n2": ["T2"],
            "type_e0": "P"
        }));
        let (results, knowledge_graph) = question.assemble(&[record]);

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].node_bindings,
            vec![
                Binding { qg_id: "n1".to_string(), kg_id: "A".to_string() },
                Binding { qg_id: "n2".to_string(), kg_id: "B".to_string() },
            ]
        );
        assert_eq!(
            results[0].edge_bindings,
            vec![Binding { qg_id: "e0".to_string(), kg_id: "E".to_string() }]
        );

        let edge = &knowledge_graph.edges[0];
        assert_eq!(edge["source_id"], "A");
        assert_eq!(edge["target_id"], "B");
        assert_eq!(edge["type"], "P");
        assert_eq!(knowledge_graph.nodes[0]["type"], json!(["T1"]));
    }

    #[test]
    fn test_assemble_preserves_row_order_and_dedups_kg() {
        let question = one_hop_question();
        let row = |n2: &str, e: &str| {
            record_from(json!({
                "n1": {"id": "A"},
                "n2": {"id": n2},
                "e0": {"id": e},
                "type_n1": ["T1"],
                "type_n2": ["T2"],
                "type_e0": "P"
            }))
        };
        let (results, knowledge_graph) =
            question.assemble(&[row("B", "E1"), row("C", "E2"), row("B", "E1")]);

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].node_bindings[1].kg_id, "C");
        // node A appears once, B once, C once
        let node_ids: Vec<&str> = knowledge_graph
            .nodes
            .iter()
            .filter_map(|n| n.get("id").and_then(Value::as_str))
            .collect();
        assert_eq!(node_ids, vec!["A", "B", "C"]);
        let edge_ids: Vec<&str> = knowledge_graph
            .edges
            .iter()
            .filter_map(|e| e.get("id").and_then(Value::as_str))
            .collect();
        assert_eq!(edge_ids, vec!["E1", "E2"]);
    }

    #[test]
    fn test_assemble_skips_unbound_columns() {
        let question = one_hop_question();
        let record = record_from(json!({
            "n1": {"id": "A"},
            "n2": null,
            "e0": null
        }));
        let (results, knowledge_graph) = question.assemble(&[record]);
        assert_eq!(results[0].node_bindings.len(), 1);
        assert!(results[0].edge_bindings.is_empty());
        assert_eq!(knowledge_graph.edges.len(), 0);
    }

    #[test]
    fn test_collect_binding_ids_dedups_in_first_seen_order() {
        let answers = vec![
            Answer {
                node_bindings: vec![
                    Binding { qg_id: "n1".to_string(), kg_id: "A".to_string() },
                    Binding { qg_id: "n2".to_string(), kg_id: "B".to_string() },
                ],
                edge_bindings: vec![Binding { qg_id: "e0".to_string(), kg_id: "E1".to_string() }],
            },
            Answer {
                node_bindings: vec![
                    Binding { qg_id: "n1".to_string(), kg_id: "A".to_string() },
                    Binding { qg_id: "n2".to_string(), kg_id: "C".to_string() },
                ],
                edge_bindings: vec![Binding { qg_id: "e0".to_string(), kg_id: "E2".to_string() }],
            },
        ];
        let (node_ids, edge_ids) = collect_binding_ids(&answers);
        assert_eq!(node_ids, vec!["A", "B", "C"]);
        assert_eq!(edge_ids, vec!["E1", "E2"]);
    }

    #[test]
    fn test_one_hop_templates_cover_every_pair() {
        let mut schema = Schema::new();
        schema
            .entry("chemical_substance".to_string())
            .or_default()
            .insert("gene".to_string(), vec!["directly_interacts_with".to_string()]);
        schema
            .entry("gene".to_string())
            .or_default()
            .insert("chemical_substance".to_string(), vec!["is_affected_by".to_string()]);

        let templates = one_hop_templates(&schema);
        assert_eq!(templates.len(), 2);
        for template in &templates {
            template.query_graph.validate().expect("template is valid");
            assert_eq!(template.query_graph.nodes.len(), 2);
            assert_eq!(template.query_graph.edges.len(), 1);
        }
        assert_eq!(templates[0].query_graph.nodes[0].node_type, "chemical_substance");
        assert_eq!(
            templates[0].query_graph.edges[0].edge_type.as_deref(),
            Some("directly_interacts_with")
        );
    }

    #[test]
    fn test_one_hop_templates_one_edge_per_predicate() {
        let mut schema = Schema::new();
        schema.entry("gene".to_string()).or_default().insert(
            "disease".to_string(),
            vec!["has_basis_in".to_string(), "related_to".to_string()],
        );
        let templates = one_hop_templates(&schema);
        assert_eq!(templates.len(), 1);
        let edges = &templates[0].query_graph.edges;
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].id, "e0");
        assert_eq!(edges[1].id, "e1");
    }

    #[test]
    fn test_edge_chunk_size() {
        assert_eq!(EDGE_CHUNK_SIZE, 1024);
    }
}
