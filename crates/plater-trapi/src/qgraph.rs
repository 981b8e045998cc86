//! Query graphs, answers and knowledge graphs
//!
//! The request/response documents of the structured query endpoint:
//! `{query_graph, knowledge_graph, results}`. Validation is a pure
//! data-structure check performed before any side effect; it reports the
//! first failing invariant.

use crate::error::{Result, TrapiError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// A curie constraint: a single identifier or a list of alternatives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Curie {
    /// One identifier
    One(String),
    /// Any of several identifiers
    Many(Vec<String>),
}

impl Curie {
    /// The constraint as a slice of identifiers
    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            Curie::One(value) => std::slice::from_ref(value),
            Curie::Many(values) => values,
        }
    }
}

/// A node of the query graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QNode {
    /// Variable name, unique within the query graph
    pub id: String,
    /// Node label to match
    #[serde(rename = "type")]
    pub node_type: String,
    /// Optional identifier constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curie: Option<Curie>,
}

/// An edge of the query graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QEdge {
    /// Variable name, unique within the query graph
    pub id: String,
    /// `id` of the source node
    pub source_id: String,
    /// `id` of the target node
    pub target_id: String,
    /// Optional predicate constraint
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
}

/// A structured graph pattern: nodes plus the edges connecting them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryGraph {
    pub nodes: Vec<QNode>,
    pub edges: Vec<QEdge>,
}

impl QueryGraph {
    /// Check the structural invariants, reporting the first violation.
    ///
    /// Every node and edge needs a unique non-empty `id`, every node a
    /// `type`, and every edge endpoint must name a node of this graph.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(TrapiError::InvalidQuery(
                "query graph has no nodes".to_string(),
            ));
        }
        let mut ids: HashSet<&str> = HashSet::new();
        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(TrapiError::InvalidQuery(
                    "query graph node is missing an `id`".to_string(),
                ));
            }
            if node.node_type.is_empty() {
                return Err(TrapiError::InvalidQuery(format!(
                    "query graph node `{}` is missing a `type`",
                    node.id
                )));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(TrapiError::InvalidQuery(format!(
                    "duplicate id `{}` in query graph",
                    node.id
                )));
            }
        }
        let node_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &self.edges {
            if edge.id.is_empty() {
                return Err(TrapiError::InvalidQuery(
                    "query graph edge is missing an `id`".to_string(),
                ));
            }
            if !ids.insert(edge.id.as_str()) {
                return Err(TrapiError::InvalidQuery(format!(
                    "duplicate id `{}` in query graph",
                    edge.id
                )));
            }
            for endpoint in [&edge.source_id, &edge.target_id] {
                if !node_ids.contains(endpoint.as_str()) {
                    return Err(TrapiError::InvalidQuery(format!(
                        "some edge mentions don't have matching nodes: edge `{}` references `{endpoint}`",
                        edge.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The body of a structured query request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerRequest {
    pub query_graph: QueryGraph,
}

/// One binding of a query-graph variable to a knowledge-graph identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub qg_id: String,
    pub kg_id: String,
}

/// One answer: node and edge bindings for every query-graph variable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub node_bindings: Vec<Binding>,
    pub edge_bindings: Vec<Binding>,
}

/// The sub-graph the answers are drawn from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<serde_json::Map<String, Value>>,
    pub edges: Vec<serde_json::Map<String, Value>>,
}

/// The full response document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerResponse {
    pub query_graph: QueryGraph,
    pub knowledge_graph: KnowledgeGraph,
    pub results: Vec<Answer>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, node_type: &str) -> QNode {
        QNode {
            id: id.to_string(),
            node_type: node_type.to_string(),
            curie: None,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> QEdge {
        QEdge {
            id: id.to_string(),
            source_id: source.to_string(),
            target_id: target.to_string(),
            edge_type: None,
        }
    }

    #[test]
    fn test_valid_one_hop_graph() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "chemical_substance"), node("n2", "gene")],
            edges: vec![edge("e0", "n1", "n2")],
        };
        graph.validate().expect("graph should be valid");
    }

    #[test]
    fn test_orphan_node_is_valid() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "gene")],
            edges: vec![],
        };
        graph.validate().expect("orphan node is allowed");
    }

    #[test]
    fn test_empty_graph_is_rejected() {
        let graph = QueryGraph::default();
        let error = graph.validate().unwrap_err();
        assert!(error.to_string().contains("no nodes"));
    }

    #[test]
    fn test_edge_with_unknown_endpoint_is_rejected() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "gene")],
            edges: vec![edge("e0", "n1", "nX")],
        };
        let error = graph.validate().unwrap_err();
        assert!(error
            .to_string()
            .contains("edge mentions don't have matching nodes"));
        assert!(error.to_string().contains("nX"));
    }

    #[test]
    fn test_missing_node_type_is_rejected() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "")],
            edges: vec![],
        };
        let error = graph.validate().unwrap_err();
        assert!(error.to_string().contains("missing a `type`"));
    }

    #[test]
    fn test_duplicate_node_id_is_rejected() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "gene"), node("n1", "disease")],
            edges: vec![],
        };
        let error = graph.validate().unwrap_err();
        assert!(error.to_string().contains("duplicate id `n1`"));
    }

    #[test]
    fn test_edge_id_colliding_with_node_id_is_rejected() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "gene"), node("n2", "disease")],
            edges: vec![edge("n1", "n1", "n2")],
        };
        let error = graph.validate().unwrap_err();
        assert!(error.to_string().contains("duplicate id"));
    }

    #[test]
    fn test_curie_accepts_string_or_list() {
        let single: QNode = serde_json::from_value(json!({
            "id": "n1", "type": "gene", "curie": "NCBIGene:1"
        }))
        .expect("single curie parses");
        assert_eq!(single.curie, Some(Curie::One("NCBIGene:1".to_string())));

        let many: QNode = serde_json::from_value(json!({
            "id": "n1", "type": "gene", "curie": ["NCBIGene:1", "NCBIGene:2"]
        }))
        .expect("curie list parses");
        assert_eq!(many.curie.map(|c| c.values().len()), Some(2));
    }

    #[test]
    fn test_query_graph_roundtrip_keeps_type_key() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "gene")],
            edges: vec![QEdge {
                id: "e0".to_string(),
                source_id: "n1".to_string(),
                target_id: "n1".to_string(),
                edge_type: Some("similar_to".to_string()),
            }],
        };
        let value = serde_json::to_value(&graph).expect("graph serializes");
        assert_eq!(value["nodes"][0]["type"], "gene");
        assert_eq!(value["edges"][0]["type"], "similar_to");
        let back: QueryGraph = serde_json::from_value(value).expect("graph parses");
        assert_eq!(back, graph);
    }

    #[test]
    fn test_extra_request_fields_are_ignored() {
        let request: ReasonerRequest = serde_json::from_value(json!({
            "query_graph": {"nodes": [{"id": "n1", "type": "gene"}], "edges": []},
            "max_results": 50
        }))
        .expect("extra fields are tolerated");
        assert_eq!(request.query_graph.nodes.len(), 1);
    }
}
