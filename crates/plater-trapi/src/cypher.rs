//! Query-graph to cypher compilation
//!
//! The query graph is lowered through a small IR instead of ad-hoc string
//! concatenation: node and edge references render themselves, curie values
//! go through [`string_literal`] so free-form identifiers cannot escape
//! their quotes, and the final statement is assembled at the end.
//!
//! Shape of the output:
//! - one `MATCH` path fragment per edge, plus one `MATCH` per orphan node;
//! - a node's label is rendered at its first occurrence only;
//! - curie constraints form a single `WHERE` conjunction (lists become a
//!   parenthesized `OR` chain);
//! - a `USING INDEX` hint is emitted for every curie-bearing node;
//! - `RETURN` lists every variable plus `labels(n) AS type_n` /
//!   `type(e) AS type_e`.

use crate::qgraph::{QNode, QueryGraph};
use plater_graph::cypher::string_literal;
use std::collections::{HashMap, HashSet};

/// Compile a validated query graph into one cypher statement.
#[must_use]
pub fn compile(qgraph: &QueryGraph) -> String {
    let nodes_by_id: HashMap<&str, &QNode> =
        qgraph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let referenced: HashSet<&str> = qgraph
        .edges
        .iter()
        .flat_map(|e| [e.source_id.as_str(), e.target_id.as_str()])
        .collect();

    let mut rendered: HashSet<String> = HashSet::new();
    let mut clauses: Vec<String> = Vec::new();
    let mut conditions: Vec<String> = Vec::new();

    // orphan nodes keep their own MATCH clause
    for node in &qgraph.nodes {
        if referenced.contains(node.id.as_str()) {
            continue;
        }
        let mut hint = String::new();
        let pattern = node_pattern(node, &mut rendered, &mut hint, &mut conditions);
        clauses.push(format!("MATCH {pattern}{hint}"));
    }

    for edge in &qgraph.edges {
        let (Some(source), Some(target)) = (
            nodes_by_id.get(edge.source_id.as_str()),
            nodes_by_id.get(edge.target_id.as_str()),
        ) else {
            continue;
        };
        let mut hint = String::new();
        let source_pattern = node_pattern(source, &mut rendered, &mut hint, &mut conditions);
        let edge_fragment = match &edge.edge_type {
            Some(predicate) => format!("-[{}:{predicate}]->", edge.id),
            None => format!("-[{}]->", edge.id),
        };
        let target_pattern = node_pattern(target, &mut rendered, &mut hint, &mut conditions);
        clauses.push(format!(
            "MATCH {source_pattern}{edge_fragment}{target_pattern}{hint}"
        ));
    }

    if !conditions.is_empty() {
        clauses.push(format!("WHERE {}", conditions.join(" AND ")));
    }
    clauses.push(return_clause(qgraph));
    clauses.join(" ")
}

/// Render a node reference. The first occurrence carries the label and
/// contributes its curie condition and index hint; later occurrences are
/// bare variable references.
fn node_pattern(
    node: &QNode,
    rendered: &mut HashSet<String>,
    hint: &mut String,
    conditions: &mut Vec<String>,
) -> String {
    if !rendered.insert(node.id.clone()) {
        return format!("({})", node.id);
    }
    if let Some(condition) = curie_condition(node) {
        conditions.push(condition);
        hint.push_str(&format!(" USING INDEX {}:{}(id)", node.id, node.node_type));
    }
    format!("({}:{})", node.id, node.node_type)
}

fn curie_condition(node: &QNode) -> Option<String> {
    let values = node.curie.as_ref()?.values();
    match values {
        [] => None,
        [single] => Some(format!("{}.id = {}", node.id, string_literal(single))),
        _ => {
            let alternatives = values
                .iter()
                .map(|value| format!("{}.id = {}", node.id, string_literal(value)))
                .collect::<Vec<_>>()
                .join(" OR ");
            Some(format!("({alternatives})"))
        }
    }
}

fn return_clause(qgraph: &QueryGraph) -> String {
    let mut items = Vec::new();
    for node in &qgraph.nodes {
        items.push(node.id.clone());
        items.push(format!("labels({id}) AS type_{id}", id = node.id));
    }
    for edge in &qgraph.edges {
        items.push(edge.id.clone());
        items.push(format!("type({id}) AS type_{id}", id = edge.id));
    }
    format!("RETURN {}", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qgraph::{Curie, QEdge};

    fn node(id: &str, node_type: &str, curie: Option<Curie>) -> QNode {
        QNode {
            id: id.to_string(),
            node_type: node_type.to_string(),
            curie,
        }
    }

    fn edge(id: &str, source: &str, target: &str, edge_type: Option<&str>) -> QEdge {
        QEdge {
            id: id.to_string(),
            source_id: source.to_string(),
            target_id: target.to_string(),
            edge_type: edge_type.map(String::from),
        }
    }

    fn one_hop() -> QueryGraph {
        QueryGraph {
            nodes: vec![
                node("n1", "T1", Some(Curie::One("C:1".to_string()))),
                node("n2", "T2", None),
            ],
            edges: vec![edge("e0", "n1", "n2", Some("P"))],
        }
    }

    #[test]
    fn test_one_hop_path_fragment() {
        let cypher = compile(&one_hop());
        assert!(cypher.contains("(n1:T1)-[e0:P]->(n2:T2)"), "got: {cypher}");
    }

    #[test]
    fn test_curie_appears_literally_in_where() {
        let cypher = compile(&one_hop());
        assert!(cypher.contains("WHERE n1.id = \"C:1\""), "got: {cypher}");
    }

    #[test]
    fn test_index_hint_for_curie_node() {
        let cypher = compile(&one_hop());
        assert!(cypher.contains("USING INDEX n1:T1(id)"), "got: {cypher}");
    }

    #[test]
    fn test_untyped_edge_has_no_predicate() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "T1", None), node("n2", "T2", None)],
            edges: vec![edge("e0", "n1", "n2", None)],
        };
        let cypher = compile(&graph);
        assert!(cypher.contains("-[e0]->"), "got: {cypher}");
        assert!(!cypher.contains("WHERE"), "got: {cypher}");
    }

    #[test]
    fn test_one_match_per_edge_and_one_label_per_node() {
        let graph = QueryGraph {
            nodes: vec![
                node("n1", "T1", None),
                node("n2", "T2", None),
                node("n3", "T3", None),
            ],
            edges: vec![
                edge("e0", "n1", "n2", None),
                edge("e1", "n2", "n3", None),
            ],
        };
        let cypher = compile(&graph);
        assert_eq!(cypher.matches("MATCH ").count(), 2, "got: {cypher}");
        // the shared node is labeled at first occurrence only
        assert_eq!(cypher.matches("(n2:T2)").count(), 1, "got: {cypher}");
        assert!(cypher.contains("-[e1]->(n3:T3)"), "got: {cypher}");
        assert!(cypher.contains("MATCH (n2)") || cypher.contains("(n2)-"), "got: {cypher}");
    }

    #[test]
    fn test_orphan_node_gets_its_own_match() {
        let graph = QueryGraph {
            nodes: vec![
                node("n0", "T0", Some(Curie::One("X:9".to_string()))),
                node("n1", "T1", None),
                node("n2", "T2", None),
            ],
            edges: vec![edge("e0", "n1", "n2", None)],
        };
        let cypher = compile(&graph);
        assert!(cypher.contains("MATCH (n0:T0) USING INDEX n0:T0(id)"), "got: {cypher}");
        assert!(cypher.contains("WHERE n0.id = \"X:9\""), "got: {cypher}");
    }

    #[test]
    fn test_curie_list_becomes_parenthesized_disjunction() {
        let graph = QueryGraph {
            nodes: vec![node(
                "n1",
                "gene",
                Some(Curie::Many(vec![
                    "NCBIGene:1".to_string(),
                    "NCBIGene:2".to_string(),
                ])),
            )],
            edges: vec![],
        };
        let cypher = compile(&graph);
        assert!(
            cypher.contains("(n1.id = \"NCBIGene:1\" OR n1.id = \"NCBIGene:2\")"),
            "got: {cypher}"
        );
    }

    #[test]
    fn test_multiple_conditions_are_conjoined() {
        let graph = QueryGraph {
            nodes: vec![
                node("n1", "T1", Some(Curie::One("A:1".to_string()))),
                node("n2", "T2", Some(Curie::One("B:2".to_string()))),
            ],
            edges: vec![edge("e0", "n1", "n2", None)],
        };
        let cypher = compile(&graph);
        assert!(
            cypher.contains("WHERE n1.id = \"A:1\" AND n2.id = \"B:2\""),
            "got: {cypher}"
        );
    }

    #[test]
    fn test_return_lists_variables_and_types() {
        let cypher = compile(&one_hop());
        assert!(cypher.contains("RETURN n1, labels(n1) AS type_n1"), "got: {cypher}");
        assert!(cypher.contains("n2, labels(n2) AS type_n2"), "got: {cypher}");
        assert!(cypher.contains("e0, type(e0) AS type_e0"), "got: {cypher}");
    }

    #[test]
    fn test_every_curie_appears_literally() {
        let curies = ["CHEBI:15377", "MONDO:0005148", "NCBIGene:93034"];
        let graph = QueryGraph {
            nodes: vec![
                node("n1", "chemical_substance", Some(Curie::One(curies[0].to_string()))),
                node(
                    "n2",
                    "disease",
                    Some(Curie::Many(vec![curies[1].to_string(), curies[2].to_string()])),
                ),
            ],
            edges: vec![edge("e0", "n1", "n2", None)],
        };
        let cypher = compile(&graph);
        for curie in curies {
            assert!(cypher.contains(curie), "missing {curie} in: {cypher}");
        }
    }

    #[test]
    fn test_quote_in_curie_is_escaped() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "T1", Some(Curie::One("bad\"curie".to_string())))],
            edges: vec![],
        };
        let cypher = compile(&graph);
        assert!(cypher.contains("n1.id = \"bad\\\"curie\""), "got: {cypher}");
    }

    #[test]
    fn test_empty_curie_list_adds_no_condition() {
        let graph = QueryGraph {
            nodes: vec![node("n1", "T1", Some(Curie::Many(vec![])))],
            edges: vec![],
        };
        let cypher = compile(&graph);
        assert!(!cypher.contains("WHERE"), "got: {cypher}");
        assert!(!cypher.contains("USING INDEX"), "got: {cypher}");
    }
}
