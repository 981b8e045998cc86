//! Graph interface: domain operations over the driver
//!
//! One `GraphInterface` is constructed at process start and shared behind an
//! `Arc` for the lifetime of the process. The schema and summary are
//! discovered on the first `get_schema` call and memoized behind a
//! once-latch, so concurrent first callers never duplicate the work.

use crate::cypher::string_literal;
use crate::driver::{Neo4jHttpDriver, Record, TxResponse};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::OnceCell;
use tracing::info;

/// `source_label -> target_label -> predicates`, recorded symmetrically
pub type Schema = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// `source label set -> per-target per-predicate edge counts`
pub type Summary = BTreeMap<String, SummaryEntry>;

/// Summary statistics for one (colon-joined, sorted) node label set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Number of nodes carrying exactly this label set
    pub nodes_count: u64,
    /// Target label set to predicate to edge count
    #[serde(flatten)]
    pub targets: BTreeMap<String, BTreeMap<String, u64>>,
}

/// One row of the endpoint-restricted schema lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniSchemaRow {
    /// Labels of the source node
    pub source_label: Vec<String>,
    /// Predicate connecting the endpoints
    pub predicate: String,
    /// Labels of the target node
    pub target_label: Vec<String>,
}

/// One edge returned by the APOC set-cover call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverEdge {
    /// `id` of the edge's start node
    pub source_id: String,
    /// `id` of the edge's end node
    pub target_id: String,
    /// Full edge property map, including `type`
    pub edge: serde_json::Map<String, Value>,
}

const SCHEMA_QUERY: &str = "MATCH (a)-[x]->(b) \
    WITH [la IN labels(a) WHERE NOT la IN [\"Concept\"]] AS source_labels, \
    [lb IN labels(b) WHERE NOT lb IN [\"Concept\"]] AS target_labels, \
    type(x) AS predicate \
    UNWIND source_labels AS source_label UNWIND target_labels AS target_label \
    RETURN DISTINCT source_label, predicate, target_label";

const NODE_COUNT_QUERY: &str = "MATCH (c) RETURN labels(c) AS labels, count(c) AS count";

const EDGE_COUNT_QUERY: &str = "MATCH (c)-[e]->(b) \
    RETURN labels(c) AS source_labels, type(e) AS predicate, \
    labels(b) AS target_labels, count(e) AS count";

const APOC_COVER_PROBE: &str = "CALL dbms.procedures() YIELD name \
    WHERE name = \"apoc.algo.cover\" RETURN count(name) AS count";

#[derive(Debug, Clone)]
struct SchemaState {
    schema: Schema,
    summary: Summary,
}

/// Process-wide handle to the graph database
#[derive(Debug)]
pub struct GraphInterface {
    driver: Neo4jHttpDriver,
    edge_index_name: String,
    state: OnceCell<SchemaState>,
}

impl GraphInterface {
    /// Wrap a driver. `edge_index_name` names the relationship fulltext
    /// index the driver bootstrapped at startup.
    pub fn new(driver: Neo4jHttpDriver, edge_index_name: String) -> Self {
        Self {
            driver,
            edge_index_name,
            state: OnceCell::new(),
        }
    }

    /// Name of the relationship fulltext index over edge `id`s
    #[must_use]
    pub fn edge_index_name(&self) -> &str {
        &self.edge_index_name
    }

    /// Run an arbitrary cypher statement
    pub async fn run_cypher(&self, cypher: &str) -> Result<TxResponse> {
        self.driver.run(cypher).await
    }

    async fn state(&self) -> Result<&SchemaState> {
        self.state.get_or_try_init(|| self.introspect()).await
    }

    /// The symmetric schema map, discovered once and memoized
    pub async fn get_schema(&self) -> Result<&Schema> {
        Ok(&self.state().await?.schema)
    }

    /// Node-type cardinalities and per-edge-type counts, built alongside the schema
    pub async fn summary(&self) -> Result<&Summary> {
        Ok(&self.state().await?.summary)
    }

    async fn introspect(&self) -> Result<SchemaState> {
        let records = self.driver.run(SCHEMA_QUERY).await?.records();
        let triples: Vec<(String, String, String)> = records
            .iter()
            .filter_map(|record| {
                Some((
                    record.get("source_label")?.as_str()?.to_string(),
                    record.get("predicate")?.as_str()?.to_string(),
                    record.get("target_label")?.as_str()?.to_string(),
                ))
            })
            .collect();
        let schema = schema_from_triples(&triples);

        let node_counts: Vec<(Vec<String>, u64)> = self
            .driver
            .run(NODE_COUNT_QUERY)
            .await?
            .records()
            .iter()
            .filter_map(|record| {
                Some((string_vec(record.get("labels")?)?, record.get("count")?.as_u64()?))
            })
            .collect();
        let edge_counts: Vec<(Vec<String>, String, Vec<String>, u64)> = self
            .driver
            .run(EDGE_COUNT_QUERY)
            .await?
            .records()
            .iter()
            .filter_map(|record| {
                Some((
                    string_vec(record.get("source_labels")?)?,
                    record.get("predicate")?.as_str()?.to_string(),
                    string_vec(record.get("target_labels")?)?,
                    record.get("count")?.as_u64()?,
                ))
            })
            .collect();
        let summary = summary_from_counts(&node_counts, &edge_counts);

        info!(
            source_types = schema.len(),
            label_sets = summary.len(),
            "graph schema discovered"
        );
        Ok(SchemaState { schema, summary })
    }

    /// Schema rows restricted to edges whose endpoints carry the given ids
    pub async fn get_mini_schema(
        &self,
        source_id: Option<&str>,
        target_id: Option<&str>,
    ) -> Result<Vec<MiniSchemaRow>> {
        let mut conditions = Vec::new();
        if let Some(source_id) = source_id {
            conditions.push(format!("a.id = {}", string_literal(source_id)));
        }
        if let Some(target_id) = target_id {
            conditions.push(format!("b.id = {}", string_literal(target_id)));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let statement = format!(
            "MATCH (a)-[x]->(b){where_clause} RETURN DISTINCT labels(a) AS source_label, \
             type(x) AS predicate, labels(b) AS target_label"
        );
        let records = self.driver.run(&statement).await?.records();
        Ok(records
            .into_iter()
            .filter_map(|record| serde_json::from_value(Value::Object(record)).ok())
            .collect())
    }

    /// Property maps of every node of `node_type` with the given `id`
    pub async fn get_node(&self, node_type: &str, curie: &str) -> Result<Vec<Record>> {
        let statement = format!(
            "MATCH (c:{node_type} {{id: {}}}) RETURN c",
            string_literal(curie)
        );
        let records = self.driver.run(&statement).await?.records();
        Ok(records
            .into_iter()
            .filter_map(|mut record| match record.remove("c") {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            })
            .collect())
    }

    /// One-hop triples `[source, edge, target]` starting from a curie.
    ///
    /// Both directions are queried and concatenated: first
    /// `(source)-[e]->(target)`, then `(source)<-[e]-(target)`.
    pub async fn get_single_hops(
        &self,
        source_type: &str,
        target_type: &str,
        curie: &str,
    ) -> Result<Vec<Vec<Value>>> {
        let curie = string_literal(curie);
        let forward = format!(
            "MATCH (c:{source_type} {{id: {curie}}})-[e]->(b:{target_type}) RETURN DISTINCT c, e, b"
        );
        let reverse = format!(
            "MATCH (c:{source_type} {{id: {curie}}})<-[e]-(b:{target_type}) RETURN DISTINCT c, e, b"
        );
        let mut hops = Vec::new();
        for statement in [forward, reverse] {
            let response = self.driver.run(&statement).await?;
            for result in &response.results {
                for data in &result.data {
                    hops.push(data.row.clone());
                }
            }
        }
        Ok(hops)
    }

    /// A single example row for documentation purposes: one node of
    /// `source_type`, or one `[source, edge, target]` triple when
    /// `target_type` is given.
    pub async fn get_examples(
        &self,
        source_type: &str,
        target_type: Option<&str>,
    ) -> Result<Vec<Value>> {
        match target_type {
            Some(target_type) => {
                let statement = format!(
                    "MATCH (c:{source_type})-[e]->(b:{target_type}) RETURN c, e, b LIMIT 1"
                );
                let response = self.driver.run(&statement).await?;
                let mut rows = Vec::new();
                for result in &response.results {
                    for data in &result.data {
                        rows.push(Value::Array(data.row.clone()));
                    }
                }
                Ok(rows)
            }
            None => {
                let statement = format!("MATCH (c:{source_type}) RETURN c LIMIT 1");
                let records = self.driver.run(&statement).await?.records();
                Ok(records
                    .into_iter()
                    .filter_map(|mut record| record.remove("c"))
                    .collect())
            }
        }
    }

    /// Whether the database exposes the APOC set-cover procedure
    pub async fn supports_apoc(&self) -> Result<bool> {
        let records = self.driver.run(APOC_COVER_PROBE).await?.records();
        let count = records
            .first()
            .and_then(|record| record.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(count > 0)
    }

    /// Every edge whose endpoints are both in `node_ids`, in one batched call
    pub async fn run_apoc_cover(&self, node_ids: &[String]) -> Result<Vec<CoverEdge>> {
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_list = node_ids
            .iter()
            .map(|id| string_literal(id))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "MATCH (node) WHERE node.id IN [{id_list}] WITH collect(node) AS nodes \
             CALL apoc.algo.cover(nodes) YIELD rel \
             RETURN collect({{source_id: startNode(rel).id, target_id: endNode(rel).id, \
             edge: rel{{.*, type: type(rel)}}}}) AS result"
        );
        let records = self.driver.run(&statement).await?.records();
        let mut edges = Vec::new();
        if let Some(Value::Array(collected)) = records.first().and_then(|record| record.get("result")) {
            for entry in collected {
                if let Ok(edge) = serde_json::from_value::<CoverEdge>(entry.clone()) {
                    edges.push(edge);
                }
            }
        }
        Ok(edges)
    }
}

/// Colon-join a sorted label set into a summary key
#[must_use]
pub fn label_key(labels: &[String]) -> String {
    let mut sorted: Vec<&str> = labels.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(":")
}

fn string_vec(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|values| {
        values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    })
}

/// Build the symmetric schema map from `(source, predicate, target)` rows.
///
/// Every triple is recorded both ways so introspection-driven routes work in
/// either direction; predicates are deduplicated per pair.
#[must_use]
pub fn schema_from_triples(triples: &[(String, String, String)]) -> Schema {
    let mut schema = Schema::new();
    for (source, predicate, target) in triples {
        for (s, t) in [(source, target), (target, source)] {
            let predicates = schema
                .entry(s.clone())
                .or_default()
                .entry(t.clone())
                .or_default();
            if !predicates.contains(predicate) {
                predicates.push(predicate.clone());
            }
        }
    }
    schema
}

fn summary_from_counts(
    node_counts: &[(Vec<String>, u64)],
    edge_counts: &[(Vec<String>, String, Vec<String>, u64)],
) -> Summary {
    let mut summary = Summary::new();
    for (labels, count) in node_counts {
        summary.entry(label_key(labels)).or_default().nodes_count += count;
    }
    for (source_labels, predicate, target_labels, count) in edge_counts {
        let entry = summary.entry(label_key(source_labels)).or_default();
        *entry
            .targets
            .entry(label_key(target_labels))
            .or_default()
            .entry(predicate.clone())
            .or_insert(0) += count;
    }
    summary
}
