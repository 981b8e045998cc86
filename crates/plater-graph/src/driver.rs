//! Neo4j transactional-HTTP driver
//!
//! Sends cypher statements in the batch-statement envelope to
//! `POST /db/data/transaction/commit` with HTTP Basic auth and converts the
//! rows-with-columns response into flat records.

use crate::cypher::string_literal;
use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const TRANSACTION_PATH: &str = "/db/data/transaction/commit";
const LABELS_PATH: &str = "/db/data/labels";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_CAPACITY: usize = 60;
const SLOW_PING: Duration = Duration::from_secs(5);

/// A normalized result row: column name to value
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Serialize)]
struct Statement<'a> {
    statement: &'a str,
}

#[derive(Debug, Serialize)]
struct TxRequest<'a> {
    statements: Vec<Statement<'a>>,
}

/// One error entry from the transactional endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// One data row: positional values matching the result's `columns`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxRow {
    pub row: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<Value>,
}

/// One result block from the transactional endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxResult {
    pub columns: Vec<String>,
    pub data: Vec<TxRow>,
}

/// Full response body of a transactional commit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxResponse {
    #[serde(default)]
    pub results: Vec<TxResult>,
    #[serde(default)]
    pub errors: Vec<TxError>,
}

impl TxResponse {
    /// Flatten every result block into records keyed by column name.
    ///
    /// Each record carries exactly the columns named by its result block;
    /// rows shorter than the column list simply stop early.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        let mut records = Vec::new();
        for result in &self.results {
            for data in &result.data {
                let mut record = Record::new();
                for (column, value) in result.columns.iter().zip(data.row.iter()) {
                    record.insert(column.clone(), value.clone());
                }
                records.push(record);
            }
        }
        records
    }
}

/// Client for one Neo4j instance reached over its transactional HTTP endpoint
#[derive(Debug, Clone)]
pub struct Neo4jHttpDriver {
    client: reqwest::Client,
    transaction_url: String,
    labels_url: String,
    username: String,
    password: String,
}

impl Neo4jHttpDriver {
    /// Build a driver for `http://{host}:{port}` with the given credentials.
    ///
    /// The underlying connection pool is shared by every clone of the
    /// driver, so one driver per process is the expected shape.
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(POOL_CAPACITY)
            .build()
            .map_err(|e| GraphError::Backend(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            transaction_url: format!("http://{host}:{port}{TRANSACTION_PATH}"),
            labels_url: format!("http://{host}:{port}{LABELS_PATH}"),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Run one cypher statement and return the parsed response.
    ///
    /// Transport failures and non-2xx statuses surface as
    /// [`GraphError::Backend`]; a response with a non-empty `errors` array
    /// surfaces as [`GraphError::Query`] carrying the statement.
    pub async fn run(&self, cypher: &str) -> Result<TxResponse> {
        let payload = TxRequest {
            statements: vec![Statement { statement: cypher }],
        };
        let response = self
            .client
            .post(&self.transaction_url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json; charset=UTF-8")
            .json(&payload)
            .send()
            .await
            .map_err(|e| GraphError::Backend(format!("transaction request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Backend(format!(
                "transaction endpoint returned {status}"
            )));
        }

        let parsed: TxResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Backend(format!("unparsable transaction response: {e}")))?;

        if let Some(error) = parsed.errors.first() {
            return Err(GraphError::Query {
                cypher: cypher.to_string(),
                message: error.message.clone(),
            });
        }
        Ok(parsed)
    }

    /// Ping the labels endpoint to confirm the database is reachable.
    ///
    /// Fatal on transport failure or non-2xx; logs a warning when the round
    /// trip takes longer than five seconds.
    pub async fn ping(&self) -> Result<()> {
        let started = Instant::now();
        let response = self
            .client
            .get(&self.labels_url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| {
                GraphError::Backend(format!("graph database unreachable at {}: {e}", self.labels_url))
            })?;
        let elapsed = started.elapsed();
        if elapsed > SLOW_PING {
            warn!(latency_ms = elapsed.as_millis() as u64, "graph database ping is slow");
        }
        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Backend(format!(
                "graph database ping returned {status}"
            )));
        }
        debug!(latency_ms = elapsed.as_millis() as u64, "graph database ping ok");
        Ok(())
    }

    /// Make sure a relationship fulltext index over edge `id`s exists.
    ///
    /// Creates the index over every relationship type when absent. An index
    /// with the same name but a different type is a deployment error and is
    /// reported as [`GraphError::IndexMismatch`].
    pub async fn ensure_edge_index(&self, index_name: &str) -> Result<()> {
        let indexes = self.run("CALL db.indexes()").await?.records();
        for index in &indexes {
            // older server lines report the name under `indexName`
            let name = index
                .get("indexName")
                .or_else(|| index.get("name"))
                .and_then(Value::as_str);
            if name == Some(index_name) {
                let kind = index.get("type").and_then(Value::as_str).unwrap_or_default();
                if kind != "relationship_fulltext" {
                    return Err(GraphError::IndexMismatch(format!(
                        "index {index_name} exists with type {kind}, expected relationship_fulltext"
                    )));
                }
                debug!(index = index_name, "edge fulltext index already present");
                return Ok(());
            }
        }

        let relationship_types: Vec<String> = self
            .run("CALL db.relationshipTypes()")
            .await?
            .records()
            .iter()
            .filter_map(|record| {
                record
                    .get("relationshipType")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect();

        if relationship_types.is_empty() {
            warn!("graph has no relationship types, skipping edge index creation");
            return Ok(());
        }

        let type_list = relationship_types
            .iter()
            .map(|t| string_literal(t))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "CALL db.index.fulltext.createRelationshipIndex({name}, [{type_list}], [\"id\"], \
             {{analyzer: \"whitespace\", eventually_consistent: \"true\"}})",
            name = string_literal(index_name),
        );
        self.run(&statement).await?;
        info!(
            index = index_name,
            relationship_types = relationship_types.len(),
            "created edge fulltext index"
        );
        Ok(())
    }
}
