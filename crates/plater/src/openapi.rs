//! OpenAPI assembly
//!
//! The spec is built from the live schema: path parameter enums come from
//! the discovered node types, node and one-hop examples are sampled from
//! the graph, and the structured-query paths carry an illustrative
//! question/answer pair built from a synthetic `gene`/`chemical_substance`
//! schema. Every operation is tagged with the build tag.

use crate::error::Result;
use plater_graph::{GraphInterface, Schema};
use plater_trapi::question::one_hop_templates;
use plater_trapi::ReasonerRequest;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Build the full OpenAPI document for this instance.
pub async fn build_spec(graph: &GraphInterface, build_tag: &str) -> Result<Value> {
    let schema = graph.get_schema().await?;

    let mut source_types: BTreeSet<&str> = BTreeSet::new();
    let mut target_types: BTreeSet<&str> = BTreeSet::new();
    let mut node_example: Vec<Value> = Vec::new();
    let mut one_hop_example: Vec<Value> = Vec::new();
    for (source, targets) in schema {
        source_types.insert(source.as_str());
        if node_example.is_empty() {
            node_example = graph.get_examples(source, None).await.unwrap_or_default();
        }
        for target in targets.keys() {
            target_types.insert(target.as_str());
            if one_hop_example.is_empty() {
                one_hop_example = graph
                    .get_examples(source, Some(target.as_str()))
                    .await
                    .unwrap_or_default();
            }
        }
    }
    let source_types: Vec<&str> = source_types.into_iter().collect();
    let target_types: Vec<&str> = target_types.into_iter().collect();

    let example_cypher = "MATCH (c) RETURN c LIMIT 1";
    let cypher_example = match graph.run_cypher(example_cypher).await {
        Ok(response) => serde_json::to_value(response).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    };

    let example_questions = one_hop_templates(&synthetic_schema());
    let example_question = example_questions
        .first()
        .and_then(|template| serde_json::to_value(template).ok())
        .unwrap_or(Value::Null);
    let example_answer = example_questions
        .first()
        .map(example_reasoner_answer)
        .unwrap_or(Value::Null);
    let example_questions_value =
        serde_json::to_value(&example_questions).unwrap_or(Value::Null);

    let mut paths = serde_json::Map::new();

    paths.insert(
        "/about".to_string(),
        json!({
            "get": {
                "description": "Returns a json describing dataset.",
                "summary": "Json about dataset.",
                "operationId": format!("about_dataset_{build_tag}"),
                "parameters": [],
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object",
                    "example": {
                        "dataset-version": "N/A",
                        "dataset-description": "Add dataset version here",
                        "code-used": "link to repo",
                        "date-generated": "N/A"
                    }
                }}}}}
            }
        }),
    );

    paths.insert(
        "/{node_type}/{curie}".to_string(),
        json!({
            "get": {
                "description": "Returns `node` matching `curie`.",
                "summary": "Find `node` by `curie`.",
                "operationId": format!("get_source_node_by_curie_{build_tag}"),
                "parameters": [
                    {
                        "name": "node_type",
                        "in": "path",
                        "description": "Type of the node to look for.",
                        "required": true,
                        "schema": {"type": "string", "enum": &source_types}
                    },
                    {
                        "name": "curie",
                        "in": "path",
                        "description": "The curie of the node that needs to be fetched.",
                        "required": true,
                        "schema": {"type": "string"}
                    }
                ],
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object", "example": node_example
                }}}}}
            }
        }),
    );

    paths.insert(
        "/{source_node_type}/{target_node_type}/{curie}".to_string(),
        json!({
            "get": {
                "description": "Returns one hop paths from `source_node_type` with `curie` to `target_node_type`.",
                "summary": "Get one hop results from source type to target type. Note: Please refer \
                            to `graph/schema` endpoint output to determine what target goes with a source",
                "operationId": format!("get_one_hop_source_node_type_to_target_node_type_{build_tag}"),
                "parameters": [
                    {
                        "name": "source_node_type",
                        "in": "path",
                        "description": "The node type of source node in the path.",
                        "required": true,
                        "schema": {"type": "string", "enum": &source_types}
                    },
                    {
                        "name": "target_node_type",
                        "in": "path",
                        "description": "The node type of target node in the path.",
                        "required": true,
                        "schema": {"type": "string", "enum": &target_types}
                    },
                    {
                        "name": "curie",
                        "in": "path",
                        "description": "The `curie` for the `source_node_type` that the path starts from.",
                        "required": true,
                        "schema": {"type": "string"}
                    }
                ],
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object", "example": one_hop_example
                }}}}}
            }
        }),
    );

    let schema_example = json!({"chemical_substance": {"gene": ["directly_interacts_with"]}});
    paths.insert(
        "/graph/schema".to_string(),
        json!({
            "get": {
                "deprecated": true,
                "description": "Returns an object where outer keys represent source types with second level keys as \
                                targets. And the values of the second level keys is the type of possible edge types \
                                that connect these concepts.",
                "operationId": format!("get_graph_schema_{build_tag}"),
                "summary": "We recommend using `predicates` endpoint, as support for this will be discontinued.",
                "parameters": [],
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object", "example": &schema_example
                }}}}}
            }
        }),
    );

    paths.insert(
        "/predicates".to_string(),
        json!({
            "get": {
                "tags": ["translator"],
                "description": "Returns an object where outer keys represent source types with second level keys as \
                                targets. And the values of the second level keys is the type of possible edge types \
                                that connect these concepts.",
                "operationId": format!("get_predicates_{build_tag}"),
                "summary": "Get the list of available predicates.",
                "parameters": [],
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object", "example": &schema_example
                }}}}}
            }
        }),
    );

    paths.insert(
        "/cypher".to_string(),
        json!({
            "post": {
                "summary": "Run cypher query.",
                "description": "Runs cypher query against the Neo4j instance, and returns an equivalent \
                                response expected from a Neo4j HTTP endpoint \
                                (https://neo4j.com/docs/rest-docs/current/).",
                "operationId": format!("run_cypher_{build_tag}"),
                "requestBody": {
                    "description": "Cypher query.",
                    "content": {"application/json": {"schema": {
                        "type": "object", "example": {"query": example_cypher}
                    }}},
                    "required": true
                },
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object", "example": cypher_example
                }}}}}
            }
        }),
    );

    paths.insert(
        "/reasonerapi".to_string(),
        json!({
            "get": {
                "deprecated": true,
                "description": "Returns a list of question templates that can be used to query this instance.",
                "operationId": format!("get_question_templates_{build_tag}"),
                "summary": "Get list of one hop questions possible to ask. (Please use `query` endpoint as \
                            support might discontinue).",
                "parameters": [],
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object", "example": example_questions_value
                }}}}}
            },
            "post": {
                "description": "Given a question graph return question graph plus answers.",
                "operationId": format!("post_question_{build_tag}"),
                "summary": "Post a query graph. (Please use `query` endpoint as support might discontinue).",
                "requestBody": {
                    "description": "Question.",
                    "content": {"application/json": {"schema": {"type": "object", "example": &example_question}}},
                    "required": true
                },
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object", "example": &example_answer
                }}}}}
            }
        }),
    );

    paths.insert(
        "/query".to_string(),
        json!({
            "post": {
                "tags": ["translator"],
                "description": "Given a question graph return question graph plus answers.",
                "operationId": format!("post_question_query_{build_tag}"),
                "summary": "Post a query graph and get back answers.",
                "requestBody": {
                    "description": "Question.",
                    "content": {"application/json": {"schema": {"type": "object", "example": &example_question}}},
                    "required": true
                },
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object", "example": &example_answer
                }}}}}
            }
        }),
    );

    paths.insert(
        "/simple_spec".to_string(),
        json!({
            "get": {
                "description": "Returns a list of available predicates when choosing a single source or target \
                                curie. Calling this endpoint with no query parameters will return all \
                                possible hops for all types.",
                "operationId": format!("get_simple_spec_{build_tag}"),
                "summary": "Query about predicates available by sending in a curie.",
                "parameters": [
                    {
                        "name": "source",
                        "in": "query",
                        "description": "The curie of source that needs to be fetched.",
                        "required": false,
                        "schema": {"type": "string", "example": "CHEBI:33216"}
                    },
                    {
                        "name": "target",
                        "in": "query",
                        "description": "The curie of target that needs to be fetched.",
                        "required": false,
                        "schema": {"type": "string", "example": "NCBIGene:1"}
                    }
                ],
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object",
                    "example": [{
                        "source_type": "chemical_substance",
                        "target_type": "chemical_substance",
                        "edge_type": "similar_to"
                    }]
                }}}}}
            }
        }),
    );

    paths.insert(
        "/graph/summary".to_string(),
        json!({
            "get": {
                "description": "Returns summary of the graph",
                "operationId": format!("get_graph_summary_{build_tag}"),
                "summary": "Schema summary of the graph",
                "parameters": [],
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object",
                    "example": {
                        "chemical_substance:molecular_entity:named_thing": {
                            "nodes_count": 7,
                            "gene:biological_entity:named_thing": {"directly_interacts_with": 20}
                        }
                    }
                }}}}}
            }
        }),
    );

    paths.insert(
        "/overlay".to_string(),
        json!({
            "post": {
                "description": "Given an answer document add support edges for any nodes linked in result bindings.",
                "operationId": format!("post_answer_overlay_{build_tag}"),
                "summary": "Overlay results with available connections between each node.",
                "requestBody": {
                    "description": "Answer document.",
                    "content": {"application/json": {"schema": {"type": "object", "example": &example_answer}}},
                    "required": true
                },
                "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                    "type": "object", "example": &example_answer
                }}}}}
            }
        }),
    );

    let mut paths = Value::Object(paths);
    tag_paths(&mut paths, build_tag);

    Ok(json!({
        "openapi": "3.0.2",
        "info": {"title": format!("PLATER - {build_tag}"), "version": "2.0"},
        "paths": paths
    }))
}

/// The synthetic schema the illustrative question is built from
fn synthetic_schema() -> Schema {
    let mut schema = Schema::new();
    schema
        .entry("gene".to_string())
        .or_default()
        .insert("chemical_substance".to_string(), vec!["is_affected_by".to_string()]);
    schema
}

/// Build a placeholder answer document showing the structure of a typical
/// response to the given question, without touching the database.
#[must_use]
pub fn example_reasoner_answer(request: &ReasonerRequest) -> Value {
    let node_ids: Vec<&str> = request
        .query_graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    let edge_ids: Vec<&str> = request
        .query_graph
        .edges
        .iter()
        .map(|e| e.id.as_str())
        .collect();

    let placeholder = |id: &str| {
        json!({
            "id": format!("{id}'s DB ID"),
            "name": format!("{id} has name")
        })
    };

    let node_bindings: Vec<Value> = node_ids
        .iter()
        .map(|id| json!({"qg_id": id, "kg_id": format!("{id}'s DB ID")}))
        .collect();
    let edge_bindings: Vec<Value> = edge_ids
        .iter()
        .map(|id| json!({"qg_id": id, "kg_id": format!("{id}'s DB ID")}))
        .collect();

    json!({
        "query_graph": &request.query_graph,
        "knowledge_graph": {
            "nodes": node_ids.iter().map(|id| placeholder(id)).collect::<Vec<_>>(),
            "edges": edge_ids.iter().map(|id| placeholder(id)).collect::<Vec<_>>()
        },
        "results": [{
            "node_bindings": node_bindings,
            "edge_bindings": edge_bindings
        }]
    })
}

/// Append `build_tag` to the tags of every operation in the paths object.
pub fn tag_paths(paths: &mut Value, build_tag: &str) {
    let Some(paths) = paths.as_object_mut() else {
        return;
    };
    for item in paths.values_mut() {
        let Some(operations) = item.as_object_mut() else {
            continue;
        };
        for operation in operations.values_mut() {
            let Some(operation) = operation.as_object_mut() else {
                continue;
            };
            let tags = operation
                .entry("tags".to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(tags) = tags.as_array_mut() {
                tags.push(Value::String(build_tag.to_string()));
            }
        }
    }
}
