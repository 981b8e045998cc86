//! Concept-hierarchy lookup
//!
//! Narrows a list of concept labels to the most specific ones by asking
//! the lookup service for each concept's ancestors and dropping any label
//! that is an ancestor of another. Lookup failures are skipped, so a dead
//! service degrades to returning the labels unchanged.

use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the concept-hierarchy lookup service
#[derive(Debug, Clone)]
pub struct BlLookup {
    base_url: String,
    client: reqwest::Client,
}

impl BlLookup {
    /// Build a client for the service at `base_url`.
    #[must_use]
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn ancestors(&self, concept: &str) -> Option<Vec<String>> {
        let url = format!("{}/bl/{concept}/ancestors", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response.json().await.ok(),
            Ok(response) => {
                warn!(%url, status = %response.status(), "concept lookup failed");
                None
            }
            Err(error) => {
                warn!(%url, %error, "concept lookup unreachable");
                None
            }
        }
    }

    /// Keep only the concepts that are not ancestors of any other concept
    /// in the list.
    pub async fn most_specific_concepts(&self, concepts: &[String]) -> Vec<String> {
        let lookups = concepts.iter().map(|concept| self.ancestors(concept));
        let responses = futures::future::join_all(lookups).await;
        let ancestors: HashSet<String> = responses.into_iter().flatten().flatten().collect();
        concepts
            .iter()
            .filter(|concept| !ancestors.contains(*concept))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_ancestor_labels_are_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bl/gene/ancestors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                "named_thing", "biological_entity"
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bl/named_thing/ancestors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let bl = BlLookup::new(server.uri());
        let concepts = vec!["gene".to_string(), "named_thing".to_string()];
        let specific = bl.most_specific_concepts(&concepts).await;
        assert_eq!(specific, vec!["gene"]);
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_labels() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let bl = BlLookup::new(server.uri());
        let concepts = vec!["gene".to_string(), "disease".to_string()];
        let specific = bl.most_specific_concepts(&concepts).await;
        assert_eq!(specific, concepts);
    }

    #[tokio::test]
    async fn test_empty_concept_list() {
        let bl = BlLookup::new("http://127.0.0.1:1".to_string());
        assert!(bl.most_specific_concepts(&[]).await.is_empty());
    }
}
