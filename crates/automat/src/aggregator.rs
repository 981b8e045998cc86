//! Merged OpenAPI assembly
//!
//! Fetches every registered backend's `openapi.json` concurrently and
//! installs each of its paths under `/{tag}{path}` in one merged document.
//! Backends that fail or time out are skipped with a log line; the merge
//! proceeds with whatever returned.

use crate::registry::Registry;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

/// Per-backend fetch timeout
pub const SPEC_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the merged spec from the current registry snapshot.
pub async fn merged_openapi(registry: &Registry, client: &reqwest::Client) -> Value {
    let snapshot = registry.get_registry();
    let fetches = snapshot.iter().map(|(tag, entry)| {
        let url = format!("http://{}/openapi.json", entry.url);
        async move {
            match fetch_spec(client, &url).await {
                Ok(spec) => Some((tag.clone(), spec)),
                Err(error) => {
                    warn!(%tag, %url, %error, "skipping backend spec");
                    None
                }
            }
        }
    });
    let specs = futures::future::join_all(fetches).await;

    let mut paths = serde_json::Map::new();
    for (tag, spec) in specs.into_iter().flatten() {
        let Some(spec_paths) = spec.get("paths").and_then(Value::as_object) else {
            continue;
        };
        for (path, item) in spec_paths {
            paths.insert(format!("/{tag}{path}"), item.clone());
        }
    }
    paths.insert("/registry".to_string(), registry_path_doc());

    json!({
        "openapi": "3.0.2",
        "info": {"title": "Automat"},
        "paths": paths
    })
}

async fn fetch_spec(client: &reqwest::Client, url: &str) -> Result<Value, String> {
    let response = client
        .get(url)
        .timeout(SPEC_FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("status {status}"));
    }
    response.json().await.map_err(|e| e.to_string())
}

fn registry_path_doc() -> Value {
    json!({
        "get": {
            "description": "Returns list of available PLATER instances. An entry from this list can \
                            be a prefix to route requests to a specific PLATER backend",
            "operationId": "get_registry",
            "parameters": [],
            "tags": ["automat"],
            "responses": {"200": {"description": "OK", "content": {"application/json": {"schema": {
                "type": "object",
                "example": ["plater-1", "plater-2"]
            }}}}}
        }
    })
}
