//! Build-diff validation
//!
//! Compares the current graph summary to the one stored by the previous
//! build. A first run stores the summary and passes; later runs that find
//! a difference write a diff report and fail.

use super::GraphValidator;
use crate::error::{PlaterError, Result};
use async_trait::async_trait;
use plater_graph::Summary;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const SUMMARY_FILE: &str = "graph_summary.json";
const DIFF_FILE: &str = "graph_diff.json";

/// Compares the current summary against `logs/graph_summary.json`
pub struct BuildComparisonValidator {
    summary: Summary,
    summary_file: PathBuf,
    diff_file: PathBuf,
}

impl BuildComparisonValidator {
    /// `reset_summary` rewrites the stored summary before any comparison.
    pub fn new(summary: Summary, log_dir: &Path, reset_summary: bool) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .map_err(|e| PlaterError::Internal(format!("could not create {}: {e}", log_dir.display())))?;
        let validator = Self {
            summary,
            summary_file: log_dir.join(SUMMARY_FILE),
            diff_file: log_dir.join(DIFF_FILE),
        };
        if reset_summary {
            info!(path = %validator.summary_file.display(), "resetting stored graph summary");
            validator.write_summary()?;
        }
        Ok(validator)
    }

    fn write_summary(&self) -> Result<()> {
        let pretty = serde_json::to_string_pretty(&self.summary)
            .map_err(|e| PlaterError::Internal(format!("summary not serializable: {e}")))?;
        fs::write(&self.summary_file, pretty).map_err(|e| {
            PlaterError::Internal(format!("could not write {}: {e}", self.summary_file.display()))
        })
    }

    fn previous_summary(&self) -> Option<Summary> {
        let raw = fs::read_to_string(&self.summary_file).ok()?;
        serde_json::from_str(&raw).ok()
    }
}

#[async_trait]
impl GraphValidator for BuildComparisonValidator {
    fn name(&self) -> &'static str {
        "build_comparison"
    }

    async fn validate(&self) -> Result<bool> {
        let Some(previous) = self.previous_summary() else {
            info!("no stored build summary to compare against, saving the current one");
            self.write_summary()?;
            return Ok(true);
        };
        let (diff, matches) = summary_diff(&self.summary, &previous);
        if !matches {
            info!(path = %self.diff_file.display(), "writing build difference report");
            let pretty = serde_json::to_string_pretty(&diff)
                .map_err(|e| PlaterError::Internal(format!("diff not serializable: {e}")))?;
            fs::write(&self.diff_file, pretty).map_err(|e| {
                PlaterError::Internal(format!("could not write {}: {e}", self.diff_file.display()))
            })?;
        }
        Ok(matches)
    }
}

/// Diff two summaries. Returns the structured diff and whether the builds
/// match (`true` means no difference).
#[must_use]
pub fn summary_diff(new: &Summary, old: &Summary) -> (Value, bool) {
    let mut diff = serde_json::Map::new();
    let mut matches = true;

    let previous_only: Vec<&String> = old.keys().filter(|key| !new.contains_key(*key)).collect();
    let current_only: Vec<&String> = new.keys().filter(|key| !old.contains_key(*key)).collect();
    if !previous_only.is_empty() || !current_only.is_empty() {
        matches = false;
    }
    diff.insert("types_in_previous_build_only".to_string(), json!(previous_only));
    diff.insert("types_in_current_build_only".to_string(), json!(current_only));

    for (node_type, new_entry) in new {
        let Some(old_entry) = old.get(node_type) else {
            continue;
        };
        let mut per_type = serde_json::Map::new();

        let targets_previous_only: Vec<&String> = old_entry
            .targets
            .keys()
            .filter(|key| !new_entry.targets.contains_key(*key))
            .collect();
        let targets_current_only: Vec<&String> = new_entry
            .targets
            .keys()
            .filter(|key| !old_entry.targets.contains_key(*key))
            .collect();
        if !targets_previous_only.is_empty() || !targets_current_only.is_empty() {
            matches = false;
        }
        per_type.insert(
            "target_nodes_in_previous_build_only".to_string(),
            json!(targets_previous_only),
        );
        per_type.insert(
            "target_nodes_in_current_build_only".to_string(),
            json!(targets_current_only),
        );

        for (target_type, new_edges) in &new_entry.targets {
            let Some(old_edges) = old_entry.targets.get(target_type) else {
                continue;
            };
            let mut per_edge_set = serde_json::Map::new();

            let edges_previous_only: Vec<&String> = old_edges
                .keys()
                .filter(|key| !new_edges.contains_key(*key))
                .collect();
            let edges_current_only: Vec<&String> = new_edges
                .keys()
                .filter(|key| !old_edges.contains_key(*key))
                .collect();
            if !edges_previous_only.is_empty() {
                matches = false;
                per_edge_set.insert(
                    "edges_in_previous_build_only".to_string(),
                    json!({
                        "description": format!("from {node_type} --> {target_type}"),
                        "edges": edges_previous_only
                    }),
                );
            }
            if !edges_current_only.is_empty() {
                matches = false;
                per_edge_set.insert(
                    "edges_in_current_build_only".to_string(),
                    json!({
                        "description": format!("from {node_type} --> {target_type}"),
                        "edges": edges_current_only
                    }),
                );
            }

            let mut count_diffs = Vec::new();
            for (edge, new_count) in new_edges {
                let Some(old_count) = old_edges.get(edge) else {
                    continue;
                };
                let delta = *old_count as i64 - *new_count as i64;
                let message = if delta > 0 {
                    matches = false;
                    format!(
                        "Old build had {delta} more `{edge}` edges. {node_type} --> {target_type}"
                    )
                } else if delta < 0 {
                    matches = false;
                    format!(
                        "New build has {} more `{edge}` edges. {node_type} --> {target_type}",
                        -delta
                    )
                } else {
                    "No edge diff".to_string()
                };
                count_diffs.push(message);
            }
            per_edge_set.insert("edge_count_diff".to_string(), json!(count_diffs));
            per_type.insert(target_type.clone(), Value::Object(per_edge_set));
        }
        diff.insert(node_type.clone(), Value::Object(per_type));
    }
    (Value::Object(diff), matches)
}
