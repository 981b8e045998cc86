//! Registry with TTL-based liveness
//!
//! Keyed by backend tag, storing the last heartbeat time. Liveness is not
//! stored: every read recomputes each entry's label from
//! `now - last_seen - age` against the thresholds below, and entries past
//! the delete threshold vanish on that read.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Entries older than `age + TTL_WARNING` seconds are labeled `warn`
pub const TTL_WARNING: u64 = 2;
/// Entries older than `age + TTL_OFFLINE` seconds are labeled `offline`
pub const TTL_OFFLINE: u64 = 3;
/// Entries older than `age + TTL_DELETE` seconds are removed on read
pub const TTL_DELETE: u64 = 600;

/// A liveness announcement from one backend. Identity is the tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub host: String,
    pub port: u16,
    pub tag: String,
}

impl Heartbeat {
    /// The backend's address as `host:port`
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PartialEq for Heartbeat {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl Eq for Heartbeat {}

/// Computed liveness label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Alive,
    Warn,
    Offline,
}

/// One row of a registry snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub url: String,
    pub status: Liveness,
}

/// A consistent point-in-time view of the registry
pub type RegistrySnapshot = BTreeMap<String, RegistryEntry>;

/// In-memory registry of backends, owned for the process lifetime
#[derive(Debug)]
pub struct Registry {
    age_secs: f64,
    entries: Mutex<HashMap<String, (Heartbeat, Instant)>>,
}

impl Registry {
    /// `age` is the offset in seconds applied before threshold comparison.
    #[must_use]
    pub fn new(age: u64) -> Self {
        Self {
            age_secs: age as f64,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record a heartbeat and return the refreshed snapshot.
    pub fn refresh(&self, heartbeat: Heartbeat) -> RegistrySnapshot {
        self.refresh_at(heartbeat, Instant::now())
    }

    /// Compute the current snapshot, removing entries past the delete
    /// threshold after the snapshot is built.
    pub fn get_registry(&self) -> RegistrySnapshot {
        self.get_registry_at(Instant::now())
    }

    /// The `host:port` of a registered tag, if any
    pub fn get_host_by_tag(&self, tag: &str) -> Option<String> {
        self.entries
            .lock()
            .get(tag)
            .map(|(heartbeat, _)| heartbeat.url())
    }

    pub(crate) fn refresh_at(&self, heartbeat: Heartbeat, now: Instant) -> RegistrySnapshot {
        self.entries
            .lock()
            .insert(heartbeat.tag.clone(), (heartbeat, now));
        self.get_registry_at(now)
    }

    pub(crate) fn get_registry_at(&self, now: Instant) -> RegistrySnapshot {
        // one lock acquisition: the snapshot is consistent, and refreshes
        // interleaving with this call wait until it completes
        let mut entries = self.entries.lock();
        let mut snapshot = RegistrySnapshot::new();
        let mut expired = Vec::new();
        for (tag, (heartbeat, last_seen)) in entries.iter() {
            let ttl = now.saturating_duration_since(*last_seen).as_secs_f64() - self.age_secs;
            if ttl > TTL_DELETE as f64 {
                expired.push(tag.clone());
                continue;
            }
            let status = if ttl > TTL_OFFLINE as f64 {
                Liveness::Offline
            } else if ttl > TTL_WARNING as f64 {
                Liveness::Warn
            } else {
                Liveness::Alive
            };
            snapshot.insert(
                tag.clone(),
                RegistryEntry {
                    url: heartbeat.url(),
                    status,
                },
            );
        }
        for tag in expired {
            entries.remove(&tag);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn heartbeat(tag: &str) -> Heartbeat {
        Heartbeat {
            host: "h".to_string(),
            port: 1,
            tag: tag.to_string(),
        }
    }

    #[test]
    fn test_heartbeat_equality_is_by_tag() {
        let a = heartbeat("a");
        let b = Heartbeat {
            host: "other".to_string(),
            port: 99,
            tag: "a".to_string(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_expiry_ladder() {
        // age=1: alive at t=1, warn at t=4, offline at t=6, gone at t=602
        let registry = Registry::new(1);
        let t0 = Instant::now();
        let snapshot = registry.refresh_at(heartbeat("a"), t0);
        assert_eq!(snapshot["a"].status, Liveness::Alive);
        assert_eq!(snapshot["a"].url, "h:1");

        let at = |secs| registry.get_registry_at(t0 + Duration::from_secs(secs));
        assert_eq!(at(1)["a"].status, Liveness::Alive);
        assert_eq!(at(4)["a"].status, Liveness::Warn);
        assert_eq!(at(6)["a"].status, Liveness::Offline);
        assert!(at(602).is_empty());
        // the expired entry was removed, not just hidden
        assert!(registry.get_host_by_tag("a").is_none());
    }

    #[test]
    fn test_labels_are_monotonic_in_age() {
        let registry = Registry::new(0);
        let t0 = Instant::now();
        registry.refresh_at(heartbeat("a"), t0);

        let mut last_rank = 0;
        for secs in [0u64, 1, 2, 3, 4, 10, 100, 600] {
            let snapshot = registry.get_registry_at(t0 + Duration::from_secs(secs));
            let rank = match snapshot["a"].status {
                Liveness::Alive => 0,
                Liveness::Warn => 1,
                Liveness::Offline => 2,
            };
            assert!(rank >= last_rank, "status regressed at t={secs}");
            last_rank = rank;
        }
    }

    #[test]
    fn test_refresh_resets_the_clock() {
        let registry = Registry::new(1);
        let t0 = Instant::now();
        registry.refresh_at(heartbeat("a"), t0);
        // would be offline by now, but a fresh heartbeat arrives
        let snapshot = registry.refresh_at(heartbeat("a"), t0 + Duration::from_secs(10));
        assert_eq!(snapshot["a"].status, Liveness::Alive);
    }

    #[test]
    fn test_snapshot_carries_every_live_tag() {
        let registry = Registry::new(1);
        let t0 = Instant::now();
        registry.refresh_at(heartbeat("a"), t0);
        registry.refresh_at(heartbeat("b"), t0);
        let snapshot = registry.get_registry_at(t0 + Duration::from_secs(1));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_get_host_by_tag() {
        let registry = Registry::new(1);
        registry.refresh(Heartbeat {
            host: "plater.example.org".to_string(),
            port: 8080,
            tag: "plater-x".to_string(),
        });
        assert_eq!(
            registry.get_host_by_tag("plater-x").as_deref(),
            Some("plater.example.org:8080")
        );
        assert!(registry.get_host_by_tag("plater-y").is_none());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let entry = RegistryEntry {
            url: "h:1".to_string(),
            status: Liveness::Warn,
        };
        let value = serde_json::to_value(&entry).expect("entry serializes");
        assert_eq!(value, serde_json::json!({"url": "h:1", "status": "warn"}));
    }
}
