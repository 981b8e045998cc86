//! Process configuration, read once at startup from the environment

use crate::error::{PlaterError, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_WEB_HOST: &str = "127.0.0.1";
pub const DEFAULT_WEB_PORT: u16 = 8080;
pub const DEFAULT_HEART_RATE_SECS: u64 = 30;
pub const DEFAULT_EDGE_INDEX: &str = "edge_id_index";
pub const DEFAULT_BL_URL: &str = "https://bl-lookup-sri.renci.org";

/// Everything PLATER reads from the environment
#[derive(Debug, Clone)]
pub struct PlaterConfig {
    pub neo4j_host: String,
    pub neo4j_http_port: u16,
    pub neo4j_username: String,
    pub neo4j_password: String,
    pub web_host: String,
    pub web_port: u16,
    /// Public address of this instance; required when heartbeats are on
    pub service_address: Option<String>,
    /// Heartbeat period in seconds
    pub heart_rate: u64,
    pub edge_index_name: String,
    /// Base URL of the concept-hierarchy lookup service
    pub bl_url: String,
    pub log_dir: PathBuf,
    pub about_file: PathBuf,
}

impl PlaterConfig {
    /// Read the configuration, failing on missing required values.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            neo4j_host: required("NEO4J_HOST")?,
            neo4j_http_port: parse_number(&required("NEO4J_HTTP_PORT")?, "NEO4J_HTTP_PORT")?,
            neo4j_username: required("NEO4J_USERNAME")?,
            neo4j_password: required("NEO4J_PASSWORD")?,
            web_host: optional("WEB_HOST").unwrap_or_else(|| DEFAULT_WEB_HOST.to_string()),
            web_port: match optional("WEB_PORT") {
                Some(value) => parse_number(&value, "WEB_PORT")?,
                None => DEFAULT_WEB_PORT,
            },
            service_address: optional("PLATER_SERVICE_ADDRESS"),
            heart_rate: match optional("HEART_RATE") {
                Some(value) => parse_number(&value, "HEART_RATE")?,
                None => DEFAULT_HEART_RATE_SECS,
            },
            edge_index_name: optional("EDGE_INDEX_NAME")
                .unwrap_or_else(|| DEFAULT_EDGE_INDEX.to_string()),
            bl_url: optional("BL_URL").unwrap_or_else(|| DEFAULT_BL_URL.to_string()),
            log_dir: optional("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            about_file: optional("ABOUT_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("about.json")),
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| PlaterError::Config(format!("missing required environment variable {key}")))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| PlaterError::Config(format!("{key} has unparsable value `{value}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // environment is process-global; serialize the tests that touch it
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const REQUIRED: [(&str, &str); 4] = [
        ("NEO4J_HOST", "localhost"),
        ("NEO4J_HTTP_PORT", "7474"),
        ("NEO4J_USERNAME", "neo4j"),
        ("NEO4J_PASSWORD", "secret"),
    ];

    fn clear_all() {
        for (key, _) in REQUIRED {
            env::remove_var(key);
        }
        for key in [
            "WEB_HOST",
            "WEB_PORT",
            "PLATER_SERVICE_ADDRESS",
            "HEART_RATE",
            "EDGE_INDEX_NAME",
            "BL_URL",
            "LOG_DIR",
            "ABOUT_FILE",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_from_env_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_all();
        for (key, value) in REQUIRED {
            env::set_var(key, value);
        }

        let config = PlaterConfig::from_env().expect("required values are set");
        assert_eq!(config.neo4j_host, "localhost");
        assert_eq!(config.neo4j_http_port, 7474);
        assert_eq!(config.web_host, DEFAULT_WEB_HOST);
        assert_eq!(config.web_port, DEFAULT_WEB_PORT);
        assert_eq!(config.heart_rate, DEFAULT_HEART_RATE_SECS);
        assert_eq!(config.edge_index_name, DEFAULT_EDGE_INDEX);
        assert_eq!(config.bl_url, DEFAULT_BL_URL);
        assert!(config.service_address.is_none());
        clear_all();
    }

    #[test]
    fn test_missing_required_value_is_config_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_all();
        for (key, value) in &REQUIRED[..3] {
            env::set_var(key, value);
        }

        let error = PlaterConfig::from_env().unwrap_err();
        assert!(error.to_string().contains("NEO4J_PASSWORD"));
        clear_all();
    }

    #[test]
    fn test_unparsable_port_is_config_error() {
        assert!(parse_number::<u16>("not-a-port", "WEB_PORT").is_err());
        assert_eq!(parse_number::<u16>("8080", "WEB_PORT").ok(), Some(8080));
    }
}
