//! Process configuration, read once at startup from the environment

use crate::error::{AutomatError, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_WEB_HOST: &str = "127.0.0.1";
pub const DEFAULT_WEB_PORT: u16 = 8081;
pub const DEFAULT_AGE_SECS: u64 = 1;
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Everything AUTOMAT reads from the environment
#[derive(Debug, Clone)]
pub struct AutomatConfig {
    pub web_host: String,
    pub web_port: u16,
    /// Offset in seconds applied before liveness threshold comparison
    pub age: u64,
    /// Directory of static documentation assets served as a fallback
    pub static_dir: PathBuf,
}

impl AutomatConfig {
    /// Read the configuration; every value has a default.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            web_host: optional("WEB_HOST").unwrap_or_else(|| DEFAULT_WEB_HOST.to_string()),
            web_port: match optional("WEB_PORT") {
                Some(value) => parse_number(&value, "WEB_PORT")?,
                None => DEFAULT_WEB_PORT,
            },
            age: match optional("HEARTBEAT_AGE") {
                Some(value) => parse_number(&value, "HEARTBEAT_AGE")?,
                None => DEFAULT_AGE_SECS,
            },
            static_dir: optional("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| AutomatError::Config(format!("{key} has unparsable value `{value}`")))
}
