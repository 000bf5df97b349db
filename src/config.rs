//! Loader configuration
//!
//! Configuration is read from a YAML document with a `default` section and
//! optional per-environment overrides:
//!
//! ```yaml
//! default:
//!   database: ${DATA_DIR}/bank.db
//!   graph_database: ${DATA_DIR}/graph.db
//!   pool:
//!     max_connections: 10
//!   include_ground_truth: false
//! environments:
//!   test:
//!     include_ground_truth: true
//! ```
//!
//! The selected environment is merged over `default` key by key (nested
//! sections merge recursively), then `${VAR}` / `${VAR:-fallback}` references
//! in string values are expanded from the process environment.

use crate::normalize::Defaults;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Environment variable not set: {0}")]
    UnsetVariable(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Connection pool limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Ceiling on concurrently checked-out connections
    pub max_connections: usize,
    /// How long `acquire` waits for a free connection
    pub acquire_timeout_secs: u64,
    /// Connections older than this are closed and reopened
    pub recycle_after_secs: u64,
    /// SQLite busy timeout applied to every connection
    pub busy_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_secs: 30,
            recycle_after_secs: 3600,
            busy_timeout_ms: 5000,
        }
    }
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn recycle_after(&self) -> Duration {
        Duration::from_secs(self.recycle_after_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Query bounds for the graph mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub ownership_max_depth: usize,
    pub context_depth: usize,
    pub search_limit: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            ownership_max_depth: 5,
            context_depth: 2,
            search_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Relational store (SQLite file)
    pub database: PathBuf,
    /// Graph mirror (separate SQLite file)
    pub graph_database: PathBuf,
    pub pool: PoolConfig,
    /// Populate hidden label columns and properties
    pub include_ground_truth: bool,
    /// Fallbacks for unrecognized categorical values
    pub normalization: Defaults,
    pub graph: GraphConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("bank.db"),
            graph_database: PathBuf::from("graph.db"),
            pool: PoolConfig::default(),
            include_ground_truth: false,
            normalization: Defaults::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Read a config file, applying `environment` overrides when given
    pub fn load(path: impl AsRef<Path>, environment: Option<&str>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text, environment)
    }

    pub fn from_yaml_str(text: &str, environment: Option<&str>) -> ConfigResult<Self> {
        let doc: Value = serde_yaml::from_str(text)?;
        let mut merged = match doc.get("default") {
            Some(Value::Mapping(base)) => Value::Mapping(base.clone()),
            Some(Value::Null) | None => Value::Mapping(Mapping::new()),
            Some(_) => return Err(ConfigError::Invalid("'default' must be a mapping".into())),
        };

        if let Some(env) = environment {
            let overrides = doc
                .get("environments")
                .and_then(|envs| envs.get(env))
                .ok_or_else(|| ConfigError::UnknownEnvironment(env.to_string()))?;
            merge(&mut merged, overrides);
        }

        expand_strings(&mut merged)?;
        let config: IngestConfig = serde_yaml::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.pool.max_connections == 0 {
            return Err(ConfigError::Invalid("pool.max_connections must be at least 1".into()));
        }
        if self.pool.acquire_timeout_secs == 0 || self.pool.recycle_after_secs == 0 {
            return Err(ConfigError::Invalid(
                "pool.acquire_timeout_secs and pool.recycle_after_secs must be at least 1".into(),
            ));
        }
        if self.graph.search_limit == 0 {
            return Err(ConfigError::Invalid("graph.search_limit must be at least 1".into()));
        }
        Ok(())
    }
}

/// Merge `overlay` into `base`; mappings merge recursively, anything else replaces
fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn expand_strings(value: &mut Value) -> ConfigResult<()> {
    match value {
        Value::String(s) => {
            *s = expand_env(s)?;
        }
        Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_strings(v)?;
            }
        }
        Value::Sequence(items) => {
            for v in items.iter_mut() {
                expand_strings(v)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Expand `${VAR}` and `${VAR:-fallback}` references
pub fn expand_env(input: &str) -> ConfigResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::Invalid(format!("unterminated variable in '{}'", input)));
        };
        let expr = &after[..end];
        let (name, fallback) = match expr.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (expr, None),
        };
        match (std::env::var(name), fallback) {
            (Ok(value), _) => out.push_str(&value),
            (Err(_), Some(fallback)) => out.push_str(fallback),
            (Err(_), None) => return Err(ConfigError::UnsetVariable(name.to_string())),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
