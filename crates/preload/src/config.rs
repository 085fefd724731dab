//! Preloader configuration.

use preload_core::{ConfigError, Error, Result};
use preload_query::Dialect;
use serde::Deserialize;

/// Configuration for [`Preloader`](crate::Preloader) behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreloaderConfig {
    /// Dialect used when rendering SQL for trace output.
    pub dialect: Dialect,
    /// Whether to emit the rendered SQL of each batch query at TRACE level.
    pub log_sql: bool,
}

impl Default for PreloaderConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            log_sql: true,
        }
    }
}

impl PreloaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid preloader config: {e}"),
                source: Some(Box::new(e)),
            })
        })
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_log_sql(mut self, log_sql: bool) -> Self {
        self.log_sql = log_sql;
        self
    }
}
