//! Runner settings.
//!
//! [`RunnerConfig::load`] reads `config/config.toml` (optional) and environment
//! variables prefixed `SPANGUARD__`, e.g. `SPANGUARD__SPANNER__DATABASE_ID=orders`.

use crate::connection::{ConnectionError, DatabasePath};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

const CONFIG_FILE: &str = "config/config.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RunnerConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub database_id: String,
    /// Shadow table holding defaults and generation strategies
    #[serde(default = "default_schema_table_name")]
    pub schema_table_name: String,
    /// Migration bookkeeping table; exempt from the increment substitution warning
    #[serde(default = "default_migrations_table_name")]
    pub migrations_table_name: String,
    /// Upper bound on waiting for a schema-update completion handle
    #[serde(default = "default_operation_timeout_seconds")]
    pub operation_timeout_seconds: u64,
}

fn default_schema_table_name() -> String {
    "schemas".to_string()
}

fn default_migrations_table_name() -> String {
    "migrations".to_string()
}

fn default_operation_timeout_seconds() -> u64 {
    300
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            instance_id: String::new(),
            database_id: String::new(),
            schema_table_name: default_schema_table_name(),
            migrations_table_name: default_migrations_table_name(),
            operation_timeout_seconds: default_operation_timeout_seconds(),
        }
    }
}

impl RunnerConfig {
    /// Settings for a database path with every other field defaulted
    pub fn for_database(path: &DatabasePath) -> Self {
        Self {
            project_id: path.project_id.clone(),
            instance_id: path.instance_id.clone(),
            database_id: path.database_id.clone(),
            ..Self::default()
        }
    }

    /// Load the `spanner` section from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix("SPANGUARD").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!(
                        "failed to load {}, falling back to environment: {}",
                        CONFIG_FILE,
                        err
                    );
                }
                Config::builder()
                    .add_source(Environment::with_prefix("SPANGUARD").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        settings.get::<RunnerConfig>("spanner").map_err(|e| {
            ConfigError::Message(format!(
                "Spanner configuration could not be loaded from file or environment: {}",
                e
            ))
        })
    }

    pub fn database_path(&self) -> Result<DatabasePath, ConnectionError> {
        DatabasePath::new(&self.project_id, &self.instance_id, &self.database_id)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }
}
