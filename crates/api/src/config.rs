//! Store configuration via `recmap.toml`
//!
//! One file selects the backend and carries the settings of both adapters.
//! Every field has a default, so an empty file opens an in-memory SQLite
//! store.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "recmap.toml";

/// Errors from loading configuration or opening a store from it
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("config file '{path}': {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`StoreConfig`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be serialized
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A setting holds a value outside its allowed set
    #[error("invalid {field} '{value}' in recmap.toml: expected {expected}")]
    Invalid {
        /// Setting name
        field: &'static str,
        /// Value found
        value: String,
        /// Allowed values
        expected: &'static str,
    },

    /// Valid setting this build cannot serve
    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    /// Opening the configured store failed
    #[error(transparent)]
    Store(#[from] recmap_core::Error),
}

/// Which adapter a [`StoreConfig`] selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Relational adapter
    Sql,
    /// Key-value hash adapter
    Hash,
}

/// Which hash client a [`HashConfig`] selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashClientKind {
    /// Process-local store
    Memory,
    /// Redis server
    Redis,
}

/// `[sql]` section
///
/// The bundled executor is SQLite. Other relational stores plug in through
/// [`recmap_sql::SqlExecutor`] and `SqlStore::new`, not through this file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SqlConfig {
    /// SQLite database path, or `":memory:"`
    #[serde(default = "default_datasource")]
    pub datasource: String,
    /// Create each record type's table on first use
    #[serde(default = "default_true")]
    pub create_tables: bool,
}

/// `[hash]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HashConfig {
    /// `"memory"` or `"redis"`
    #[serde(default = "default_client")]
    pub client: String,
    /// Redis `host:port` or URL
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Redis password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Connect timeout in seconds, 0 for none
    #[serde(default = "default_conn_timeout_secs")]
    pub conn_timeout_secs: u64,
    /// Redis connections opened up front; concurrent calls beyond this wait
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

/// Store configuration loaded from `recmap.toml`
///
/// # Example
///
/// ```toml
/// backend = "hash"
///
/// [hash]
/// client = "redis"
/// addr = "127.0.0.1:6379"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// `"sql"` or `"hash"`
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Relational adapter settings
    #[serde(default)]
    pub sql: SqlConfig,
    /// Hash adapter settings
    #[serde(default)]
    pub hash: HashConfig,
}

fn default_backend() -> String {
    "sql".to_string()
}

fn default_datasource() -> String {
    ":memory:".to_string()
}

fn default_true() -> bool {
    true
}

fn default_client() -> String {
    "memory".to_string()
}

fn default_addr() -> String {
    "127.0.0.1:6379".to_string()
}

fn default_conn_timeout_secs() -> u64 {
    5
}

fn default_pool_size() -> usize {
    10
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            datasource: default_datasource(),
            create_tables: default_true(),
        }
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            client: default_client(),
            addr: default_addr(),
            password: None,
            conn_timeout_secs: default_conn_timeout_secs(),
            pool_size: default_pool_size(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sql: SqlConfig::default(),
            hash: HashConfig::default(),
        }
    }
}

impl SqlConfig {
    /// Whether the datasource names a private in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.datasource == ":memory:"
    }
}

impl HashConfig {
    /// Parse the client string
    pub fn client_kind(&self) -> Result<HashClientKind, ConfigError> {
        match self.client.as_str() {
            "memory" => Ok(HashClientKind::Memory),
            "redis" => Ok(HashClientKind::Redis),
            other => Err(ConfigError::Invalid {
                field: "hash.client",
                value: other.to_string(),
                expected: "\"memory\" or \"redis\"",
            }),
        }
    }

    /// Connect timeout, `None` when disabled
    pub fn conn_timeout(&self) -> Option<Duration> {
        (self.conn_timeout_secs > 0).then(|| Duration::from_secs(self.conn_timeout_secs))
    }
}

impl StoreConfig {
    /// Parse the backend string
    pub fn backend_kind(&self) -> Result<BackendKind, ConfigError> {
        match self.backend.as_str() {
            "sql" => Ok(BackendKind::Sql),
            "hash" => Ok(BackendKind::Hash),
            other => Err(ConfigError::Invalid {
                field: "backend",
                value: other.to_string(),
                expected: "\"sql\" or \"hash\"",
            }),
        }
    }

    /// Check every enumerated setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend_kind()?;
        self.hash.client_kind()?;
        if self.hash.pool_size == 0 {
            return Err(ConfigError::Invalid {
                field: "hash.pool_size",
                value: "0".to_string(),
                expected: "at least 1",
            });
        }
        Ok(())
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# recmap store configuration
#
# Backend: "sql" (default) or "hash"
backend = "sql"

[sql]
# SQLite database file, or ":memory:" for a private in-memory database
datasource = ":memory:"
# Create each record type's table on first use
create_tables = true

[hash]
# Client: "memory" (default) or "redis" (needs the "redis" feature)
client = "memory"
addr = "127.0.0.1:6379"
# password = "secret"
# Connect timeout in seconds, 0 for none
conn_timeout_secs = 5
# Redis connections opened up front
pool_size = 10
"#
    }

    /// Parse and validate config text
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Write the default config file if it does not already exist
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to `path`
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
