//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]     # listen address
//! [backend]    # which store to use
//! [sqlite]     # embedded store settings
//! [chroma]     # remote store settings
//! [logging]    # log level and optional JSON log directory
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SQLITE_PATH: &str = "/data/learnings.db";
pub const DEFAULT_CHROMA_URL: &str = "http://chroma:8000";
pub const DEFAULT_TENANT: &str = "default_tenant";
pub const DEFAULT_DATABASE: &str = "default_database";
pub const DEFAULT_COLLECTION: &str = "self_improvement";
pub const DEFAULT_OLLAMA_URL: &str = "http://ollama:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoreConfig {
    pub server: ServerConfig,
    pub backend: BackendSection,
    pub sqlite: SqliteConfig,
    pub chroma: ChromaSection,
    pub logging: LoggingConfig,
}

impl LoreConfig {
    /// Parse from a TOML string, fill blank remote-store names with their
    /// defaults, then validate.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let mut config: LoreConfig = toml::from_str(toml_str)?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        if self.chroma.tenant.trim().is_empty() {
            self.chroma.tenant = DEFAULT_TENANT.to_string();
        }
        if self.chroma.database.trim().is_empty() {
            self.chroma.database = DEFAULT_DATABASE.to_string();
        }
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        self.server.socket_addr()?;
        if self.chroma.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "chroma.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.backend.kind == BackendKind::Chroma && self.chroma.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "chroma.url is required when backend.type = \"chroma\"".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on. `:8080` is shorthand for all interfaces.
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
        }
    }
}

impl ServerConfig {
    /// Resolve `addr` into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = self.addr.trim();
        let full = if addr.starts_with(':') {
            format!("0.0.0.0{addr}")
        } else {
            addr.to_string()
        };
        full.parse()
            .map_err(|e| ConfigError::Invalid(format!("server.addr '{}': {e}", self.addr)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend selection
// ─────────────────────────────────────────────────────────────────────────────

/// `[backend]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    #[serde(rename = "type")]
    pub kind: BackendKind,
}

/// Storage backend kind. An empty string selects SQLite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Chroma,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Chroma => "chroma",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for BackendKind {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.trim() {
            "" | "sqlite" => Ok(Self::Sqlite),
            "chroma" => Ok(Self::Chroma),
            other => Err(format!(
                "unknown backend type '{other}' (must be 'sqlite' or 'chroma')"
            )),
        }
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.as_str().to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[sqlite]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file. Parent directories are created on open.
    pub path: PathBuf,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SQLITE_PATH),
        }
    }
}

/// `[chroma]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaSection {
    pub url: String,
    pub tenant: String,
    pub database: String,
    pub collection: String,
    /// Ollama model for embeddings. Empty leaves embedding to Chroma.
    pub embedding_model: String,
    pub ollama_url: String,
    /// Timeout for every outbound HTTP call, in seconds.
    pub timeout_secs: u64,
}

impl Default for ChromaSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHROMA_URL.to_string(),
            tenant: DEFAULT_TENANT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            embedding_model: String::new(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ChromaSection {
    /// The embedding model, if one is configured.
    pub fn embedding_model(&self) -> Option<&str> {
        Some(self.embedding_model.trim()).filter(|m| !m.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rotated JSON logs. Unset or empty disables file logging.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

impl LoggingConfig {
    /// The log directory, ignoring an empty setting.
    pub fn log_dir(&self) -> Option<&std::path::Path> {
        self.dir
            .as_deref()
            .filter(|d| !d.as_os_str().is_empty())
    }
}
