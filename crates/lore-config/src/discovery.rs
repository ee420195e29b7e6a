//! Config file discovery and loading.
//!
//! Resolution order (first hit wins):
//! 1. `--config` path given on the command line
//! 2. `CONFIG_FILE` environment variable
//! 3. `./config.toml`, `/config/config.toml`, `/etc/lore/config.toml`
//!
//! A resolved path that does not exist yields the defaults.

use std::path::{Path, PathBuf};

use crate::{ConfigError, LoreConfig, Result};

/// Environment variable naming the config file.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

/// Locations searched when no path is given.
pub const DEFAULT_LOCATIONS: [&str; 3] = ["config.toml", "/config/config.toml", "/etc/lore/config.toml"];

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The effective configuration.
    pub config: LoreConfig,
    /// File the configuration was read from; `None` means built-in defaults.
    pub source: Option<PathBuf>,
}

/// Find the config file to load, if any.
pub fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    let env = std::env::var(CONFIG_FILE_ENV).ok();
    let candidates: Vec<&Path> = DEFAULT_LOCATIONS.iter().map(Path::new).collect();
    resolve_config_path(explicit, env.as_deref(), &candidates)
}

/// Explicit path, then env value, then the first existing candidate.
/// Empty strings count as unset.
pub fn resolve_config_path(
    explicit: Option<&Path>,
    env: Option<&str>,
    candidates: &[&Path],
) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env.filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .map(|candidate| candidate.to_path_buf())
}

/// Discover and load the configuration.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    match discover_config_path(explicit) {
        Some(path) => {
            let exists = path.is_file();
            let config = load_config_file(&path)?;
            Ok(LoadedConfig {
                config,
                source: exists.then_some(path),
            })
        }
        None => Ok(LoadedConfig {
            config: LoreConfig::default(),
            source: None,
        }),
    }
}

/// Load config from a specific file path. A missing file yields the defaults.
pub fn load_config_file(path: &Path) -> Result<LoreConfig> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoreConfig::default()),
        Err(e) => {
            return Err(ConfigError::ReadFile {
                path: path.display().to_string(),
                source: e,
            });
        }
    };
    LoreConfig::from_toml(&contents)
}

/// A commented example configuration, printed by `--print-config`.
pub fn example_config() -> &'static str {
    r#"# lore configuration

[server]
addr = "0.0.0.0:8080"

[backend]
# "sqlite" or "chroma"
type = "sqlite"

[sqlite]
path = "/data/learnings.db"

[chroma]
url          = "http://chroma:8000"
tenant       = "default_tenant"
database     = "default_database"
collection   = "self_improvement"
timeout_secs = 30
# Optional: use ollama for real semantic embeddings
# embedding_model = "nomic-embed-text"
# ollama_url      = "http://ollama:11434"

[logging]
# Overridden by RUST_LOG when set
level = "info"
# Optional: write daily-rotated JSON logs to this directory
# dir = "/var/log/lore"
"#
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BackendKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[server]
addr = ":9000"

[sqlite]
path = "/tmp/lore.db"
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.server.socket_addr().unwrap().port(), 9000);
        assert_eq!(config.sqlite.path, PathBuf::from("/tmp/lore.db"));
    }

    #[test]
    fn test_load_config_file_not_found_is_default() {
        let config = load_config_file(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, LoreConfig::default());
    }

    #[test]
    fn test_load_config_file_unreadable() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be read as a file.
        let err = load_config_file(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_resolve_prefers_explicit_then_env() {
        let dir = TempDir::new().unwrap();
        let candidate = dir.path().join("config.toml");
        fs::write(&candidate, "").unwrap();
        let candidates = [candidate.as_path()];

        let explicit = Path::new("/opt/lore.toml");
        assert_eq!(
            resolve_config_path(Some(explicit), Some("/env.toml"), &candidates),
            Some(explicit.to_path_buf())
        );
        assert_eq!(
            resolve_config_path(None, Some("/env.toml"), &candidates),
            Some(PathBuf::from("/env.toml"))
        );
        assert_eq!(
            resolve_config_path(Some(Path::new("")), Some(""), &candidates),
            Some(candidate.clone())
        );
    }

    #[test]
    fn test_resolve_first_existing_candidate() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let second = dir.path().join("second.toml");
        let third = dir.path().join("third.toml");
        fs::write(&second, "").unwrap();
        fs::write(&third, "").unwrap();

        let candidates = [missing.as_path(), second.as_path(), third.as_path()];
        assert_eq!(resolve_config_path(None, None, &candidates), Some(second));
        assert_eq!(resolve_config_path(None, None, &[missing.as_path()]), None);
    }

    #[test]
    fn test_load_config_reports_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lore.toml");
        fs::write(&path, "[backend]\ntype = \"chroma\"").unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.backend.kind, BackendKind::Chroma);

        let loaded = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.config, LoreConfig::default());
    }

    #[test]
    fn test_example_config_parses_to_defaults() {
        let config = LoreConfig::from_toml(example_config()).unwrap();
        assert_eq!(config, LoreConfig::default());
    }
}
