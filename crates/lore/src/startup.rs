//! Turning the loaded configuration into runtime settings.

use std::time::Duration;

use lore_config::{BackendKind, LoreConfig};
use lore_store::{BackendConfig, ChromaConfig};

/// Build the backend selection from the `[backend]`, `[sqlite]` and
/// `[chroma]` sections.
pub fn backend_config(config: &LoreConfig) -> BackendConfig {
    match config.backend.kind {
        BackendKind::Sqlite => BackendConfig::Sqlite {
            path: config.sqlite.path.clone(),
        },
        BackendKind::Chroma => {
            let chroma = &config.chroma;
            BackendConfig::Chroma(ChromaConfig {
                url: chroma.url.clone(),
                tenant: chroma.tenant.clone(),
                database: chroma.database.clone(),
                collection: chroma.collection.clone(),
                embedding_model: chroma.embedding_model().map(str::to_string),
                ollama_url: chroma.ollama_url.clone(),
                timeout: Duration::from_secs(chroma.timeout_secs),
            })
        }
    }
}

/// Filter directive for the console and file layers.
///
/// `RUST_LOG` wins over the config file; `--verbose` wins over both.
pub fn log_filter(configured: &str, rust_log: Option<&str>, verbose: bool) -> String {
    if verbose {
        return "lore=debug,lore_server=debug,lore_mcp=debug,lore_store=debug,lore_config=debug,tower_http=debug,info".to_string();
    }
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directive) => directive.to_string(),
        None if configured.trim().is_empty() => "info".to_string(),
        None => configured.trim().to_string(),
    }
}
