//! Configuration for the Lore server.
//!
//! A single optional TOML file with `[server]`, `[backend]`, `[sqlite]`,
//! `[chroma]` and `[logging]` sections. Every field has a default, so an
//! absent file or an empty one is a valid configuration.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    CONFIG_FILE_ENV, LoadedConfig, discover_config_path, example_config, load_config,
    load_config_file, resolve_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
