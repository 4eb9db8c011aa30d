//! Configuration module for lightning-backup
//!
//! Settings are applied in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. TOML file passed with `--config`
//! 3. Environment variables (including a `.env` file loaded by the CLI)
//!
//! ## Example Usage
//!
//! ```no_run
//! use lightning_backup::config;
//!
//! let config = config::load_config(None)?;
//! let connection = config::resolve_connection_string(&config.storage)?;
//! println!("Backing up to {} under {}", connection, config.backup.backup_dir);
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    load_config, load_config_with, resolve_connection_string, resolve_system_id, ConfigError,
    Result, CREDENTIAL_NAME,
};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
