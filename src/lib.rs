//! Lightning Backup Library
//!
//! Uploads the LND static channel backup and the Taproot Assets database to a
//! pluggable storage provider, with retries and retention.

pub mod config;
pub mod managers;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, resolve_connection_string, Config};
pub use managers::backup::{
    ArtifactLayout, BackupArtifact, BackupError, BackupManager, BackupReport, BackupSettings,
    BackupTimestamp,
};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use storage::{ProviderConfig, ProviderRegistry, StorageError, StorageProvider};
