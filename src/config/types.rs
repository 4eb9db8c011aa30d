use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub backup: BackupSettingsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where the artifacts come from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// LND static channel backup file
    #[serde(default = "default_channel_backup_path")]
    pub channel_backup_path: PathBuf,

    /// Copy of the channel backup staged by an external watcher; takes precedence
    #[serde(default)]
    pub staged_backup_file: Option<PathBuf>,

    /// Directory holding tapd.db and its WAL/SHM side files
    #[serde(default = "default_tapd_data_dir")]
    pub tapd_data_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            channel_backup_path: default_channel_backup_path(),
            staged_backup_file: None,
            tapd_data_dir: default_tapd_data_dir(),
        }
    }
}

impl SourceConfig {
    /// The file the channel command actually reads
    pub fn effective_channel_file(&self) -> &PathBuf {
        self.staged_backup_file
            .as_ref()
            .unwrap_or(&self.channel_backup_path)
    }
}

/// Remote layout, local mirror and retention
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupSettingsConfig {
    /// Root directory on the remote store
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    /// Local mirror directory
    #[serde(default = "default_local_backup_dir")]
    pub local_backup_dir: PathBuf,

    /// Timestamped backups kept both remotely and in the local mirror
    #[serde(default = "default_keep_last_n")]
    pub keep_last_n: usize,

    /// Upload attempts before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Namespace segment for this node; host name when unset
    #[serde(default)]
    pub system_id: Option<String>,

    /// Directory holding the per-artifact lock files
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,
}

impl Default for BackupSettingsConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            local_backup_dir: default_local_backup_dir(),
            keep_last_n: default_keep_last_n(),
            max_retries: default_max_retries(),
            system_id: None,
            lock_dir: default_lock_dir(),
        }
    }
}

/// Storage provider selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub connection_string: Option<String>,

    /// File holding the connection string
    #[serde(default)]
    pub connection_file: Option<PathBuf>,

    /// Explicit provider name, overrides the connection string scheme
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub dropbox_access_token: Option<String>,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            connection_file: None,
            provider: None,
            dropbox_access_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Daily-rotated log files go here when set
    #[serde(default)]
    pub log_directory: Option<PathBuf>,

    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_directory: None,
            log_max_files: default_log_max_files(),
        }
    }
}

// Default value functions

fn default_channel_backup_path() -> PathBuf {
    PathBuf::from("~/.lnd/data/chain/bitcoin/mainnet/channel.backup")
}
fn default_tapd_data_dir() -> PathBuf { PathBuf::from("~/.tapd/data/mainnet") }
fn default_backup_dir() -> String { "/lightning-backups".to_string() }
fn default_local_backup_dir() -> PathBuf { PathBuf::from("/var/backup/lnd") }
fn default_lock_dir() -> PathBuf {
    if cfg!(unix) { PathBuf::from("/tmp") } else { std::env::temp_dir() }
}
fn default_keep_last_n() -> usize { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_timeout_seconds() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
