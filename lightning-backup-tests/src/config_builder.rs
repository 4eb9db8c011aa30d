//! Fluent API for building test configurations
//!
//! Every path points inside the given root, so runs never touch the real
//! `/var/backup/lnd` or `/tmp` lock files.

use lightning_backup::config::{
    BackupSettingsConfig, Config, LoggingSettings, SourceConfig, StorageConfig,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Builder for creating test configurations
pub struct ConfigBuilder {
    root: PathBuf,
    config: Config,
}

impl ConfigBuilder {
    /// Config rooted at `root` with a `file://{root}/remote` connection string
    pub fn new(root: &Path) -> Self {
        let remote = root.join("remote");
        fs::create_dir_all(&remote).expect("Failed to create remote dir");

        let config = Config {
            source: SourceConfig {
                channel_backup_path: root.join("lnd/channel.backup"),
                staged_backup_file: None,
                tapd_data_dir: root.join("tapd"),
            },
            backup: BackupSettingsConfig {
                backup_dir: "/lightning-backups".to_string(),
                local_backup_dir: root.join("local"),
                keep_last_n: 30,
                max_retries: 3,
                system_id: Some("test-node".to_string()),
                lock_dir: root.join("locks"),
            },
            storage: StorageConfig {
                connection_string: Some(format!("file://{}", remote.display())),
                ..StorageConfig::default()
            },
            logging: LoggingSettings::default(),
        };

        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    pub fn keep_last_n(mut self, keep: usize) -> Self {
        self.config.backup.keep_last_n = keep;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.backup.max_retries = retries;
        self
    }

    pub fn system_id(mut self, id: &str) -> Self {
        self.config.backup.system_id = Some(id.to_string());
        self
    }

    pub fn connection_string(mut self, connection: &str) -> Self {
        self.config.storage.connection_string = Some(connection.to_string());
        self
    }

    /// Drop the inline connection string and read it from a file instead
    pub fn connection_file(mut self, path: &Path) -> Self {
        self.config.storage.connection_string = None;
        self.config.storage.connection_file = Some(path.to_path_buf());
        self
    }

    pub fn provider(mut self, name: &str) -> Self {
        self.config.storage.provider = Some(name.to_string());
        self
    }

    pub fn staged_backup_file(mut self, path: &Path) -> Self {
        self.config.source.staged_backup_file = Some(path.to_path_buf());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }

    /// Write the config as TOML under the root and return its path
    pub fn write_toml(self) -> (Config, PathBuf) {
        let path = self.root.join("lightning-backup.toml");
        let contents = toml::to_string_pretty(&self.config).expect("Failed to serialize config");
        fs::write(&path, contents).expect("Failed to write config");
        (self.config, path)
    }
}
