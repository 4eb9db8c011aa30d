//! Backup manager - orchestrates one backup run
//!
//! A run mirrors the artifact locally, uploads it (timestamped object,
//! optional checksum side-file, latest pointer) with exponential backoff, then
//! prunes old remote backups.

use crate::config::{resolve_system_id, Config};
use crate::storage::{StorageError, StorageProvider};
use crate::utils::archive::{render_checksums, FileChecksum, TapdArchive};
use crate::utils::backoff::{backoff_delay, Sleeper, ThreadSleeper};
use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Backup aborted after {attempts} attempt(s): {source}")]
    NonRetryable { attempts: u32, source: StorageError },

    #[error("Backup failed after {attempts} attempt(s): {source}")]
    RetriesExhausted { attempts: u32, source: StorageError },

    #[error("Invalid backup timestamp '{0}' (expected YYYYMMDD-HHMMSS)")]
    InvalidTimestamp(String),
}

/// Naming scheme of one kind of artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub name: &'static str,
    pub extension: &'static str,
    /// Subdirectory of the local backup dir holding the mirror
    pub local_subdir: Option<&'static str>,
    pub has_checksums: bool,
}

impl ArtifactLayout {
    pub const CHANNEL: ArtifactLayout = ArtifactLayout {
        name: "channel",
        extension: "backup",
        local_subdir: None,
        has_checksums: false,
    };

    pub const TAPD: ArtifactLayout = ArtifactLayout {
        name: "tapd",
        extension: "tar.gz",
        local_subdir: Some("tapd"),
        has_checksums: true,
    };

    pub fn timestamped_name(&self, timestamp: &BackupTimestamp) -> String {
        format!("{}-backup-{}.{}", self.name, timestamp, self.extension)
    }

    pub fn latest_name(&self) -> String {
        format!("{}-latest.{}", self.name, self.extension)
    }

    pub fn checksums_name(&self, timestamp: &BackupTimestamp) -> String {
        format!("{}-backup-{}.checksums", self.name, timestamp)
    }

    /// Whether a file name is a timestamped backup of this layout
    pub fn matches_backup(&self, file_name: &str) -> bool {
        let prefix = format!("{}-backup-", self.name);
        let suffix = format!(".{}", self.extension);
        file_name.len() > prefix.len() + suffix.len()
            && file_name.starts_with(&prefix)
            && file_name.ends_with(&suffix)
    }

    /// Checksum side-file belonging to a timestamped backup path
    pub fn checksums_sibling(&self, backup_path: &str) -> Option<String> {
        if !self.has_checksums {
            return None;
        }
        backup_path
            .strip_suffix(&format!(".{}", self.extension))
            .map(|stem| format!("{}.checksums", stem))
    }
}

/// Second-resolution generation time, `YYYYMMDD-HHMMSS`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BackupTimestamp(String);

impl BackupTimestamp {
    /// Current local time
    pub fn now() -> Self {
        Self(Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn parse(value: &str) -> Result<Self, BackupError> {
        if value.len() != 15 || NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).is_err() {
            return Err(BackupError::InvalidTimestamp(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes to back up plus how to name them
#[derive(Debug, Clone)]
pub struct BackupArtifact {
    pub layout: ArtifactLayout,
    pub contents: Vec<u8>,
    pub timestamp: BackupTimestamp,
    pub checksums: Vec<FileChecksum>,
}

impl BackupArtifact {
    pub fn channel(contents: Vec<u8>, timestamp: BackupTimestamp) -> Self {
        Self {
            layout: ArtifactLayout::CHANNEL,
            contents,
            timestamp,
            checksums: Vec::new(),
        }
    }

    pub fn tapd(archive: TapdArchive, timestamp: BackupTimestamp) -> Self {
        Self {
            layout: ArtifactLayout::TAPD,
            contents: archive.bytes,
            timestamp,
            checksums: archive.checksums,
        }
    }

    fn checksums_contents(&self) -> Option<String> {
        if self.layout.has_checksums && !self.checksums.is_empty() {
            Some(render_checksums(&self.checksums))
        } else {
            None
        }
    }
}

/// Settings the orchestrator needs from the configuration
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub backup_root: String,
    pub system_id: String,
    pub local_backup_dir: PathBuf,
    pub keep_last_n: usize,
    pub max_retries: u32,
}

impl BackupSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backup_root: config.backup.backup_dir.clone(),
            system_id: resolve_system_id(&config.backup),
            local_backup_dir: config.backup.local_backup_dir.clone(),
            keep_last_n: config.backup.keep_last_n,
            max_retries: config.backup.max_retries,
        }
    }

    /// Remote directory holding this system's backups
    pub fn system_dir(&self) -> String {
        format!("{}/{}", self.backup_root.trim_end_matches('/'), self.system_id)
    }
}

/// Remote object paths for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePaths {
    pub system_dir: String,
    pub timestamped: String,
    pub latest: String,
    pub checksums: Option<String>,
}

impl RemotePaths {
    pub fn for_artifact(settings: &BackupSettings, artifact: &BackupArtifact) -> Self {
        let system_dir = settings.system_dir();
        let layout = &artifact.layout;
        Self {
            timestamped: format!("{}/{}", system_dir, layout.timestamped_name(&artifact.timestamp)),
            latest: format!("{}/{}", system_dir, layout.latest_name()),
            checksums: layout
                .has_checksums
                .then(|| format!("{}/{}", system_dir, layout.checksums_name(&artifact.timestamp))),
            system_dir,
        }
    }
}

/// Result of a retention pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionSummary {
    /// Matching backups before pruning
    pub found: usize,
    pub deleted: usize,
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub paths: RemotePaths,
    pub bytes: usize,
    pub attempts: u32,
    pub local_copy: Option<PathBuf>,
    pub retention: RetentionSummary,
    /// `min(retention.found, keep_last_n)`
    pub maintained: usize,
}

pub struct BackupManager<'a> {
    provider: &'a dyn StorageProvider,
    settings: BackupSettings,
    sleeper: Box<dyn Sleeper>,
}

impl<'a> BackupManager<'a> {
    pub fn new(provider: &'a dyn StorageProvider, settings: BackupSettings) -> Self {
        Self::with_sleeper(provider, settings, Box::new(ThreadSleeper))
    }

    /// Create backup manager with a specific sleeper (tests record delays)
    pub fn with_sleeper(
        provider: &'a dyn StorageProvider,
        settings: BackupSettings,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            provider,
            settings,
            sleeper,
        }
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    /// Mirror, upload with retries, then prune
    pub fn run(&self, artifact: &BackupArtifact) -> Result<BackupReport, BackupError> {
        let layout = artifact.layout;
        info!(
            "Starting {} backup {} ({} bytes) via {}",
            layout.name,
            artifact.timestamp,
            artifact.contents.len(),
            self.provider.name()
        );

        let local_copy = self.mirror_locally(artifact);
        let paths = RemotePaths::for_artifact(&self.settings, artifact);

        let attempts = self.upload_with_retries(artifact, &paths)?;
        info!(
            "Backup successful: {} bytes at {}",
            artifact.contents.len(),
            paths.timestamped
        );

        let retention = self.prune_remote(&layout);
        let maintained = retention.found.min(self.settings.keep_last_n);
        info!("Total {} backups maintained: {}", layout.name, maintained);

        Ok(BackupReport {
            paths,
            bytes: artifact.contents.len(),
            attempts,
            local_copy,
            retention,
            maintained,
        })
    }

    /// Retry loop around the upload unit; returns the number of attempts used
    fn upload_with_retries(
        &self,
        artifact: &BackupArtifact,
        paths: &RemotePaths,
    ) -> Result<u32, BackupError> {
        let max_retries = self.settings.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.upload_once(artifact, paths) {
                Ok(()) => return Ok(attempt),
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!("Non-retryable storage error: {}", err);
                return Err(BackupError::NonRetryable {
                    attempts: attempt,
                    source: err,
                });
            }

            warn!(
                "Upload attempt {}/{} failed: {}",
                attempt, max_retries, err
            );

            if attempt >= max_retries {
                return Err(BackupError::RetriesExhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = backoff_delay(attempt - 1);
            info!("Retrying in {} seconds...", delay.as_secs());
            self.sleeper.sleep(delay);
        }
    }

    /// One attempt: directory, timestamped object, checksums, latest pointer
    fn upload_once(&self, artifact: &BackupArtifact, paths: &RemotePaths) -> Result<(), StorageError> {
        self.provider.create_directory(&paths.system_dir)?;

        debug!("Uploading backup to {}", paths.timestamped);
        self.provider.upload(&artifact.contents, &paths.timestamped)?;

        if let (Some(path), Some(contents)) = (&paths.checksums, artifact.checksums_contents()) {
            self.provider.upload(contents.as_bytes(), path)?;
        }

        debug!("Updating latest backup at {}", paths.latest);
        self.provider.upload(&artifact.contents, &paths.latest)?;
        Ok(())
    }

    /// Delete remote backups beyond `keep_last_n`, newest kept
    ///
    /// Never fails: listing and deletion errors are logged.
    pub fn prune_remote(&self, layout: &ArtifactLayout) -> RetentionSummary {
        let system_dir = self.settings.system_dir();
        let records = match self.provider.list_backups(&system_dir) {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not list backups for cleanup: {}", e);
                return RetentionSummary::default();
            }
        };

        let mut backups: Vec<_> = records
            .into_iter()
            .filter(|r| layout.matches_backup(r.file_name()))
            .collect();
        backups.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.path.cmp(&a.path))
        });

        let mut summary = RetentionSummary {
            found: backups.len(),
            deleted: 0,
        };

        for old in backups.iter().skip(self.settings.keep_last_n) {
            match self.provider.delete(&old.path) {
                Ok(()) => {
                    info!("Deleted old backup: {}", old.file_name());
                    summary.deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to delete {}: {}", old.path, e);
                    continue;
                }
            }

            if let Some(sibling) = layout.checksums_sibling(&old.path) {
                if let Err(e) = self.provider.delete(&sibling) {
                    debug!("Failed to delete checksums {}: {}", sibling, e);
                }
            }
        }

        summary
    }

    /// Local copy under both names; failures are warnings only
    fn mirror_locally(&self, artifact: &BackupArtifact) -> Option<PathBuf> {
        let layout = &artifact.layout;
        let dir = match layout.local_subdir {
            Some(sub) => self.settings.local_backup_dir.join(sub),
            None => self.settings.local_backup_dir.clone(),
        };

        let write = || -> std::io::Result<PathBuf> {
            fs::create_dir_all(&dir)?;
            let timestamped = dir.join(layout.timestamped_name(&artifact.timestamp));
            fs::write(&timestamped, &artifact.contents)?;
            fs::write(dir.join(layout.latest_name()), &artifact.contents)?;
            if let Some(checksums) = artifact.checksums_contents() {
                fs::write(dir.join(layout.checksums_name(&artifact.timestamp)), checksums)?;
            }
            Ok(timestamped)
        };

        match write() {
            Ok(path) => {
                info!("Local backup saved: {:?}", path);
                prune_local(&dir, layout, self.settings.keep_last_n);
                Some(path)
            }
            Err(e) => {
                warn!("Local backup failed in {:?}: {}", dir, e);
                None
            }
        }
    }
}

/// Trim the local mirror to `keep_last_n` timestamped files (name order)
pub fn prune_local(dir: &Path, layout: &ArtifactLayout, keep_last_n: usize) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not read local backup dir {:?}: {}", dir, e);
            return 0;
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| layout.matches_backup(name))
        .collect();
    names.sort();

    let excess = names.len().saturating_sub(keep_last_n);
    let mut removed = 0;

    for name in names.iter().take(excess) {
        let path = dir.join(name);
        if let Err(e) = fs::remove_file(&path) {
            warn!("Failed to remove old local backup {:?}: {}", path, e);
            continue;
        }
        info!("Removed old local backup: {}", name);
        removed += 1;

        if let Some(sibling) = layout.checksums_sibling(name) {
            let sibling = dir.join(sibling);
            if let Err(e) = fs::remove_file(&sibling) {
                debug!("Failed to remove local checksums {:?}: {}", sibling, e);
            }
        }
    }

    removed
}
