//! Directory-backed provider (`file:///srv/lightning-backups`)
//!
//! Useful for NFS/SMB mounts or a second local disk.

use super::{BackupRecord, ConnectionError, ProviderConfig, StorageError, StorageProvider};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PROVIDER_NAME: &str = "file";

pub struct LocalProvider {
    root: PathBuf,
}

pub(crate) fn construct(
    config: &ProviderConfig,
) -> Result<Box<dyn StorageProvider>, ConnectionError> {
    Ok(Box::new(LocalProvider::from_config(config)?))
}

impl LocalProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConnectionError> {
        let descriptor = config.descriptor()?;

        if descriptor.scheme() != PROVIDER_NAME {
            return Err(ConnectionError::WrongScheme {
                expected: PROVIDER_NAME,
            });
        }
        if let Some(host) = descriptor.host() {
            return Err(ConnectionError::InvalidHost {
                provider: PROVIDER_NAME,
                host: host.to_string(),
                reason: "file connection strings take no host (use file:///path)",
            });
        }

        let root = descriptor
            .to_file_path()
            .filter(|p| p.is_absolute() && p.parent().is_some())
            .ok_or_else(|| {
                ConnectionError::Invalid("file connection string needs an absolute directory".to_string())
            })?;

        Ok(Self::new(root))
    }

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remote paths are interpreted relative to the root
    fn resolve(&self, remote_path: &str) -> PathBuf {
        let relative = remote_path.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }
}

impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), StorageError> {
        let target = self.resolve(remote_path);
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent).map_err(|e| StorageError::io(&parent, e))?;

        // Rename into place so a crash never leaves a truncated object at the final path
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let partial = parent.join(format!(".{}.partial", file_name));

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&partial)?;
            file.write_all(contents)?;
            file.sync_all()?;
            fs::rename(&partial, &target)
        };

        if let Err(e) = write() {
            warn!("File upload to {:?} failed: {}", target, e);
            let _ = fs::remove_file(&partial);
            return Err(StorageError::io(&target, e));
        }

        debug!("Wrote {} bytes to {:?}", contents.len(), target);
        Ok(())
    }

    fn list_backups(&self, prefix: &str) -> Result<Vec<BackupRecord>, StorageError> {
        let dir = self.resolve(prefix);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                warn!("File list error for {:?}: {}", dir, e);
                return Err(StorageError::io(&dir, e));
            }
        };

        let prefix = prefix.trim_end_matches('/');
        let mut records = Vec::new();

        for entry in entries.filter_map(|e| e.ok()) {
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".partial") {
                continue;
            }
            let modified = metadata
                .modified()
                .map_err(|e| StorageError::io(entry.path(), e))?;

            records.push(BackupRecord::new(
                format!("{}/{}", prefix, name),
                DateTime::<Utc>::from(modified),
            ));
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    fn delete(&self, remote_path: &str) -> Result<(), StorageError> {
        let target = self.resolve(remote_path);
        match fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("File {:?} not found for deletion", target);
                Ok(())
            }
            Err(e) => {
                warn!("File delete error for {:?}: {}", target, e);
                Err(StorageError::io(&target, e))
            }
        }
    }

    fn create_directory(&self, path: &str) -> Result<(), StorageError> {
        let dir = self.resolve(path);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))
    }
}
