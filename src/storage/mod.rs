//! Storage providers
//!
//! Every backend implements [`StorageProvider`]: upload, list, delete and
//! create-directory. Providers are built by a [`ProviderRegistry`] from a
//! connection string such as `azure://acct.blob.core.windows.net/container?sas`.

pub mod azure;
pub mod connection;
pub mod dropbox;
pub mod error;
pub mod local;
pub mod mock;
pub mod registry;

use chrono::{DateTime, Utc};
use std::time::Duration;

pub use connection::ConnectionDescriptor;
pub use error::{ConnectionError, RegistryError, StorageError};
pub use registry::{ProviderConstructor, ProviderRegistry};

/// Remote listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub path: String,
    pub modified: DateTime<Utc>,
}

impl BackupRecord {
    pub fn new(path: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }

    /// Final path component
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Capability set every storage backend provides
pub trait StorageProvider: Send + Sync {
    /// Registry name of this provider
    fn name(&self) -> &str;

    /// Write the full buffer to `remote_path`, replacing any existing object
    fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), StorageError>;

    /// Every object under `prefix` with its last-modified time, unfiltered
    fn list_backups(&self, prefix: &str) -> Result<Vec<BackupRecord>, StorageError>;

    /// Remove an object; a missing object counts as removed
    fn delete(&self, remote_path: &str) -> Result<(), StorageError>;

    /// Ensure a directory exists; flat namespaces succeed without doing anything
    fn create_directory(&self, path: &str) -> Result<(), StorageError>;
}

/// Settings handed to provider constructors
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Full connection string, merged in by the registry
    pub connection_string: Option<String>,
    /// Dropbox token used when the connection string carries none
    pub access_token: Option<String>,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            access_token: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ProviderConfig {
    /// Parse the merged connection string
    pub fn descriptor(&self) -> Result<ConnectionDescriptor, ConnectionError> {
        match self.connection_string.as_deref() {
            Some(s) => ConnectionDescriptor::parse(s),
            None => Err(ConnectionError::Missing),
        }
    }
}

/// Blocking HTTP client shared by the HTTP-backed providers
pub(crate) fn http_client(
    provider: &'static str,
    timeout: Duration,
) -> Result<reqwest::blocking::Client, ConnectionError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("lightning-backup/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConnectionError::Invalid(format!("Failed to create {} HTTP client: {}", provider, e)))
}
