//! Error types for storage providers and the provider registry

use std::path::PathBuf;

/// Failure of a single remote operation
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{provider} request failed with status {status}: {message}")]
    Http {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} transport error: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    /// Quota or space exhausted; retrying cannot help
    #[error("Insufficient space in {provider} storage: {message}")]
    InsufficientSpace {
        provider: &'static str,
        message: String,
    },
}

impl StorageError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StorageError::InsufficientSpace { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::StorageFull {
            return StorageError::InsufficientSpace {
                provider: "file",
                message: source.to_string(),
            };
        }
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Malformed or unsupported connection descriptor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection string is required")]
    Missing,

    #[error("Connection string must look like scheme://host/path, got '{0}'")]
    Malformed(String),

    #[error("Connection string must not contain {0}")]
    Ambiguous(&'static str),

    #[error("Connection string must start with '{expected}://'")]
    WrongScheme { expected: &'static str },

    #[error("Invalid {provider} host '{host}': {reason}")]
    InvalidHost {
        provider: &'static str,
        host: String,
        reason: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Failure to resolve or build a provider
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown provider '{name}'. Available: {}", .available.join(", "))]
    UnknownProvider {
        name: String,
        available: Vec<String>,
    },

    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
