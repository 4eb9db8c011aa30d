use super::types::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the systemd credential holding the connection string
pub const CREDENTIAL_NAME: &str = "storage.connection";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidEnv {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Failed to read connection string from {path:?}: {source}")]
    CredentialReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("STORAGE_CONNECTION_STRING environment variable or credential file is required")]
    MissingConnectionString,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load configuration from an optional TOML file, then apply the process environment
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Load configuration using an explicit environment lookup
pub fn load_config_with<F>(path: Option<&Path>, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, &env)?;
    normalize_system_id(&mut config);
    expand_paths(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Read a variable, treating empty or whitespace-only values as unset
fn lookup<F>(env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_positive<F, T>(env: &F, key: &'static str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    match lookup(env, key) {
        None => Ok(None),
        Some(raw) => match raw.parse::<T>() {
            Ok(value) if value > T::default() => Ok(Some(value)),
            _ => Err(ConfigError::InvalidEnv {
                key,
                value: raw,
                reason: "expected a positive integer",
            }),
        },
    }
}

/// Apply environment variables on top of file/default values
fn apply_env_overrides<F>(config: &mut Config, env: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(env, "LND_CHANNEL_BACKUP_PATH") {
        config.source.channel_backup_path = PathBuf::from(v);
    }
    if let Some(v) = lookup(env, "STAGED_BACKUP_FILE") {
        config.source.staged_backup_file = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup(env, "TAPD_DATA_DIR") {
        config.source.tapd_data_dir = PathBuf::from(v);
    }

    // BACKUP_DIR wins over the older Dropbox-specific name
    if let Some(v) = lookup(env, "BACKUP_DIR").or_else(|| lookup(env, "DROPBOX_BACKUP_DIR")) {
        config.backup.backup_dir = v;
    }
    if let Some(v) = lookup(env, "LOCAL_BACKUP_DIR") {
        config.backup.local_backup_dir = PathBuf::from(v);
    }
    if let Some(v) = parse_positive::<_, usize>(env, "KEEP_LAST_N_BACKUPS")? {
        config.backup.keep_last_n = v;
    }
    if let Some(v) = parse_positive::<_, u32>(env, "MAX_RETRIES")? {
        config.backup.max_retries = v;
    }
    if let Some(v) = lookup(env, "SYSTEM_ID") {
        config.backup.system_id = Some(v);
    }
    if let Some(v) = lookup(env, "LOCK_DIR") {
        config.backup.lock_dir = PathBuf::from(v);
    }

    if let Some(v) = lookup(env, "STORAGE_CONNECTION_STRING") {
        config.storage.connection_string = Some(v);
    }
    if let Some(v) = lookup(env, "STORAGE_CONNECTION_FILE") {
        config.storage.connection_file = Some(PathBuf::from(v));
    }
    if config.storage.connection_string.is_none() && config.storage.connection_file.is_none() {
        if let Some(dir) = lookup(env, "CREDENTIALS_DIRECTORY") {
            let candidate = Path::new(&dir).join(CREDENTIAL_NAME);
            if candidate.exists() {
                config.storage.connection_file = Some(candidate);
            }
        }
    }
    if let Some(v) = lookup(env, "STORAGE_PROVIDER") {
        config.storage.provider = Some(v);
    }
    if let Some(v) = lookup(env, "DROPBOX_ACCESS_TOKEN") {
        config.storage.dropbox_access_token = Some(v);
    }
    if let Some(v) = parse_positive::<_, u64>(env, "STORAGE_TIMEOUT_SECONDS")? {
        config.storage.timeout_seconds = v;
    }

    if let Some(v) = lookup(env, "LOG_LEVEL") {
        config.logging.log_level = v;
    }
    if let Some(v) = lookup(env, "LOG_DIRECTORY") {
        config.logging.log_directory = Some(PathBuf::from(v));
    }

    Ok(())
}

/// A blank `system_id` from the file counts as unset, like a blank `SYSTEM_ID`
fn normalize_system_id(config: &mut Config) {
    config.backup.system_id = config
        .backup
        .system_id
        .take()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
}

fn expand_paths(config: &mut Config) {
    use super::expand_tilde;

    config.source.channel_backup_path = expand_tilde(&config.source.channel_backup_path);
    config.source.staged_backup_file = config
        .source
        .staged_backup_file
        .as_deref()
        .map(expand_tilde);
    config.source.tapd_data_dir = expand_tilde(&config.source.tapd_data_dir);
    config.backup.local_backup_dir = expand_tilde(&config.backup.local_backup_dir);
    config.backup.lock_dir = expand_tilde(&config.backup.lock_dir);
    config.storage.connection_file = config.storage.connection_file.as_deref().map(expand_tilde);
    config.logging.log_directory = config.logging.log_directory.as_deref().map(expand_tilde);
}

/// Validate the configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.backup.keep_last_n == 0 {
        return Err(ConfigError::ValidationError(
            "keep_last_n must be greater than zero".to_string(),
        ));
    }

    if config.backup.max_retries == 0 {
        return Err(ConfigError::ValidationError(
            "max_retries must be greater than zero".to_string(),
        ));
    }

    if config.backup.backup_dir.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "backup_dir must not be empty".to_string(),
        ));
    }

    if let Some(ref id) = config.backup.system_id {
        if id.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "system_id must not contain '/': {}",
                id
            )));
        }
    }

    Ok(())
}

/// Resolve the connection string: inline value first, then the credential file
pub fn resolve_connection_string(storage: &StorageConfig) -> Result<String> {
    if let Some(ref value) = storage.connection_string {
        let value = value.trim();
        if !value.is_empty() {
            return Ok(value.to_string());
        }
    }

    if let Some(ref path) = storage.connection_file {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::CredentialReadError {
            path: path.clone(),
            source,
        })?;
        let value = contents.trim();
        if !value.is_empty() {
            return Ok(value.to_string());
        }
    }

    Err(ConfigError::MissingConnectionString)
}

/// System identifier, falling back to the host name
pub fn resolve_system_id(backup: &BackupSettingsConfig) -> String {
    if let Some(id) = backup.system_id.as_deref().map(str::trim) {
        if !id.is_empty() {
            return id.to_string();
        }
    }

    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "default".to_string())
}
