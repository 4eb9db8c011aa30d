//! Unit tests for configuration loading and precedence

use lightning_backup::config::{
    load_config_with, resolve_connection_string, resolve_system_id, ConfigError, CREDENTIAL_NAME,
};
use std::collections::HashMap;
use test_utils::{full_config_toml, ConfigBuilder, ResultAssertions, TestContext};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_toml_file_sections() {
    let ctx = TestContext::new();
    let path = ctx.create_file("config.toml", full_config_toml());

    let config = load_config_with(Some(path.as_path()), env(&[])).assert_ok();

    assert_eq!(config.backup.backup_dir, "/node-backups");
    assert_eq!(config.backup.keep_last_n, 14);
    assert_eq!(config.backup.max_retries, 5);
    assert_eq!(config.backup.system_id.as_deref(), Some("umbrel-01"));
    assert_eq!(config.storage.timeout_seconds, 30);
    assert_eq!(config.logging.log_level, "debug");
}

#[test]
fn test_environment_overrides_toml() {
    let ctx = TestContext::new();
    let path = ctx.create_file("config.toml", full_config_toml());

    let config = load_config_with(
        Some(path.as_path()),
        env(&[
            ("KEEP_LAST_N_BACKUPS", "7"),
            ("BACKUP_DIR", "/other"),
            ("SYSTEM_ID", "node-b"),
        ]),
    )
    .assert_ok();

    assert_eq!(config.backup.keep_last_n, 7);
    assert_eq!(config.backup.backup_dir, "/other");
    assert_eq!(config.backup.system_id.as_deref(), Some("node-b"));
    // Untouched keys keep their file value
    assert_eq!(config.backup.max_retries, 5);
}

#[test]
fn test_legacy_dropbox_backup_dir() {
    let config = load_config_with(None, env(&[("DROPBOX_BACKUP_DIR", "/legacy")])).assert_ok();
    assert_eq!(config.backup.backup_dir, "/legacy");

    let config = load_config_with(
        None,
        env(&[("DROPBOX_BACKUP_DIR", "/legacy"), ("BACKUP_DIR", "/current")]),
    )
    .assert_ok();
    assert_eq!(config.backup.backup_dir, "/current");
}

#[test]
fn test_zero_keep_last_n_rejected() {
    let result = load_config_with(None, env(&[("KEEP_LAST_N_BACKUPS", "0")]));
    assert!(matches!(result, Err(ConfigError::InvalidEnv { key: "KEEP_LAST_N_BACKUPS", .. })));

    let ctx = TestContext::new();
    let path = ctx.create_file("config.toml", "[backup]\nkeep_last_n = 0\n");
    let result = load_config_with(Some(path.as_path()), env(&[]));
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_credentials_directory_fallback() {
    let ctx = TestContext::new();
    let creds = ctx.create_subdir("credentials");
    ctx.create_file(
        &format!("credentials/{}", CREDENTIAL_NAME),
        "  file:///srv/backups\n",
    );

    let config = load_config_with(
        None,
        env(&[("CREDENTIALS_DIRECTORY", creds.to_str().unwrap())]),
    )
    .assert_ok();

    assert_eq!(
        resolve_connection_string(&config.storage).assert_ok(),
        "file:///srv/backups"
    );
}

#[test]
fn test_inline_connection_string_wins_over_credentials() {
    let ctx = TestContext::new();
    let creds = ctx.create_subdir("credentials");
    ctx.create_file(&format!("credentials/{}", CREDENTIAL_NAME), "file:///from/creds");

    let config = load_config_with(
        None,
        env(&[
            ("CREDENTIALS_DIRECTORY", creds.to_str().unwrap()),
            ("STORAGE_CONNECTION_STRING", "file:///from/env"),
        ]),
    )
    .assert_ok();

    assert_eq!(
        resolve_connection_string(&config.storage).assert_ok(),
        "file:///from/env"
    );
}

#[test]
fn test_missing_connection_string() {
    let config = load_config_with(None, env(&[])).assert_ok();
    resolve_connection_string(&config.storage).assert_err_contains("STORAGE_CONNECTION_STRING");
}

#[test]
fn test_builder_toml_loads_back() {
    let ctx = TestContext::new();
    let (config, path) = ConfigBuilder::new(ctx.temp_dir())
        .system_id("node-c")
        .max_retries(2)
        .write_toml();

    let loaded = load_config_with(Some(path.as_path()), env(&[])).assert_ok();
    assert_eq!(resolve_system_id(&loaded.backup), "node-c");
    assert_eq!(loaded.backup.max_retries, 2);
    assert_eq!(loaded.storage.connection_string, config.storage.connection_string);
}
