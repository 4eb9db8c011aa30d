//! Tests for the 'channel' command
//!
//! The channel command uploads channel.backup and prunes old copies.

use lightning_backup::config::{resolve_connection_string, Config};
use lightning_backup::storage::{ProviderConfig, ProviderRegistry, StorageProvider};
use lightning_backup::utils::BackupLock;
use std::fs;
use test_utils::{
    sample_channel_backup, BackupArtifact, BackupManager, BackupSettings, BackupTimestamp,
    ConfigBuilder, RecordingSleeper, ResultAssertions, TestContext,
};

fn provider_for(config: &Config) -> Box<dyn StorageProvider> {
    let connection = resolve_connection_string(&config.storage).assert_ok();
    ProviderRegistry::with_builtin_providers()
        .create_from_connection_string(&connection, &ProviderConfig::default())
        .assert_ok()
}

fn run_channel(config: &Config, timestamp: &str) {
    let provider = provider_for(config);
    let contents = fs::read(config.source.effective_channel_file()).unwrap();
    let artifact = BackupArtifact::channel(contents, BackupTimestamp::parse(timestamp).unwrap());

    let manager = BackupManager::with_sleeper(
        provider.as_ref(),
        BackupSettings::from_config(config),
        Box::new(RecordingSleeper::new()),
    );
    manager.run(&artifact).assert_ok();
}

#[test]
fn test_channel_backup_to_file_remote() {
    let ctx = TestContext::new();
    ctx.create_channel_backup(&sample_channel_backup());
    let config = ConfigBuilder::new(ctx.temp_dir()).build();

    run_channel(&config, "20240101-120000");

    assert_eq!(
        ctx.list_dir("remote/lightning-backups/test-node"),
        vec!["channel-backup-20240101-120000.backup", "channel-latest.backup"]
    );
    assert_eq!(
        ctx.read_file("remote/lightning-backups/test-node/channel-latest.backup").unwrap(),
        sample_channel_backup()
    );
    assert!(ctx.file_exists("local/channel-backup-20240101-120000.backup"));
}

#[test]
fn test_repeated_runs_respect_keep_last_n() {
    let ctx = TestContext::new();
    ctx.create_channel_backup(b"abc");
    let config = ConfigBuilder::new(ctx.temp_dir()).keep_last_n(2).build();

    for (i, stamp) in ["20240101-120000", "20240101-120001", "20240101-120002"]
        .iter()
        .enumerate()
    {
        run_channel(&config, stamp);
        // Distinct mtimes for the file provider listing
        if i < 2 {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
    }

    assert_eq!(
        ctx.list_dir("remote/lightning-backups/test-node"),
        vec![
            "channel-backup-20240101-120001.backup",
            "channel-backup-20240101-120002.backup",
            "channel-latest.backup",
        ]
    );
    assert_eq!(
        ctx.list_dir("local"),
        vec![
            "channel-backup-20240101-120001.backup",
            "channel-backup-20240101-120002.backup",
            "channel-latest.backup",
        ]
    );
}

#[test]
fn test_staged_file_takes_precedence() {
    let ctx = TestContext::new();
    ctx.create_channel_backup(b"live");
    let staged = ctx.create_file("staging/channel.backup", b"staged");
    let config = ConfigBuilder::new(ctx.temp_dir())
        .staged_backup_file(&staged)
        .build();

    run_channel(&config, "20240101-120000");

    assert_eq!(
        ctx.read_file("remote/lightning-backups/test-node/channel-latest.backup").unwrap(),
        b"staged"
    );
}

#[test]
fn test_system_id_partitions_remote() {
    let ctx = TestContext::new();
    ctx.create_channel_backup(b"abc");

    run_channel(&ConfigBuilder::new(ctx.temp_dir()).system_id("node-a").build(), "20240101-120000");
    run_channel(&ConfigBuilder::new(ctx.temp_dir()).system_id("node-b").build(), "20240101-120000");

    assert_eq!(ctx.list_dir("remote/lightning-backups"), vec!["node-a", "node-b"]);
}

#[test]
fn test_lock_blocks_overlapping_runs() {
    let ctx = TestContext::new();
    let config = ConfigBuilder::new(ctx.temp_dir()).build();

    let _held = BackupLock::acquire(&config.backup.lock_dir, "channel").assert_ok();
    BackupLock::acquire(&config.backup.lock_dir, "channel").assert_err_contains("already running");
}
