//! Unit tests for the directory-backed provider

use lightning_backup::storage::local::LocalProvider;
use lightning_backup::storage::{ProviderConfig, StorageProvider};
use std::fs;
use test_utils::{ResultAssertions, TestContext};

fn provider(ctx: &TestContext) -> LocalProvider {
    LocalProvider::from_config(&ProviderConfig {
        connection_string: Some(ctx.file_connection_string()),
        ..ProviderConfig::default()
    })
    .assert_ok()
}

#[test]
fn test_upload_leaves_no_partial_files() {
    let ctx = TestContext::new();
    let provider = provider(&ctx);

    provider
        .upload(b"channel state", "/lightning-backups/node/channel-latest.backup")
        .assert_ok();

    assert_eq!(
        ctx.list_dir("remote/lightning-backups/node"),
        vec!["channel-latest.backup"]
    );
}

#[test]
fn test_list_skips_directories_and_partials() {
    let ctx = TestContext::new();
    let provider = provider(&ctx);
    ctx.create_file("remote/backups/node/channel-backup-20240101-120000.backup", b"a");
    ctx.create_file("remote/backups/node/.channel-latest.backup.partial", b"b");
    ctx.create_subdir("remote/backups/node/tapd");

    let records = provider.list_backups("/backups/node").assert_ok();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_name(), "channel-backup-20240101-120000.backup");
    assert_eq!(
        records[0].path,
        "/backups/node/channel-backup-20240101-120000.backup"
    );
}

#[test]
fn test_listed_paths_can_be_deleted() {
    let ctx = TestContext::new();
    let provider = provider(&ctx);
    provider.upload(b"x", "/backups/node/a.backup").assert_ok();
    provider.upload(b"y", "/backups/node/b.backup").assert_ok();

    for record in provider.list_backups("/backups/node").assert_ok() {
        provider.delete(&record.path).assert_ok();
    }

    assert!(ctx.list_dir("remote/backups/node").is_empty());
    // A second delete of the same path is still a success
    provider.delete("/backups/node/a.backup").assert_ok();
}

#[test]
fn test_relative_root_rejected() {
    let result = LocalProvider::from_config(&ProviderConfig {
        connection_string: Some("file:relative/dir".to_string()),
        ..ProviderConfig::default()
    });
    result.assert_err();
}

#[test]
fn test_create_directory_is_idempotent() {
    let ctx = TestContext::new();
    let provider = provider(&ctx);
    provider.create_directory("/backups/node").assert_ok();
    provider.create_directory("/backups/node").assert_ok();
    assert!(fs::metadata(ctx.temp_dir().join("remote/backups/node")).unwrap().is_dir());
}
