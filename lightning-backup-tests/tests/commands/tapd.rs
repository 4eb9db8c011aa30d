//! Tests for the 'tapd' command
//!
//! The tapd command archives the database files, uploads the archive with a
//! checksum side-file and prunes old archives.

use flate2::read::GzDecoder;
use lightning_backup::config::resolve_connection_string;
use lightning_backup::storage::{ProviderConfig, ProviderRegistry};
use lightning_backup::utils::archive::{build_tapd_archive, sha256_hex, ArchiveError};
use std::io::Read;
use test_utils::{
    BackupArtifact, BackupManager, BackupSettings, BackupTimestamp, ConfigBuilder,
    RecordingSleeper, ResultAssertions, TestContext,
};

const REMOTE_DIR: &str = "remote/lightning-backups/test-node";

#[test]
fn test_tapd_backup_uploads_archive_and_checksums() {
    let ctx = TestContext::new();
    let data_dir = ctx.create_tapd_files(&[
        ("tapd.db", "sqlite main"),
        ("tapd.db-wal", "sqlite wal"),
        ("tapd.db-shm", "sqlite shm"),
    ]);
    let config = ConfigBuilder::new(ctx.temp_dir()).build();
    let connection = resolve_connection_string(&config.storage).assert_ok();
    let provider = ProviderRegistry::with_builtin_providers()
        .create_from_connection_string(&connection, &ProviderConfig::default())
        .assert_ok();

    let timestamp = BackupTimestamp::parse("20240101-120000").unwrap();
    let archive = build_tapd_archive(&data_dir, timestamp.as_str()).assert_ok();
    let artifact = BackupArtifact::tapd(archive, timestamp);

    BackupManager::with_sleeper(
        provider.as_ref(),
        BackupSettings::from_config(&config),
        Box::new(RecordingSleeper::new()),
    )
    .run(&artifact)
    .assert_ok();

    assert_eq!(
        ctx.list_dir(REMOTE_DIR),
        vec![
            "tapd-backup-20240101-120000.checksums",
            "tapd-backup-20240101-120000.tar.gz",
            "tapd-latest.tar.gz",
        ]
    );

    let checksums = String::from_utf8(
        ctx.read_file(&format!("{}/tapd-backup-20240101-120000.checksums", REMOTE_DIR))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(
        checksums,
        format!(
            "tapd.db: {}\ntapd.db-wal: {}\ntapd.db-shm: {}",
            sha256_hex(b"sqlite main"),
            sha256_hex(b"sqlite wal"),
            sha256_hex(b"sqlite shm")
        )
    );

    // Archive members match the checksums
    let bytes = ctx
        .read_file(&format!("{}/tapd-latest.tar.gz", REMOTE_DIR))
        .unwrap();
    let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
    let mut members = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().to_string();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        members.push(format!("{} {}", name, sha256_hex(&contents)));
    }
    assert_eq!(
        members,
        vec![
            format!("tapd-backup-20240101-120000/tapd.db {}", sha256_hex(b"sqlite main")),
            format!("tapd-backup-20240101-120000/tapd.db-wal {}", sha256_hex(b"sqlite wal")),
            format!("tapd-backup-20240101-120000/tapd.db-shm {}", sha256_hex(b"sqlite shm")),
        ]
    );

    assert!(ctx.file_exists("local/tapd/tapd-backup-20240101-120000.tar.gz"));
}

#[test]
fn test_tapd_dir_without_db_files_fails() {
    let ctx = TestContext::new();
    let data_dir = ctx.create_tapd_files(&[("tapd.conf", "conf")]);

    let result = build_tapd_archive(&data_dir, "20240101-120000");
    assert!(matches!(result, Err(ArchiveError::NoDatabaseFiles(_))));
}

#[test]
fn test_missing_wal_is_fine() {
    let ctx = TestContext::new();
    let data_dir = ctx.create_tapd_files(&[("tapd.db", "main only")]);

    let archive = build_tapd_archive(&data_dir, "20240101-120000").assert_ok();
    assert_eq!(archive.checksums.len(), 1);
    assert_eq!(archive.checksums[0].file_name, "tapd.db");
}
