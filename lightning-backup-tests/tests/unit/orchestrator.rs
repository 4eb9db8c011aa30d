//! Unit tests for the retry loop and run reporting

use rstest::rstest;
use test_utils::{
    mock_with_channel_backups, sample_channel_backup, BackupArtifact, BackupError, BackupManager,
    BackupSettings, BackupTimestamp, MockProvider, ProviderCall, RecordingSleeper, TestContext,
    TEST_SYSTEM_DIR,
};

fn settings(ctx: &TestContext, keep_last_n: usize, max_retries: u32) -> BackupSettings {
    BackupSettings {
        backup_root: "/lightning-backups".to_string(),
        system_id: "test-node".to_string(),
        local_backup_dir: ctx.local_dir(),
        keep_last_n,
        max_retries,
    }
}

fn artifact() -> BackupArtifact {
    BackupArtifact::channel(
        sample_channel_backup(),
        BackupTimestamp::parse("20240101-120000").unwrap(),
    )
}

fn timestamped_path() -> String {
    format!("{}/channel-backup-20240101-120000.backup", TEST_SYSTEM_DIR)
}

#[rstest]
#[case(0, vec![])]
#[case(1, vec![1])]
#[case(3, vec![1, 2, 4])]
fn test_transient_failures_then_success(#[case] failures: u32, #[case] delays: Vec<u64>) {
    let ctx = TestContext::new();
    let mock = MockProvider::new().with_failing_uploads(failures);
    let sleeper = RecordingSleeper::new();
    let manager =
        BackupManager::with_sleeper(&mock, settings(&ctx, 30, 5), Box::new(sleeper.clone()));

    let report = manager.run(&artifact()).unwrap();

    assert_eq!(report.attempts, failures + 1);
    assert_eq!(mock.upload_count(&timestamped_path()), failures as usize + 1);
    assert_eq!(sleeper.delays_secs(), delays);
}

#[rstest]
#[case(1, vec![])]
#[case(3, vec![1, 2])]
#[case(4, vec![1, 2, 4])]
fn test_exhaustion_makes_exactly_max_attempts(#[case] max_retries: u32, #[case] delays: Vec<u64>) {
    let ctx = TestContext::new();
    let mock = MockProvider::new().with_always_failing_uploads();
    let sleeper = RecordingSleeper::new();
    let manager = BackupManager::with_sleeper(
        &mock,
        settings(&ctx, 30, max_retries),
        Box::new(sleeper.clone()),
    );

    let err = manager.run(&artifact()).unwrap_err();

    assert!(matches!(err, BackupError::RetriesExhausted { attempts, .. } if attempts == max_retries));
    assert_eq!(mock.upload_count(&timestamped_path()), max_retries as usize);
    assert_eq!(sleeper.delays_secs(), delays);

    // The local mirror survives a failed upload
    assert!(ctx.file_exists("local/channel-backup-20240101-120000.backup"));
    assert!(ctx.file_exists("local/channel-latest.backup"));
}

#[test]
fn test_non_retryable_error_is_single_attempt() {
    let ctx = TestContext::new();
    let mock = MockProvider::new().with_insufficient_space();
    let sleeper = RecordingSleeper::new();
    let manager =
        BackupManager::with_sleeper(&mock, settings(&ctx, 30, 3), Box::new(sleeper.clone()));

    let err = manager.run(&artifact()).unwrap_err();

    assert!(matches!(err, BackupError::NonRetryable { attempts: 1, .. }));
    assert_eq!(mock.upload_count(&timestamped_path()), 1);
    assert!(sleeper.delays_secs().is_empty());
    assert!(mock.deleted_paths().is_empty());
}

#[test]
fn test_attempt_order() {
    let ctx = TestContext::new();
    let mock = MockProvider::new();
    let manager = BackupManager::with_sleeper(
        &mock,
        settings(&ctx, 30, 3),
        Box::new(RecordingSleeper::new()),
    );

    manager.run(&artifact()).unwrap();

    let size = sample_channel_backup().len();
    assert_eq!(
        mock.get_calls(),
        vec![
            ProviderCall::CreateDirectory {
                path: TEST_SYSTEM_DIR.to_string()
            },
            ProviderCall::Upload {
                path: timestamped_path(),
                size
            },
            ProviderCall::Upload {
                path: format!("{}/channel-latest.backup", TEST_SYSTEM_DIR),
                size
            },
            ProviderCall::List {
                prefix: TEST_SYSTEM_DIR.to_string()
            },
        ]
    );
}

#[test]
fn test_maintained_is_capped_by_keep_last_n() {
    let ctx = TestContext::new();
    let mock = mock_with_channel_backups(6);
    let manager = BackupManager::with_sleeper(
        &mock,
        settings(&ctx, 4, 3),
        Box::new(RecordingSleeper::new()),
    );

    let report = manager.run(&artifact()).unwrap();

    assert_eq!(report.retention.found, 7);
    assert_eq!(report.retention.deleted, 3);
    assert_eq!(report.maintained, 4);
}

#[test]
fn test_local_mirror_is_trimmed() {
    let ctx = TestContext::new();
    for day in 1..=3 {
        ctx.create_file(
            &format!("local/channel-backup-2023120{}-120000.backup", day),
            b"old",
        );
    }

    let mock = MockProvider::new();
    let manager = BackupManager::with_sleeper(
        &mock,
        settings(&ctx, 2, 3),
        Box::new(RecordingSleeper::new()),
    );
    manager.run(&artifact()).unwrap();

    assert_eq!(
        ctx.list_dir("local"),
        vec![
            "channel-backup-20231203-120000.backup",
            "channel-backup-20240101-120000.backup",
            "channel-latest.backup",
        ]
    );
}
