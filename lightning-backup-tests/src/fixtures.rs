//! Test fixtures and sample data

use chrono::{DateTime, Duration, TimeZone, Utc};
use lightning_backup::storage::mock::MockProvider;

/// Remote directory used by `ConfigBuilder` configs
pub const TEST_SYSTEM_DIR: &str = "/lightning-backups/test-node";

/// Fixed reference instant (2024-01-01 12:00:00 UTC)
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// Timestamp string for `days` days before the reference instant
pub fn timestamp_days_ago(days: i64) -> String {
    (reference_time() - Duration::days(days))
        .format("%Y%m%d-%H%M%S")
        .to_string()
}

/// Mock provider holding `count` channel backups, one per day before the reference
pub fn mock_with_channel_backups(count: usize) -> MockProvider {
    (1..=count as i64).fold(MockProvider::new(), |mock, days| {
        mock.with_object(
            &format!(
                "{}/channel-backup-{}.backup",
                TEST_SYSTEM_DIR,
                timestamp_days_ago(days)
            ),
            reference_time() - Duration::days(days),
        )
    })
}

/// Sample channel.backup payload
pub fn sample_channel_backup() -> Vec<u8> {
    b"\x00lnd-static-channel-backup\x01\x02\x03".to_vec()
}

/// Sample TOML exercising every section
pub fn full_config_toml() -> &'static str {
    r#"
[source]
channel_backup_path = "/home/lnd/.lnd/data/chain/bitcoin/mainnet/channel.backup"
tapd_data_dir = "/home/lnd/.tapd/data/mainnet"

[backup]
backup_dir = "/node-backups"
local_backup_dir = "/var/backup/lnd"
keep_last_n = 14
max_retries = 5
system_id = "umbrel-01"

[storage]
connection_string = "dropbox://dropbox.com"
dropbox_access_token = "sl.token"
timeout_seconds = 30

[logging]
log_level = "debug"
"#
}
