//! Test utilities for lightning-backup
//!
//! This crate provides shared test utilities, fixtures and helper functions
//! for testing the lightning-backup application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::new();
//!     let config = ConfigBuilder::new(ctx.temp_dir())
//!         .keep_last_n(2)
//!         .build();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{OptionAssertions, ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use lightning_backup::config::{
    BackupSettingsConfig, Config, LoggingSettings, SourceConfig, StorageConfig,
};
pub use lightning_backup::managers::backup::{
    ArtifactLayout, BackupArtifact, BackupError, BackupManager, BackupSettings, BackupTimestamp,
};
pub use lightning_backup::storage::{BackupRecord, StorageError, StorageProvider};

// Re-export mock implementations from the main crate
pub use lightning_backup::storage::mock::{MockProvider, ProviderCall};
pub use lightning_backup::utils::backoff::mock::RecordingSleeper;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
