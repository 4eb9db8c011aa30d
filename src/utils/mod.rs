pub mod archive;
pub mod backoff;
pub mod locker;

// Re-export commonly used types and traits (used by test crate)
pub use archive::{build_tapd_archive, render_checksums, ArchiveError, FileChecksum, TapdArchive};
pub use backoff::{backoff_delay, Sleeper, ThreadSleeper};
pub use locker::BackupLock;
