//! Command tests for lightning-backup
//!
//! These tests drive the channel, tapd and validate flows through the library
//! with a `file://` remote inside a temp dir.

mod channel;
mod providers;
mod tapd;
mod validate;
