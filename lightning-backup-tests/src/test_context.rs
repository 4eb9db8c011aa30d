//! Test context and harness
//!
//! Provides a unified context for setting up and tearing down test environments.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test context owning a temporary directory with the usual layout:
/// `lnd/` for the channel file, `tapd/` for the database, `remote/` for a
/// `file://` provider, `local/` for the mirror and `locks/`.
pub struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    /// Create a new test context with a temporary directory
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory used as the `file://` remote
    pub fn remote_dir(&self) -> PathBuf {
        self.create_subdir("remote")
    }

    /// Connection string pointing at `remote_dir`
    pub fn file_connection_string(&self) -> String {
        format!("file://{}", self.remote_dir().display())
    }

    pub fn local_dir(&self) -> PathBuf {
        self.temp_dir.path().join("local")
    }

    /// Create a subdirectory in the temp dir
    pub fn create_subdir(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::create_dir_all(&path).expect("Failed to create subdirectory");
        path
    }

    /// Create a file in the temp dir
    pub fn create_file(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Write a channel.backup under `lnd/`
    pub fn create_channel_backup(&self, content: &[u8]) -> PathBuf {
        self.create_file("lnd/channel.backup", content)
    }

    /// Write tapd database files under `tapd/`
    pub fn create_tapd_files(&self, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.create_subdir("tapd");
        for (name, content) in files {
            std::fs::write(dir.join(name), content).expect("Failed to write tapd file");
        }
        dir
    }

    /// Check if a file exists in the temp directory
    pub fn file_exists(&self, name: &str) -> bool {
        self.temp_dir.path().join(name).exists()
    }

    /// Read a file from the temp directory
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.temp_dir.path().join(name))?)
    }

    /// Sorted file names in a subdirectory (empty when missing)
    pub fn list_dir(&self, name: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.temp_dir.path().join(name))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Err
    fn assert_err(self);

    /// Assert that the result is Err and the error message contains the given string
    fn assert_err_contains(self, needle: &str);
}

impl<T, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_err(self) {
        if self.is_ok() {
            panic!("Expected Err, got Ok");
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(_) => panic!("Expected Err containing '{}', got Ok", needle),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Error '{}' does not contain '{}'",
                    err_msg,
                    needle
                );
            }
        }
    }
}

/// Extension trait for Option assertions
pub trait OptionAssertions<T> {
    /// Assert that the option is Some and return the value
    fn assert_some(self) -> T;

    /// Assert that the option is None
    fn assert_none(self);
}

impl<T: std::fmt::Debug> OptionAssertions<T> for Option<T> {
    fn assert_some(self) -> T {
        match self {
            Some(v) => v,
            None => panic!("Expected Some, got None"),
        }
    }

    fn assert_none(self) {
        if let Some(v) = self {
            panic!("Expected None, got Some: {:?}", v);
        }
    }
}
