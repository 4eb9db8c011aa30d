//! In-memory provider for tests
//! Available for use in external test crates

use super::{BackupRecord, StorageError, StorageProvider};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Recorded provider call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderCall {
    Upload { path: String, size: usize },
    List { prefix: String },
    Delete { path: String },
    CreateDirectory { path: String },
}

#[derive(Clone, Debug)]
struct StoredObject {
    contents: Vec<u8>,
    modified: DateTime<Utc>,
}

/// Mock provider keeping objects in memory
#[derive(Clone)]
pub struct MockProvider {
    /// Recorded calls
    pub calls: Arc<Mutex<Vec<ProviderCall>>>,
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
    /// Modification time given to the next upload; advances one second per upload
    clock: Arc<Mutex<DateTime<Utc>>>,
    /// Uploads that still have to fail before uploads succeed
    failing_uploads: Arc<Mutex<u32>>,
    always_fail_uploads: Arc<Mutex<bool>>,
    insufficient_space: Arc<Mutex<bool>>,
    fail_list: Arc<Mutex<bool>>,
    failing_deletes: Arc<Mutex<Vec<String>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            calls: Arc::default(),
            objects: Arc::default(),
            clock: Arc::new(Mutex::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            )),
            failing_uploads: Arc::default(),
            always_fail_uploads: Arc::default(),
            insufficient_space: Arc::default(),
            fail_list: Arc::default(),
            failing_deletes: Arc::default(),
        }
    }

    /// Pre-populate an object with a given modification time
    pub fn with_object(self, path: &str, modified: DateTime<Utc>) -> Self {
        self.objects.lock().unwrap().insert(
            path.to_string(),
            StoredObject {
                contents: Vec::new(),
                modified,
            },
        );
        self
    }

    /// Set the modification time of the next upload
    pub fn with_clock(self, now: DateTime<Utc>) -> Self {
        *self.clock.lock().unwrap() = now;
        self
    }

    /// Fail the next `count` uploads with a retryable error
    pub fn with_failing_uploads(self, count: u32) -> Self {
        *self.failing_uploads.lock().unwrap() = count;
        self
    }

    /// Fail every upload with a retryable error
    pub fn with_always_failing_uploads(self) -> Self {
        *self.always_fail_uploads.lock().unwrap() = true;
        self
    }

    /// Fail every upload with a non-retryable quota error
    pub fn with_insufficient_space(self) -> Self {
        *self.insufficient_space.lock().unwrap() = true;
        self
    }

    /// Fail listing
    pub fn with_failing_list(self) -> Self {
        *self.fail_list.lock().unwrap() = true;
        self
    }

    /// Fail deletion of one specific path
    pub fn with_failing_delete(self, path: &str) -> Self {
        self.failing_deletes.lock().unwrap().push(path.to_string());
        self
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of upload calls for a path
    pub fn upload_count(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, ProviderCall::Upload { path: p, .. } if p == path))
            .count()
    }

    /// Paths passed to delete, in call order
    pub fn deleted_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                ProviderCall::Delete { path } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Paths currently stored, sorted
    pub fn object_paths(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Contents of a stored object
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|o| o.contents.clone())
    }

    fn record_call(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl StorageProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), StorageError> {
        self.record_call(ProviderCall::Upload {
            path: remote_path.to_string(),
            size: contents.len(),
        });

        if *self.insufficient_space.lock().unwrap() {
            return Err(StorageError::InsufficientSpace {
                provider: "mock",
                message: "quota exceeded".to_string(),
            });
        }

        if *self.always_fail_uploads.lock().unwrap() {
            return Err(StorageError::Http {
                provider: "mock",
                status: 503,
                message: "Mock upload failure".to_string(),
            });
        }

        {
            let mut remaining = self.failing_uploads.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::Http {
                    provider: "mock",
                    status: 503,
                    message: "Mock transient upload failure".to_string(),
                });
            }
        }

        let mut clock = self.clock.lock().unwrap();
        self.objects.lock().unwrap().insert(
            remote_path.to_string(),
            StoredObject {
                contents: contents.to_vec(),
                modified: *clock,
            },
        );
        *clock += Duration::seconds(1);
        Ok(())
    }

    fn list_backups(&self, prefix: &str) -> Result<Vec<BackupRecord>, StorageError> {
        self.record_call(ProviderCall::List {
            prefix: prefix.to_string(),
        });

        if *self.fail_list.lock().unwrap() {
            return Err(StorageError::Http {
                provider: "mock",
                status: 500,
                message: "Mock list failure".to_string(),
            });
        }

        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, object)| BackupRecord::new(path.clone(), object.modified))
            .collect())
    }

    fn delete(&self, remote_path: &str) -> Result<(), StorageError> {
        self.record_call(ProviderCall::Delete {
            path: remote_path.to_string(),
        });

        if self
            .failing_deletes
            .lock()
            .unwrap()
            .iter()
            .any(|p| p == remote_path)
        {
            return Err(StorageError::Http {
                provider: "mock",
                status: 500,
                message: "Mock delete failure".to_string(),
            });
        }

        self.objects.lock().unwrap().remove(remote_path);
        Ok(())
    }

    fn create_directory(&self, path: &str) -> Result<(), StorageError> {
        self.record_call(ProviderCall::CreateDirectory {
            path: path.to_string(),
        });
        Ok(())
    }
}
