//! In-memory [`DirectoryClient`] for tests — stands in for the real
//! directory/metadata service, which is out of scope (spec.md §1).

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::client::{DirectoryClient, DirectoryError};
use crate::status::DataStatus;

/// A directory that serves whatever `DataStatus` values it was seeded
/// with and tracks `renew`/`close`/`remove` calls for assertions.
#[derive(Default)]
pub struct FakeDirectory {
    entries: Mutex<HashMap<String, DataStatus>>,
    renewed: Mutex<Vec<String>>,
    closed: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, path: impl Into<String>, status: DataStatus) {
        self.entries.lock().insert(path.into(), status);
    }

    pub fn renewed_paths(&self) -> Vec<String> {
        self.renewed.lock().clone()
    }

    pub fn closed_paths(&self) -> Vec<String> {
        self.closed.lock().clone()
    }

    pub fn removed_paths(&self) -> Vec<String> {
        self.removed.lock().clone()
    }
}

impl DirectoryClient for FakeDirectory {
    fn resolve(&self, path: &str) -> Result<DataStatus, DirectoryError> {
        self.entries
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(path.to_string()))
    }

    fn renew(&self, path: &str) -> Result<(), DirectoryError> {
        if !self.entries.lock().contains_key(path) {
            return Err(DirectoryError::NotFound(path.to_string()));
        }
        self.renewed.lock().push(path.to_string());
        Ok(())
    }

    fn close(&self, path: &str) -> Result<(), DirectoryError> {
        if !self.entries.lock().contains_key(path) {
            return Err(DirectoryError::NotFound(path.to_string()));
        }
        self.closed.lock().push(path.to_string());
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), DirectoryError> {
        let removed = self.entries.lock().remove(path);
        if removed.is_none() {
            return Err(DirectoryError::NotFound(path.to_string()));
        }
        self.removed.lock().push(path.to_string());
        Ok(())
    }
}
