//! `DirectoryClient`: the contract the core consumes from the external
//! directory/metadata service (spec.md §6 "Directory service (consumed)").
//!
//! No implementation lives here — the directory itself is out of scope
//! (spec.md §1) — only the trait a real directory RPC client implements,
//! plus [`FakeDirectory`] for tests.

use crate::status::DataStatus;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("lease expired or not held for path: {0}")]
    LeaseExpired(String),

    #[error("directory service unreachable: {0}")]
    Unreachable(String),
}

/// Client refresh / lease / lifecycle operations a data-structure wrapper
/// needs from the directory.
pub trait DirectoryClient: Send + Sync {
    fn resolve(&self, path: &str) -> Result<DataStatus, DirectoryError>;
    fn renew(&self, path: &str) -> Result<(), DirectoryError>;
    fn close(&self, path: &str) -> Result<(), DirectoryError>;
    fn remove(&self, path: &str) -> Result<(), DirectoryError>;
}
