use std::io;

use thiserror::Error;

/// Failures reported by a [`RecordStore`](super::record_store::RecordStore).
///
/// Identity-carrying variants hold the `collection/key` string. I/O variants
/// keep the underlying error as their source for logging; callers map them to
/// their own user-facing errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid record identity: {0}")]
    InvalidKey(String),
    #[error("record already exists: {0}")]
    AlreadyExists(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("failed to open record for update: {0}")]
    Open(#[source] io::Error),
    #[error("failed to read record: {0}")]
    Read(#[source] io::Error),
    #[error("failed to write record: {0}")]
    Write(#[source] io::Error),
    #[error("failed to delete record: {0}")]
    Delete(#[source] io::Error),
    #[error("failed to serialize document: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("stored document is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Stable numeric code for logging
    pub fn code(&self) -> u16 {
        match self {
            StoreError::InvalidKey(_) => 2001,
            StoreError::AlreadyExists(_) => 2002,
            StoreError::NotFound(_) => 2003,
            StoreError::Open(_) => 2101,
            StoreError::Read(_) => 2102,
            StoreError::Write(_) => 2103,
            StoreError::Delete(_) => 2104,
            StoreError::Serialize(_) => 2201,
            StoreError::Corrupt(_) => 2202,
        }
    }
}
