use crate::models::FileKind;

#[derive(Debug, thiserror::Error)]
pub enum StubIndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Stub storage corrupted: {0}")]
    StorageCorrupted(String),
    #[error("Failed to deserialize stub tree: {0}")]
    Deserialize(String),
    #[error("Stub version mismatch for {kind}: expected {expected}, found {found:?}")]
    VersionMismatch {
        kind: FileKind,
        expected: u32,
        found: Option<u32>,
    },
    #[error("Unknown index domain: {0}")]
    UnknownDomain(String),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StubIndexError {
    /// Whether the caller has to rebuild the affected scope from scratch.
    pub fn requires_reindex(&self) -> bool {
        matches!(
            self,
            StubIndexError::StorageCorrupted(_) | StubIndexError::VersionMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StubIndexError>;
