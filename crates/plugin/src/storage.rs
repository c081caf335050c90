use std::sync::Arc;
use stubdex_api::{FileId, FileKind, Result};

/// Durable key/value table underneath the primary stub store.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: FileId) -> Result<Option<Arc<[u8]>>>;
    fn put(&self, key: FileId, value: Arc<[u8]>) -> Result<()>;
    fn remove(&self, key: FileId) -> Result<()>;
    fn keys(&self) -> Result<Vec<FileId>>;
    fn clear(&self) -> Result<()>;
    fn flush(&self) -> Result<()>;
}

/// Persisted per-file-kind version stamps.
pub trait VersionStampStore: Send + Sync {
    fn read(&self, kind: &FileKind) -> Result<Option<u32>>;
    fn write(&self, kind: &FileKind, version: u32) -> Result<()>;
}
