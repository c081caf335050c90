use super::persist;
use crate::error::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use stubdex_api::FileId;
use stubdex_plugin::KvBackend;

pub const STUBS_FILE: &str = "stubs.bin";
const TABLE_FORMAT: u32 = 1;

/// Non-durable backend, used for in-memory engines and tests.
#[derive(Default)]
pub struct MemoryBackend {
    entries: DashMap<FileId, Arc<[u8]>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: FileId) -> Result<Option<Arc<[u8]>>> {
        Ok(self.entries.get(&key).map(|v| v.value().clone()))
    }

    fn put(&self, key: FileId, value: Arc<[u8]>) -> Result<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: FileId) -> Result<()> {
        self.entries.remove(&key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<FileId>> {
        let mut keys: Vec<FileId> = self.entries.iter().map(|e| *e.key()).collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StubTable {
    format: u32,
    entries: Vec<(u64, ByteBuf)>,
}

/// Durable backend: the whole table lives in memory and is written to
/// `stubs.bin` atomically on `flush`.
pub struct DiskBackend {
    path: PathBuf,
    entries: DashMap<FileId, Arc<[u8]>>,
    dirty: AtomicBool,
    reset: bool,
}

impl DiskBackend {
    /// Load `<dir>/stubs.bin`. An unreadable table is discarded; `was_reset`
    /// reports that so the owner can drop whatever was derived from it.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STUBS_FILE);
        let entries = DashMap::new();

        let reset = match persist::load_msgpack::<StubTable>(&path) {
            Ok(None) => false,
            Ok(Some(table)) if table.format == TABLE_FORMAT => {
                for (key, bytes) in table.entries {
                    entries.insert(FileId::new(key), Arc::from(bytes.into_vec()));
                }
                tracing::info!("Loaded {} stubs from {}", entries.len(), path.display());
                false
            }
            Ok(Some(table)) => {
                tracing::warn!(
                    "Stub table format mismatch at {} (found {}, expected {}). Will rebuild.",
                    path.display(),
                    table.format,
                    TABLE_FORMAT
                );
                persist::remove_if_exists(&path)?;
                true
            }
            Err(e) => {
                tracing::warn!("Failed to parse stub table: {}. Will rebuild.", e);
                persist::remove_if_exists(&path)?;
                true
            }
        };

        Ok(Self {
            path,
            entries,
            dirty: AtomicBool::new(false),
            reset,
        })
    }

    pub fn was_reset(&self) -> bool {
        self.reset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvBackend for DiskBackend {
    fn get(&self, key: FileId) -> Result<Option<Arc<[u8]>>> {
        Ok(self.entries.get(&key).map(|v| v.value().clone()))
    }

    fn put(&self, key: FileId, value: Arc<[u8]>) -> Result<()> {
        self.entries.insert(key, value);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: FileId) -> Result<()> {
        if self.entries.remove(&key).is_some() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<FileId>> {
        let mut keys: Vec<FileId> = self.entries.iter().map(|e| *e.key()).collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut entries: Vec<(u64, ByteBuf)> = self
            .entries
            .iter()
            .map(|e| (e.key().as_u64(), ByteBuf::from(e.value().to_vec())))
            .collect();
        entries.sort_unstable_by_key(|(key, _)| *key);

        let table = StubTable {
            format: TABLE_FORMAT,
            entries,
        };
        if let Err(e) = persist::save_msgpack(&self.path, &table) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        tracing::debug!("Saved {} stubs to {}", table.entries.len(), self.path.display());
        Ok(())
    }
}
