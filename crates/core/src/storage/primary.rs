//! Primary stub table: file id -> serialized stub.
//!
//! `PrimaryStore` is either a direct view of the durable backend or an
//! in-memory overlay in front of it. Callers go through `StubStorage`, which
//! owns the single primary lock and a modification counter.

use crate::error::{Result, StubIndexError};
use crate::stub_value::StubValue;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use stubdex_api::FileId;
use stubdex_plugin::KvBackend;

fn read_backend(backend: &dyn KvBackend, file: FileId) -> Result<Option<StubValue>> {
    Ok(backend
        .get(file)?
        .map(|bytes| StubValue::from_bytes(file, bytes)))
}

/// Uncommitted edits in front of a backend.
///
/// `None` entries are tombstones for files whose stub was removed while
/// buffering. The overlay is only ever populated while buffering is on:
/// turning buffering off discards it.
pub struct OverlayStore {
    backend: Arc<dyn KvBackend>,
    overlay: HashMap<FileId, Option<StubValue>>,
    buffering: bool,
}

impl OverlayStore {
    pub fn new(backend: Arc<dyn KvBackend>, buffering: bool) -> Self {
        Self {
            backend,
            overlay: HashMap::new(),
            buffering,
        }
    }

    pub fn pending(&self) -> usize {
        self.overlay.len()
    }
}

pub enum PrimaryStore {
    Direct(Arc<dyn KvBackend>),
    Overlay(OverlayStore),
}

impl PrimaryStore {
    pub fn buffering_enabled(&self) -> bool {
        match self {
            PrimaryStore::Direct(_) => false,
            PrimaryStore::Overlay(store) => store.buffering,
        }
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        match self {
            PrimaryStore::Direct(backend) => backend,
            PrimaryStore::Overlay(store) => &store.backend,
        }
    }

    /// Current stub of `file`: the overlay while buffering, the backend otherwise.
    pub fn get(&self, file: FileId) -> Result<Option<StubValue>> {
        match self {
            PrimaryStore::Overlay(store) if store.buffering => match store.overlay.get(&file) {
                Some(entry) => Ok(entry.clone()),
                None => read_backend(store.backend.as_ref(), file),
            },
            PrimaryStore::Overlay(store) => read_backend(store.backend.as_ref(), file),
            PrimaryStore::Direct(backend) => read_backend(backend.as_ref(), file),
        }
    }

    /// Durable state only, ignoring any overlay.
    pub fn read_underlying(&self, file: FileId) -> Result<Option<StubValue>> {
        read_backend(self.backend().as_ref(), file)
    }

    pub fn files(&self) -> Result<Vec<FileId>> {
        let mut files: BTreeSet<FileId> = self.backend().keys()?.into_iter().collect();
        if let PrimaryStore::Overlay(store) = self {
            if store.buffering {
                for (file, entry) in &store.overlay {
                    if entry.is_some() {
                        files.insert(*file);
                    } else {
                        files.remove(file);
                    }
                }
            }
        }
        Ok(files.into_iter().collect())
    }

    fn put(&mut self, file: FileId, value: StubValue) -> Result<()> {
        match self {
            PrimaryStore::Overlay(store) if store.buffering => {
                store.overlay.insert(file, Some(value));
                Ok(())
            }
            PrimaryStore::Overlay(store) => store.backend.put(file, value.bytes().clone()),
            PrimaryStore::Direct(backend) => backend.put(file, value.bytes().clone()),
        }
    }

    fn remove(&mut self, file: FileId) -> Result<()> {
        match self {
            PrimaryStore::Overlay(store) if store.buffering => {
                store.overlay.insert(file, None);
                Ok(())
            }
            PrimaryStore::Overlay(store) => store.backend.remove(file),
            PrimaryStore::Direct(backend) => backend.remove(file),
        }
    }

    fn clear(&mut self) -> Result<()> {
        if let PrimaryStore::Overlay(store) = self {
            store.overlay.clear();
        }
        self.backend().clear()
    }

    /// Returns false for a direct store, which has nothing to buffer into.
    fn set_buffering(&mut self, enabled: bool) -> bool {
        match self {
            PrimaryStore::Direct(_) => false,
            PrimaryStore::Overlay(store) => {
                if !enabled {
                    store.overlay.clear();
                }
                store.buffering = enabled;
                true
            }
        }
    }

    fn clear_overlay(&mut self) -> usize {
        match self {
            PrimaryStore::Direct(_) => 0,
            PrimaryStore::Overlay(store) => {
                let dropped = store.overlay.len();
                store.overlay.clear();
                dropped
            }
        }
    }
}

pub struct StubStorage {
    store: RwLock<PrimaryStore>,
    version: AtomicU64,
}

impl StubStorage {
    pub fn new(store: PrimaryStore) -> Self {
        Self {
            store: RwLock::new(store),
            version: AtomicU64::new(0),
        }
    }

    pub fn direct(backend: Arc<dyn KvBackend>) -> Self {
        Self::new(PrimaryStore::Direct(backend))
    }

    pub fn overlay(backend: Arc<dyn KvBackend>, buffering: bool) -> Self {
        Self::new(PrimaryStore::Overlay(OverlayStore::new(backend, buffering)))
    }

    /// Bumped by every mutation that goes through a write guard.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, PrimaryStore>> {
        self.store
            .read()
            .map_err(|_| StubIndexError::LockPoisoned("primary stub store"))
    }

    pub fn write(&self) -> Result<PrimaryWriteGuard<'_>> {
        let store = self
            .store
            .write()
            .map_err(|_| StubIndexError::LockPoisoned("primary stub store"))?;
        Ok(PrimaryWriteGuard {
            store,
            version: &self.version,
        })
    }

    pub fn get(&self, file: FileId) -> Result<Option<StubValue>> {
        self.read()?.get(file)
    }

    pub fn read_underlying(&self, file: FileId) -> Result<Option<StubValue>> {
        self.read()?.read_underlying(file)
    }

    /// Reads through a poisoned lock; the flag itself is never left half-written.
    pub fn buffering_enabled(&self) -> bool {
        match self.store.read() {
            Ok(store) => store.buffering_enabled(),
            Err(poisoned) => {
                tracing::error!("Primary stub store lock poisoned; reading buffering state anyway");
                poisoned.into_inner().buffering_enabled()
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.read()?.backend().flush()
    }
}

/// Exclusive access to the primary table. Released on drop.
pub struct PrimaryWriteGuard<'a> {
    store: RwLockWriteGuard<'a, PrimaryStore>,
    version: &'a AtomicU64,
}

impl PrimaryWriteGuard<'_> {
    pub fn get(&self, file: FileId) -> Result<Option<StubValue>> {
        self.store.get(file)
    }

    pub fn read_underlying(&self, file: FileId) -> Result<Option<StubValue>> {
        self.store.read_underlying(file)
    }

    pub fn buffering_enabled(&self) -> bool {
        self.store.buffering_enabled()
    }

    pub fn put(&mut self, file: FileId, value: StubValue) -> Result<()> {
        self.store.put(file, value)?;
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn remove(&mut self, file: FileId) -> Result<()> {
        self.store.remove(file)?;
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.clear()?;
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn set_buffering(&mut self, enabled: bool) -> bool {
        let changed = self.store.set_buffering(enabled);
        if changed {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        changed
    }

    pub fn clear_overlay(&mut self) -> usize {
        let dropped = self.store.clear_overlay();
        if dropped > 0 {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::MemoryBackend;

    fn value(file: u64, raw: &[u8]) -> StubValue {
        StubValue::from_bytes(FileId::new(file), Arc::from(raw.to_vec()))
    }

    fn bytes_of(value: Option<StubValue>) -> Option<Vec<u8>> {
        value.map(|v| v.bytes().to_vec())
    }

    #[test]
    fn test_buffering_state_survives_poisoned_lock() {
        let storage = Arc::new(StubStorage::overlay(Arc::new(MemoryBackend::new()), true));
        let writer = storage.clone();
        let _ = std::thread::spawn(move || {
            let _guard = writer.write().unwrap();
            panic!("writer died holding the primary lock");
        })
        .join();

        assert!(storage.buffering_enabled());
        assert!(matches!(storage.read(), Err(StubIndexError::LockPoisoned(_))));
    }

    #[test]
    fn test_direct_store_reads_backend() {
        let storage = StubStorage::direct(Arc::new(MemoryBackend::new()));
        let file = FileId::new(1);
        {
            let mut guard = storage.write().unwrap();
            guard.put(file, value(1, b"a")).unwrap();
        }
        assert_eq!(bytes_of(storage.get(file).unwrap()), Some(b"a".to_vec()));
        assert_eq!(
            bytes_of(storage.get(file).unwrap()),
            bytes_of(storage.read_underlying(file).unwrap())
        );
        assert_eq!(storage.version(), 1);
    }

    #[test]
    fn test_overlay_shadows_backend_while_buffering() {
        let backend = Arc::new(MemoryBackend::new());
        let storage = StubStorage::overlay(backend.clone(), true);
        let file = FileId::new(3);
        backend.put(file, Arc::from(b"durable".to_vec())).unwrap();

        {
            let mut guard = storage.write().unwrap();
            guard.put(file, value(3, b"edited")).unwrap();
        }
        assert_eq!(bytes_of(storage.get(file).unwrap()), Some(b"edited".to_vec()));
        assert_eq!(
            bytes_of(storage.read_underlying(file).unwrap()),
            Some(b"durable".to_vec())
        );

        {
            let mut guard = storage.write().unwrap();
            guard.remove(file).unwrap();
        }
        assert!(storage.get(file).unwrap().is_none());
        assert!(storage.read_underlying(file).unwrap().is_some());
        assert!(storage.read().unwrap().files().unwrap().is_empty());
    }

    #[test]
    fn test_disabling_buffering_routes_to_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let storage = StubStorage::overlay(backend.clone(), true);
        let file = FileId::new(4);
        {
            let mut guard = storage.write().unwrap();
            guard.put(file, value(4, b"edited")).unwrap();
            assert!(guard.set_buffering(false));
        }
        assert!(!storage.buffering_enabled());
        assert!(storage.get(file).unwrap().is_none());

        {
            let mut guard = storage.write().unwrap();
            guard.put(file, value(4, b"saved")).unwrap();
        }
        assert_eq!(backend.get(file).unwrap().as_deref(), Some(&b"saved"[..]));
        assert_eq!(
            bytes_of(storage.get(file).unwrap()),
            bytes_of(storage.read_underlying(file).unwrap())
        );
    }

    #[test]
    fn test_clear_overlay_keeps_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let storage = StubStorage::overlay(backend.clone(), true);
        backend.put(FileId::new(1), Arc::from(b"base".to_vec())).unwrap();
        {
            let mut guard = storage.write().unwrap();
            guard.put(FileId::new(2), value(2, b"new")).unwrap();
            assert_eq!(guard.clear_overlay(), 1);
        }
        assert_eq!(storage.read().unwrap().files().unwrap(), vec![FileId::new(1)]);
    }

    #[test]
    fn test_direct_store_cannot_buffer() {
        let storage = StubStorage::direct(Arc::new(MemoryBackend::new()));
        let mut guard = storage.write().unwrap();
        assert!(!guard.set_buffering(true));
        assert!(!guard.buffering_enabled());
    }
}
