//! Shared name table for stub serialization.
//!
//! Ids are positions in a `lasso::ThreadedRodeo`. The table can be persisted
//! next to the index; a file whose checksum does not match its contents is
//! loaded as corrupted and must be repaired before any stub is touched.

use crate::error::Result;
use crate::storage::persist;
use lasso::{Key, Spur, ThreadedRodeo};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use stubdex_plugin::NameInterner;
use xxhash_rust::xxh3::xxh3_64;

pub const NAMES_FILE: &str = "names.bin";

#[derive(Serialize, Deserialize)]
struct NameFile {
    names: Vec<String>,
    checksum: u64,
}

fn checksum(names: &[String]) -> u64 {
    xxh3_64(names.join("\0").as_bytes())
}

pub struct NameStorage {
    rodeo: RwLock<Arc<ThreadedRodeo>>,
    /// Serializes interning of new names, repair and persistence.
    mutation: Mutex<()>,
    corrupted: AtomicBool,
    dirty: AtomicBool,
    generation: AtomicU64,
    path: Option<PathBuf>,
}

impl NameStorage {
    pub fn in_memory() -> Self {
        Self::with_rodeo(ThreadedRodeo::new(), None)
    }

    /// Load the table stored in `dir`, or start empty if there is none.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(NAMES_FILE);
        let loaded = persist::load_msgpack::<NameFile>(&path);

        let (rodeo, corrupted) = match loaded {
            Ok(None) => (ThreadedRodeo::new(), false),
            Ok(Some(file)) if checksum(&file.names) == file.checksum => {
                let rodeo = ThreadedRodeo::new();
                for name in &file.names {
                    rodeo.get_or_intern(name.as_str());
                }
                if rodeo.len() == file.names.len() {
                    tracing::debug!("Loaded {} names from {}", rodeo.len(), path.display());
                    (rodeo, false)
                } else {
                    tracing::warn!("Duplicate entries in name table {}", path.display());
                    (ThreadedRodeo::new(), true)
                }
            }
            Ok(Some(_)) => {
                tracing::warn!("Checksum mismatch in name table {}", path.display());
                (ThreadedRodeo::new(), true)
            }
            Err(e) => {
                tracing::warn!("Failed to read name table: {}", e);
                (ThreadedRodeo::new(), true)
            }
        };

        let storage = Self::with_rodeo(rodeo, Some(path));
        storage.corrupted.store(corrupted, Ordering::SeqCst);
        storage
    }

    fn with_rodeo(rodeo: ThreadedRodeo, path: Option<PathBuf>) -> Self {
        Self {
            rodeo: RwLock::new(Arc::new(rodeo)),
            mutation: Mutex::new(()),
            corrupted: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            path,
        }
    }

    fn current(&self) -> Arc<ThreadedRodeo> {
        match self.rodeo.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped by every repair; ids from an older generation are meaningless.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Persist the table if it changed since the last flush.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.mutation.lock().unwrap_or_else(|p| p.into_inner());
        if !self.dirty.load(Ordering::SeqCst) {
            return Ok(());
        }

        let rodeo = self.current();
        let mut names = Vec::with_capacity(rodeo.len());
        for idx in 0..rodeo.len() {
            let Some(spur) = Spur::try_from_usize(idx) else {
                break;
            };
            match rodeo.try_resolve(&spur) {
                Some(name) => names.push(name.to_string()),
                None => break,
            }
        }

        let file = NameFile {
            checksum: checksum(&names),
            names,
        };
        persist::save_msgpack(path, &file)?;
        self.dirty.store(false, Ordering::SeqCst);
        tracing::debug!("Saved {} names to {}", file.names.len(), path.display());
        Ok(())
    }
}

impl NameInterner for NameStorage {
    fn intern(&self, name: &str) -> u32 {
        let rodeo = self.current();
        if let Some(spur) = rodeo.get(name) {
            return spur.into_usize() as u32;
        }

        let _guard = self.mutation.lock().unwrap_or_else(|p| p.into_inner());
        // A repair may have swapped the table while we waited.
        let rodeo = self.current();
        let spur = rodeo.get_or_intern(name);
        self.dirty.store(true, Ordering::SeqCst);
        spur.into_usize() as u32
    }

    fn resolve(&self, id: u32) -> Option<SmolStr> {
        let spur = Spur::try_from_usize(id as usize)?;
        self.current().try_resolve(&spur).map(SmolStr::new)
    }

    fn is_corrupted(&self) -> bool {
        self.corrupted.load(Ordering::SeqCst)
    }

    fn mark_corrupted(&self, reason: &str) {
        if !self.corrupted.swap(true, Ordering::SeqCst) {
            tracing::error!("Name storage marked corrupted: {}", reason);
        }
    }

    fn repair(&self) {
        let _guard = self.mutation.lock().unwrap_or_else(|p| p.into_inner());
        match self.rodeo.write() {
            Ok(mut rodeo) => *rodeo = Arc::new(ThreadedRodeo::new()),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(ThreadedRodeo::new()),
        }
        if let Some(path) = &self.path {
            if let Err(e) = persist::remove_if_exists(path) {
                tracing::warn!("Failed to remove name table {}: {}", path.display(), e);
            }
        }
        self.dirty.store(false, Ordering::SeqCst);
        self.corrupted.store(false, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!("Name storage repaired (generation {})", generation);
    }
}
