//! Stub index engine.
//!
//! Owns the primary stub store, the secondary index set, the name table and
//! the registered stub builders, and keeps the secondary indices consistent
//! with the stored stubs as files change.

use crate::codec::InternedStubCodec;
use crate::config::{EngineConfig, LockScope};
use crate::error::{Result, StubIndexError};
use crate::index::StubIndexSet;
use crate::names::NameStorage;
use crate::storage::{DiskBackend, FileVersionStamps, MemoryBackend, MemoryVersionStamps, StubStorage};
use serde::Serialize;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use stubdex_api::{FileContent, FileId, FileKind, IndexDomain, OccurrenceList, StubTree};
use stubdex_plugin::{KvBackend, NameInterner, StubBuilder, StubCodec, VersionStampStore};

pub mod diff;
mod lifecycle;
mod update;
pub mod version;

pub use update::UpdateOutcome;
pub use version::{STUB_INDEX_VERSION, StaleStamp};

pub struct StubIndexEngine {
    config: EngineConfig,
    builders: BTreeMap<FileKind, Arc<dyn StubBuilder>>,
    versions: BTreeMap<FileKind, u32>,
    codec: Arc<dyn StubCodec>,
    names: Arc<NameStorage>,
    primary: StubStorage,
    indices: Arc<StubIndexSet>,
    stamps: Arc<dyn VersionStampStore>,
    pending_mismatch: Mutex<Option<StaleStamp>>,
    /// Name table generation the stored stubs were encoded against.
    names_generation: AtomicU64,
    disposed: AtomicBool,
}

pub struct StubIndexEngineBuilder {
    config: EngineConfig,
    builders: Vec<Arc<dyn StubBuilder>>,
    codec: Option<Arc<dyn StubCodec>>,
    backend: Option<Arc<dyn KvBackend>>,
    stamps: Option<Arc<dyn VersionStampStore>>,
}

impl StubIndexEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            builders: Vec::new(),
            codec: None,
            backend: None,
            stamps: None,
        }
    }

    pub fn with_stub_builder(mut self, builder: Arc<dyn StubBuilder>) -> Self {
        self.builders.push(builder);
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn StubCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Replace the primary backend the config would otherwise open.
    pub fn with_backend(mut self, backend: Arc<dyn KvBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_version_stamps(mut self, stamps: Arc<dyn VersionStampStore>) -> Self {
        self.stamps = Some(stamps);
        self
    }

    pub fn build(self) -> Result<StubIndexEngine> {
        let mut builders: BTreeMap<FileKind, Arc<dyn StubBuilder>> = BTreeMap::new();
        let mut domains: BTreeSet<IndexDomain> = self.config.domains.iter().cloned().collect();
        for builder in self.builders {
            domains.extend(builder.domains());
            if let Some(previous) = builders.insert(builder.kind(), builder) {
                tracing::warn!("Stub builder for {} registered twice; keeping the last", previous.kind());
            }
        }
        let versions = version::compute_version_map(builders.values());

        let mut reset = false;
        let (backend, names, indices, stamps): (
            Arc<dyn KvBackend>,
            NameStorage,
            StubIndexSet,
            Arc<dyn VersionStampStore>,
        ) = match &self.config.index_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let backend: Arc<dyn KvBackend> = match self.backend {
                    Some(backend) => backend,
                    None => {
                        let disk = DiskBackend::open(dir)?;
                        reset |= disk.was_reset();
                        Arc::new(disk)
                    }
                };
                let indices = StubIndexSet::open(dir, domains)?;
                reset |= indices.was_reset();
                let stamps = self
                    .stamps
                    .unwrap_or_else(|| Arc::new(FileVersionStamps::new(dir)) as Arc<dyn VersionStampStore>);
                (backend, NameStorage::open(dir), indices, stamps)
            }
            None => {
                let backend = self
                    .backend
                    .unwrap_or_else(|| Arc::new(MemoryBackend::new()) as Arc<dyn KvBackend>);
                let stamps = self
                    .stamps
                    .unwrap_or_else(|| Arc::new(MemoryVersionStamps::new()) as Arc<dyn VersionStampStore>);
                (
                    backend,
                    NameStorage::in_memory(),
                    StubIndexSet::in_memory(domains),
                    stamps,
                )
            }
        };

        if names.is_corrupted() {
            tracing::warn!("Name table is corrupted; stored stubs cannot be decoded");
            names.repair();
            reset = true;
        }

        let primary = if self.config.overlay {
            StubStorage::overlay(backend, self.config.buffering)
        } else {
            StubStorage::direct(backend)
        };

        let names_generation = names.generation();
        let engine = StubIndexEngine {
            config: self.config,
            builders,
            versions,
            codec: self
                .codec
                .unwrap_or_else(|| Arc::new(InternedStubCodec) as Arc<dyn StubCodec>),
            names: Arc::new(names),
            primary,
            indices: Arc::new(indices),
            stamps,
            pending_mismatch: Mutex::new(None),
            names_generation: AtomicU64::new(names_generation),
            disposed: AtomicBool::new(false),
        };

        engine.check_versions(reset)?;
        tracing::info!(
            "Stub index ready: {} builders, {} domains, version {}",
            engine.builders.len(),
            engine.indices.all_domains().count(),
            engine.index_version()
        );
        Ok(engine)
    }
}

/// Per-domain counts reported by `stats`.
#[derive(Debug, Clone, Serialize)]
pub struct DomainStats {
    pub domain: IndexDomain,
    pub values: usize,
    pub files: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub stubs: usize,
    pub names: usize,
    pub index_version: u32,
    pub buffering: bool,
    pub domains: Vec<DomainStats>,
}

impl StubIndexEngine {
    pub fn builder(config: EngineConfig) -> StubIndexEngineBuilder {
        StubIndexEngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lock_scope(&self) -> LockScope {
        self.config.lock_scope
    }

    pub fn domains(&self) -> impl Iterator<Item = &IndexDomain> {
        self.indices.all_domains()
    }

    pub fn indices(&self) -> &Arc<StubIndexSet> {
        &self.indices
    }

    pub fn names(&self) -> &Arc<NameStorage> {
        &self.names
    }

    /// Files contributing `value` to `domain`, sorted by file id.
    pub fn query(&self, domain: &IndexDomain, value: &str) -> Result<Vec<(FileId, OccurrenceList)>> {
        self.indices.query(domain, value)
    }

    pub fn values(&self, domain: &IndexDomain) -> Result<Vec<SmolStr>> {
        self.indices.values(domain)
    }

    /// Decoded stub currently stored for `file`.
    pub fn stub_for(&self, file: FileId) -> Result<Option<StubTree>> {
        let Some(value) = self.primary.get(file)? else {
            return Ok(None);
        };
        let tree = value.tree(self.codec.as_ref(), self.names.as_ref())?;
        Ok(Some(tree.clone()))
    }

    /// Files with a stored stub.
    pub fn files(&self) -> Result<Vec<FileId>> {
        self.primary.read()?.files()
    }

    pub fn buffering_enabled(&self) -> bool {
        self.primary.buffering_enabled()
    }

    pub fn stats(&self) -> Result<EngineStats> {
        let mut domains = Vec::new();
        for domain in self.indices.all_domains() {
            let guard = self.indices.read_lock(domain)?;
            domains.push(DomainStats {
                domain: domain.clone(),
                values: guard.values().len(),
                files: guard.file_count(),
            });
        }
        Ok(EngineStats {
            stubs: self.files()?.len(),
            names: self.names.len(),
            index_version: self.index_version(),
            buffering: self.buffering_enabled(),
            domains,
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for StubIndexEngine {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            tracing::error!("Failed to flush stub index on drop: {}", e);
        }
    }
}
