//! The fixed set of secondary indices, one per `IndexDomain`.
//!
//! Every domain sits behind its own `RwLock`. Multi-domain work goes through
//! `DomainLockSet`, which always acquires in ascending domain order and
//! releases in reverse, so two writers can never wait on each other in a cycle.

use super::domain::{DOMAIN_FORMAT, DomainFile, DomainState};
use crate::error::{Result, StubIndexError};
use crate::storage::persist;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use stubdex_api::{FileId, IndexDomain, OccurrenceList};

const DOMAIN_EXT: &str = "sidx";

struct DomainSlot {
    state: RwLock<DomainState>,
    path: Option<PathBuf>,
}

pub struct StubIndexSet {
    domains: BTreeMap<IndexDomain, DomainSlot>,
    reset: bool,
    disposed: AtomicBool,
}

impl StubIndexSet {
    pub fn in_memory(domains: impl IntoIterator<Item = IndexDomain>) -> Self {
        let domains = domains
            .into_iter()
            .map(|domain| {
                let slot = DomainSlot {
                    state: RwLock::new(DomainState::default()),
                    path: None,
                };
                (domain, slot)
            })
            .collect();
        Self {
            domains,
            reset: false,
            disposed: AtomicBool::new(false),
        }
    }

    /// Load every domain from `<dir>/<domain>.sidx`. A missing file starts
    /// empty; an unreadable one is dropped and reported through `was_reset`.
    pub fn open(dir: &Path, domains: impl IntoIterator<Item = IndexDomain>) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut reset = false;
        let mut slots = BTreeMap::new();

        for domain in domains {
            let path = dir.join(format!("{}.{}", domain.file_stem(), DOMAIN_EXT));
            let state = match persist::load_msgpack::<DomainFile>(&path) {
                Ok(None) => DomainState::default(),
                Ok(Some(file)) if file.format == DOMAIN_FORMAT && file.domain == domain.as_str() => {
                    DomainState::from_entries(file.entries)
                }
                Ok(Some(_)) => {
                    tracing::warn!(
                        "Index for domain {} has an incompatible layout. Will rebuild.",
                        domain
                    );
                    persist::remove_if_exists(&path)?;
                    reset = true;
                    DomainState::default()
                }
                Err(e) => {
                    tracing::warn!("Failed to load index for domain {}: {}. Will rebuild.", domain, e);
                    persist::remove_if_exists(&path)?;
                    reset = true;
                    DomainState::default()
                }
            };
            let slot = DomainSlot {
                state: RwLock::new(state),
                path: Some(path),
            };
            slots.insert(domain, slot);
        }

        Ok(Self {
            domains: slots,
            reset,
            disposed: AtomicBool::new(false),
        })
    }

    pub fn was_reset(&self) -> bool {
        self.reset
    }

    /// Domains in ascending order.
    pub fn all_domains(&self) -> impl Iterator<Item = &IndexDomain> {
        self.domains.keys()
    }

    pub fn contains(&self, domain: &IndexDomain) -> bool {
        self.domains.contains_key(domain)
    }

    fn slot(&self, domain: &IndexDomain) -> Result<&DomainSlot> {
        self.domains
            .get(domain)
            .ok_or_else(|| StubIndexError::UnknownDomain(domain.to_string()))
    }

    pub fn read_lock(&self, domain: &IndexDomain) -> Result<DomainReadGuard<'_>> {
        let slot = self.slot(domain)?;
        let state = slot
            .state
            .read()
            .map_err(|_| StubIndexError::LockPoisoned("secondary index"))?;
        Ok(DomainReadGuard { state })
    }

    pub fn write_lock(&self, domain: &IndexDomain) -> Result<DomainWriteGuard<'_>> {
        let (domain, slot) = self
            .domains
            .get_key_value(domain)
            .ok_or_else(|| StubIndexError::UnknownDomain(domain.to_string()))?;
        let state = slot
            .state
            .write()
            .map_err(|_| StubIndexError::LockPoisoned("secondary index"))?;
        Ok(DomainWriteGuard { domain, state })
    }

    /// Write-lock every domain.
    pub fn lock_all(&self) -> Result<DomainLockSet<'_>> {
        let mut set = DomainLockSet {
            guards: Vec::with_capacity(self.domains.len()),
            complete: true,
        };
        for domain in self.domains.keys() {
            set.guards.push(self.write_lock(domain)?);
        }
        Ok(set)
    }

    /// Write-lock the named domains. Unknown domains are skipped.
    pub fn lock_domains<'d>(
        &self,
        domains: impl IntoIterator<Item = &'d IndexDomain>,
    ) -> Result<DomainLockSet<'_>> {
        let wanted: BTreeSet<&IndexDomain> = domains
            .into_iter()
            .filter(|d| self.domains.contains_key(*d))
            .collect();
        let complete = wanted.len() == self.domains.len();
        let mut set = DomainLockSet {
            guards: Vec::with_capacity(wanted.len()),
            complete,
        };
        for domain in wanted {
            set.guards.push(self.write_lock(domain)?);
        }
        Ok(set)
    }

    /// Files contributing `value` to `domain`, sorted by file id.
    pub fn query(&self, domain: &IndexDomain, value: &str) -> Result<Vec<(FileId, OccurrenceList)>> {
        Ok(self.read_lock(domain)?.lookup(value))
    }

    pub fn values(&self, domain: &IndexDomain) -> Result<Vec<SmolStr>> {
        Ok(self.read_lock(domain)?.values())
    }

    pub fn file_count(&self, domain: &IndexDomain) -> Result<usize> {
        Ok(self.read_lock(domain)?.file_count())
    }

    /// Write the domain's committed entries if they changed since the last flush.
    pub fn flush(&self, domain: &IndexDomain) -> Result<()> {
        let slot = self.slot(domain)?;
        let Some(path) = &slot.path else {
            return Ok(());
        };
        let mut state = slot
            .state
            .write()
            .map_err(|_| StubIndexError::LockPoisoned("secondary index"))?;
        if !state.is_dirty() {
            return Ok(());
        }

        let file = DomainFile {
            format: DOMAIN_FORMAT,
            domain: domain.as_str().to_string(),
            entries: state.base().clone(),
        };
        persist::save_msgpack(path, &file)?;
        state.mark_clean();
        tracing::debug!("Saved {} values for domain {}", file.entries.len(), domain);
        Ok(())
    }

    /// Flush every domain, attempting all of them. Returns the first failure.
    pub fn flush_all(&self) -> Result<()> {
        let mut first_err = None;
        for domain in self.domains.keys() {
            if let Err(e) = self.flush(domain) {
                tracing::error!("Failed to flush domain {}: {}", domain, e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Flush once and mark disposed. Later calls are no-ops.
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.flush_all()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

pub struct DomainReadGuard<'a> {
    state: RwLockReadGuard<'a, DomainState>,
}

impl DomainReadGuard<'_> {
    pub fn lookup(&self, value: &str) -> Vec<(FileId, OccurrenceList)> {
        self.state.lookup(value)
    }

    pub fn values(&self) -> Vec<SmolStr> {
        self.state.values()
    }

    pub fn values_of(&self, file: FileId) -> Vec<SmolStr> {
        self.state.values_of(file)
    }

    pub fn file_count(&self) -> usize {
        self.state.file_count()
    }

    pub fn buffering(&self) -> bool {
        self.state.buffering()
    }
}

pub struct DomainWriteGuard<'a> {
    domain: &'a IndexDomain,
    state: RwLockWriteGuard<'a, DomainState>,
}

impl DomainWriteGuard<'_> {
    pub fn domain(&self) -> &IndexDomain {
        self.domain
    }

    pub fn apply_delta(
        &mut self,
        file: FileId,
        removed: &BTreeMap<SmolStr, OccurrenceList>,
        added: &BTreeMap<SmolStr, OccurrenceList>,
    ) {
        self.state.apply_delta(file, removed, added);
    }

    pub fn lookup(&self, value: &str) -> Vec<(FileId, OccurrenceList)> {
        self.state.lookup(value)
    }

    pub fn clear(&mut self) {
        self.state.clear();
    }

    pub fn set_buffering(&mut self, enabled: bool) {
        self.state.set_buffering(enabled);
    }

    pub fn cleanup_overlay(&mut self) {
        self.state.cleanup_overlay();
    }
}

/// Write guards over several domains, held in ascending domain order.
pub struct DomainLockSet<'a> {
    guards: Vec<DomainWriteGuard<'a>>,
    complete: bool,
}

impl<'a> DomainLockSet<'a> {
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Whether every domain of the set is held.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn domains(&self) -> impl Iterator<Item = &IndexDomain> {
        self.guards.iter().map(|g| g.domain)
    }

    pub fn holds(&self, domain: &IndexDomain) -> bool {
        self.guards
            .binary_search_by(|g| g.domain.cmp(domain))
            .is_ok()
    }

    pub fn get_mut(&mut self, domain: &IndexDomain) -> Option<&mut DomainWriteGuard<'a>> {
        let pos = self
            .guards
            .binary_search_by(|g| g.domain.cmp(domain))
            .ok()?;
        self.guards.get_mut(pos)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DomainWriteGuard<'a>> {
        self.guards.iter_mut()
    }

    /// Wipe every domain. Only valid on a complete set.
    pub fn clear_all(&mut self) -> Result<()> {
        if !self.complete {
            return Err(StubIndexError::Storage(
                "clear_all needs every domain locked".to_string(),
            ));
        }
        for guard in &mut self.guards {
            guard.clear();
        }
        Ok(())
    }

    pub fn set_buffering(&mut self, enabled: bool) {
        for guard in &mut self.guards {
            guard.set_buffering(enabled);
        }
    }

    pub fn cleanup_overlay(&mut self) {
        for guard in &mut self.guards {
            guard.cleanup_overlay();
        }
    }
}

impl Drop for DomainLockSet<'_> {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stubdex_api::StubId;
    use tempfile::TempDir;

    fn domains() -> Vec<IndexDomain> {
        vec![
            IndexDomain::from("fn.names"),
            IndexDomain::from("class.names"),
        ]
    }

    fn one(value: &str, id: u32) -> BTreeMap<SmolStr, OccurrenceList> {
        BTreeMap::from([(SmolStr::new(value), OccurrenceList::single(StubId(id)))])
    }

    #[test]
    fn test_lock_all_is_ascending() {
        let set = StubIndexSet::in_memory(domains());
        let locks = set.lock_all().unwrap();
        let order: Vec<&str> = locks.domains().map(|d| d.as_str()).collect();
        assert_eq!(order, vec!["class.names", "fn.names"]);
        assert!(locks.is_complete());
    }

    #[test]
    fn test_lock_domains_skips_unknown_and_sorts() {
        let set = StubIndexSet::in_memory(domains());
        let unknown = IndexDomain::from("nope");
        let fns = IndexDomain::from("fn.names");
        let classes = IndexDomain::from("class.names");
        let locks = set.lock_domains([&fns, &unknown, &classes, &fns]).unwrap();
        assert_eq!(locks.len(), 2);
        assert!(locks.is_complete());

        drop(locks);
        let partial = set.lock_domains([&fns]).unwrap();
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_unknown_domain_is_an_error() {
        let set = StubIndexSet::in_memory(domains());
        let err = set.query(&IndexDomain::from("nope"), "x").unwrap_err();
        assert!(matches!(err, StubIndexError::UnknownDomain(_)));
    }

    #[test]
    fn test_apply_delta_through_lock_set() {
        let set = StubIndexSet::in_memory(domains());
        let classes = IndexDomain::from("class.names");
        {
            let mut locks = set.lock_all().unwrap();
            let guard = locks.get_mut(&classes).unwrap();
            guard.apply_delta(FileId::new(1), &BTreeMap::new(), &one("Foo", 0));
        }
        assert_eq!(set.query(&classes, "Foo").unwrap().len(), 1);

        {
            let mut locks = set.lock_all().unwrap();
            locks.clear_all().unwrap();
        }
        assert!(set.values(&classes).unwrap().is_empty());
    }

    #[test]
    fn test_clear_all_rejects_partial_set() {
        let set = StubIndexSet::in_memory(domains());
        let fns = IndexDomain::from("fn.names");
        let mut locks = set.lock_domains([&fns]).unwrap();
        assert!(locks.clear_all().is_err());
    }

    #[test]
    fn test_flush_and_reopen() {
        let temp = TempDir::new().unwrap();
        let classes = IndexDomain::from("class.names");
        {
            let set = StubIndexSet::open(temp.path(), domains()).unwrap();
            let mut guard = set.write_lock(&classes).unwrap();
            guard.apply_delta(FileId::new(9), &BTreeMap::new(), &one("Foo", 2));
            drop(guard);
            set.dispose().unwrap();
            set.dispose().unwrap();
        }

        let set = StubIndexSet::open(temp.path(), domains()).unwrap();
        assert!(!set.was_reset());
        assert_eq!(
            set.query(&classes, "Foo").unwrap(),
            vec![(FileId::new(9), OccurrenceList::single(StubId(2)))]
        );
    }

    #[test]
    fn test_buffered_changes_are_not_flushed() {
        let temp = TempDir::new().unwrap();
        let classes = IndexDomain::from("class.names");
        {
            let set = StubIndexSet::open(temp.path(), domains()).unwrap();
            let mut locks = set.lock_all().unwrap();
            locks.set_buffering(true);
            locks
                .get_mut(&classes)
                .unwrap()
                .apply_delta(FileId::new(1), &BTreeMap::new(), &one("Foo", 0));
            drop(locks);
            assert_eq!(set.query(&classes, "Foo").unwrap().len(), 1);
            set.flush_all().unwrap();
        }

        let set = StubIndexSet::open(temp.path(), domains()).unwrap();
        assert!(set.query(&classes, "Foo").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_domain_file_is_reset() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("class.names.sidx"), b"\xc1\xc1").unwrap();
        let set = StubIndexSet::open(temp.path(), domains()).unwrap();
        assert!(set.was_reset());
        assert!(set.values(&IndexDomain::from("class.names")).unwrap().is_empty());
    }

    #[test]
    fn test_writers_on_different_domains_do_not_block() {
        let set = Arc::new(StubIndexSet::in_memory(domains()));
        let fns = IndexDomain::from("fn.names");
        let classes = IndexDomain::from("class.names");
        let _held = set.write_lock(&fns).unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                let mut guard = set.write_lock(&classes).unwrap();
                guard.apply_delta(FileId::new(2), &BTreeMap::new(), &one("Bar", 1));
            });
        });
        assert_eq!(set.query(&classes, "Bar").unwrap().len(), 1);
    }
}
