use super::diff::diff_snapshots;
use super::*;
use crate::index::DomainLockSet;
use crate::storage::PrimaryWriteGuard;
use crate::stub_value::StubValue;
use rayon::prelude::*;
use stubdex_api::IndexSnapshot;

/// What an update did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    /// The file has a stub after the update.
    pub has_stub: bool,
    /// Domains whose entries changed.
    pub changed_domains: usize,
}

/// Locks held for one update. Fields drop in declaration order: the primary
/// lock goes first, then the domain locks in reverse domain order.
pub(super) struct UpdateLocks<'a> {
    pub(super) primary: PrimaryWriteGuard<'a>,
    pub(super) domains: DomainLockSet<'a>,
}

impl StubIndexEngine {
    /// Re-index `file` from its current content.
    pub fn update(&self, file: FileId, content: &FileContent) -> Result<UpdateOutcome> {
        self.ensure_writable()?;
        self.verify_names()?;
        let built = self.build_stub(file, content)?;
        self.apply(file, built)
    }

    /// Drop everything `file` contributed, as if its new content had no stub.
    pub fn remove(&self, file: FileId) -> Result<UpdateOutcome> {
        self.ensure_writable()?;
        self.verify_names()?;
        self.apply(file, None)
    }

    /// Update many files in parallel. Each file gets its own result.
    pub fn update_many(&self, files: Vec<(FileId, FileContent)>) -> Vec<(FileId, Result<UpdateOutcome>)> {
        files
            .into_par_iter()
            .map(|(file, content)| {
                let result = self.update(file, &content);
                (file, result)
            })
            .collect()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(StubIndexError::Storage("stub index is disposed".to_string()));
        }
        if let Some(stale) = self.pending_mismatch_mut()?.clone() {
            return Err(stale.into());
        }
        Ok(())
    }

    /// The name table must be intact and still the one every stored stub was
    /// encoded against. A corrupted table is repaired on the spot; after any
    /// repair, updates are refused until `clear` drops the stubs that hold
    /// ids from the old table.
    fn verify_names(&self) -> Result<()> {
        if self.names.is_corrupted() {
            tracing::warn!("Name table corrupted; resetting it. A full reindex is required.");
            self.names.repair();
        }
        if self.names.generation() != self.names_generation.load(Ordering::SeqCst) {
            return Err(StubIndexError::StorageCorrupted(
                "name table was reset; the index must be cleared and rebuilt".to_string(),
            ));
        }
        Ok(())
    }

    fn builder_for(&self, content: &FileContent) -> Option<&Arc<dyn StubBuilder>> {
        let builder = self.builders.get(&content.kind)?;
        builder.accepts(content).then_some(builder)
    }

    /// Build, flatten and serialize the new stub. Builder failures leave the
    /// file without a stub.
    fn build_stub(&self, file: FileId, content: &FileContent) -> Result<Option<(StubValue, IndexSnapshot)>> {
        let Some(builder) = self.builder_for(content) else {
            return Ok(None);
        };

        let tree = match builder.build(content) {
            Ok(Some(tree)) => tree,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!("Failed to build stub for {} ({}): {}", file, content.kind, e);
                return Ok(None);
            }
        };

        let snapshot = self.known_domains_only(file, tree.flatten());
        let value = StubValue::from_tree(file, tree, self.codec.as_ref(), self.names.as_ref())?;
        Ok(Some((value, snapshot)))
    }

    fn known_domains_only(&self, file: FileId, mut snapshot: IndexSnapshot) -> IndexSnapshot {
        snapshot.retain(|domain, _| {
            let known = self.indices.contains(domain);
            if !known {
                tracing::warn!("Stub of {} contributes to unregistered domain {}; skipped", file, domain);
            }
            known
        });
        snapshot
    }

    /// Snapshot of a stored stub. An undecodable stub counts as empty unless
    /// the failure came from the name table, which aborts the update.
    fn stored_snapshot(&self, file: FileId, stored: Option<&StubValue>) -> Result<IndexSnapshot> {
        let Some(stored) = stored else {
            return Ok(IndexSnapshot::new());
        };
        match stored.tree(self.codec.as_ref(), self.names.as_ref()) {
            Ok(tree) => Ok(self.known_domains_only(file, tree.flatten())),
            Err(e) if self.names.is_corrupted() => {
                tracing::error!("Stored stub of {} references unknown names: {}", file, e);
                self.verify_names()?;
                Err(e)
            }
            Err(e) => {
                tracing::warn!("Failed to decode stored stub of {}: {}. Treating it as empty.", file, e);
                Ok(IndexSnapshot::new())
            }
        }
    }

    fn lock_for_update(&self, file: FileId, new_snapshot: &IndexSnapshot) -> Result<UpdateLocks<'_>> {
        if self.config.lock_scope == LockScope::AllDomains {
            return self.lock_everything();
        }

        let (seen_version, old_domains) = {
            let store = self.primary.read()?;
            let seen_version = self.primary.version();
            let stored = store.get(file)?;
            let old_domains = match stored.as_ref() {
                None => Some(BTreeSet::new()),
                Some(value) => value
                    .tree(self.codec.as_ref(), self.names.as_ref())
                    .ok()
                    .map(|tree| tree.flatten().into_keys().collect::<BTreeSet<_>>()),
            };
            (seen_version, old_domains)
        };

        let Some(mut affected) = old_domains else {
            return self.lock_everything();
        };
        affected.extend(new_snapshot.keys().cloned());

        let domains = self.indices.lock_domains(affected.iter())?;
        let primary = self.primary.write()?;
        if self.primary.version() == seen_version {
            return Ok(UpdateLocks { primary, domains });
        }

        drop(primary);
        drop(domains);
        tracing::debug!("Primary store moved while locking {}; retrying with every domain", file);
        self.lock_everything()
    }

    pub(super) fn lock_everything(&self) -> Result<UpdateLocks<'_>> {
        let domains = self.indices.lock_all()?;
        let primary = self.primary.write()?;
        Ok(UpdateLocks { primary, domains })
    }

    fn apply(&self, file: FileId, built: Option<(StubValue, IndexSnapshot)>) -> Result<UpdateOutcome> {
        let (new_value, new_snapshot) = match built {
            Some((value, snapshot)) => (Some(value), snapshot),
            None => (None, IndexSnapshot::new()),
        };

        let mut locks = self.lock_for_update(file, &new_snapshot)?;
        // The table may have been corrupted or repaired while the stub was built.
        self.verify_names()?;

        let stored = locks.primary.get(file)?;
        let old_snapshot = self.stored_snapshot(file, stored.as_ref())?;

        let deltas = diff_snapshots(&old_snapshot, &new_snapshot);
        if let Some(domain) = deltas.keys().find(|d| !locks.domains.holds(d)) {
            return Err(StubIndexError::Storage(format!(
                "domain {domain} not locked for update of {file}"
            )));
        }

        self.verify_names()?;
        let has_stub = new_value.is_some();
        match new_value {
            Some(value) => locks.primary.put(file, value)?,
            None if stored.is_some() => locks.primary.remove(file)?,
            None => {}
        }

        for (domain, delta) in &deltas {
            if let Some(guard) = locks.domains.get_mut(domain) {
                guard.apply_delta(file, &delta.removed, &delta.added);
            }
        }

        tracing::debug!(
            "Updated {}: stub={}, {} domain(s) changed",
            file,
            has_stub,
            deltas.len()
        );
        Ok(UpdateOutcome {
            has_stub,
            changed_domains: deltas.len(),
        })
    }
}
