use super::*;

/// Layout version of the index as a whole, independent of any builder.
pub const STUB_INDEX_VERSION: u32 = 22;

/// Pseudo kind under which the overall index version is stamped.
pub const INDEX_STAMP_KIND: FileKind = FileKind::from_static("stub-index");

/// Stub version of every registered file kind.
pub fn compute_version_map<'a>(
    builders: impl IntoIterator<Item = &'a Arc<dyn StubBuilder>>,
) -> BTreeMap<FileKind, u32> {
    builders
        .into_iter()
        .map(|b| (b.kind(), b.stub_version()))
        .collect()
}

/// `max(STUB_INDEX_VERSION, every kind version)`.
pub fn index_version(versions: &BTreeMap<FileKind, u32>) -> u32 {
    versions
        .values()
        .copied()
        .fold(STUB_INDEX_VERSION, u32::max)
}

/// A persisted stamp that disagrees with what the engine expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleStamp {
    pub kind: FileKind,
    pub expected: u32,
    pub found: Option<u32>,
}

impl From<StaleStamp> for StubIndexError {
    fn from(stale: StaleStamp) -> Self {
        StubIndexError::VersionMismatch {
            kind: stale.kind,
            expected: stale.expected,
            found: stale.found,
        }
    }
}

impl StubIndexEngine {
    pub fn version_map(&self) -> &BTreeMap<FileKind, u32> {
        &self.versions
    }

    pub fn index_version(&self) -> u32 {
        index_version(&self.versions)
    }

    fn expected_stamps(&self) -> impl Iterator<Item = (FileKind, u32)> + '_ {
        self.versions
            .iter()
            .map(|(kind, version)| (kind.clone(), *version))
            .chain(std::iter::once((INDEX_STAMP_KIND, self.index_version())))
    }

    /// First stamp that does not match. An unreadable stamp counts as missing.
    pub(super) fn find_stale_stamp(&self) -> Option<StaleStamp> {
        for (kind, expected) in self.expected_stamps() {
            let found = match self.stamps.read(&kind) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!("Failed to read version stamp for {}: {}", kind, e);
                    None
                }
            };
            if found != Some(expected) {
                return Some(StaleStamp {
                    kind,
                    expected,
                    found,
                });
            }
        }
        None
    }

    /// Rewrite every stamp. Failures are logged only.
    pub(super) fn write_stamps(&self) {
        for (kind, version) in self.expected_stamps() {
            if let Err(e) = self.stamps.write(&kind, version) {
                tracing::error!("Failed to write version stamp for {}: {}", kind, e);
            }
        }
    }

    /// Compare persisted stamps against the registered builders. On mismatch
    /// either clear (auto clear, or nothing stored yet) or refuse updates
    /// until `clear` is called.
    pub(super) fn check_versions(&self, force_clear: bool) -> Result<()> {
        if force_clear {
            tracing::warn!("Stored index state was unusable. Clearing.");
            return self.clear();
        }

        let Some(stale) = self.find_stale_stamp() else {
            return Ok(());
        };

        let empty = self.primary.read()?.files()?.is_empty();
        if empty || self.config.auto_clear_on_version_mismatch {
            if !empty {
                tracing::info!(
                    "Stub version of {} changed ({:?} -> {}). Clearing index.",
                    stale.kind,
                    stale.found,
                    stale.expected
                );
            }
            return self.clear();
        }

        tracing::warn!(
            "Stub version of {} changed ({:?} -> {}). Updates are refused until the index is cleared.",
            stale.kind,
            stale.found,
            stale.expected
        );
        *self.pending_mismatch_mut()? = Some(stale);
        Ok(())
    }

    pub(super) fn pending_mismatch_mut(&self) -> Result<std::sync::MutexGuard<'_, Option<StaleStamp>>> {
        self.pending_mismatch
            .lock()
            .map_err(|_| StubIndexError::LockPoisoned("version state"))
    }

    /// Stamp mismatch found at open that still blocks updates.
    pub fn pending_mismatch(&self) -> Option<StaleStamp> {
        self.pending_mismatch
            .lock()
            .ok()
            .and_then(|pending| pending.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stubdex_plugin::BuildError;

    struct Fixed(&'static str, u32);

    impl StubBuilder for Fixed {
        fn kind(&self) -> FileKind {
            FileKind::from_static(self.0)
        }

        fn stub_version(&self) -> u32 {
            self.1
        }

        fn build(&self, _content: &FileContent) -> std::result::Result<Option<StubTree>, BuildError> {
            Ok(None)
        }
    }

    #[test]
    fn test_index_version_is_at_least_base() {
        let builders: Vec<Arc<dyn StubBuilder>> = vec![Arc::new(Fixed("a", 3)), Arc::new(Fixed("b", 7))];
        let map = compute_version_map(&builders);
        assert_eq!(map[&FileKind::from("a")], 3);
        assert_eq!(index_version(&map), STUB_INDEX_VERSION);

        let builders: Vec<Arc<dyn StubBuilder>> = vec![Arc::new(Fixed("c", 40))];
        assert_eq!(index_version(&compute_version_map(&builders)), 40);
        assert_eq!(index_version(&BTreeMap::new()), STUB_INDEX_VERSION);
    }
}
