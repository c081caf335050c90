use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use stubdex_api::{FileId, OccurrenceList};

/// value -> file -> occurrences. A value with no files is never stored.
pub type DomainEntries = BTreeMap<SmolStr, BTreeMap<FileId, OccurrenceList>>;

/// Overrides recorded while buffering; `None` hides the base entry.
type OverlayEntries = BTreeMap<SmolStr, BTreeMap<FileId, Option<OccurrenceList>>>;

pub const DOMAIN_FORMAT: u32 = 1;

#[derive(Serialize, Deserialize)]
pub(crate) struct DomainFile {
    pub format: u32,
    pub domain: String,
    pub entries: DomainEntries,
}

/// Contents of one secondary index. Lives behind the domain's `RwLock`.
#[derive(Default)]
pub struct DomainState {
    base: DomainEntries,
    overlay: Option<OverlayEntries>,
    dirty: bool,
}

impl DomainState {
    pub(crate) fn from_entries(entries: DomainEntries) -> Self {
        Self {
            base: entries,
            overlay: None,
            dirty: false,
        }
    }

    pub fn buffering(&self) -> bool {
        self.overlay.is_some()
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn base(&self) -> &DomainEntries {
        &self.base
    }

    fn remove(&mut self, value: &SmolStr, file: FileId) {
        if let Some(overlay) = &mut self.overlay {
            overlay.entry(value.clone()).or_default().insert(file, None);
            return;
        }
        if let Some(files) = self.base.get_mut(value) {
            if files.remove(&file).is_some() {
                self.dirty = true;
            }
            if files.is_empty() {
                self.base.remove(value);
            }
        }
    }

    fn insert(&mut self, value: &SmolStr, file: FileId, list: &OccurrenceList) {
        if let Some(overlay) = &mut self.overlay {
            overlay
                .entry(value.clone())
                .or_default()
                .insert(file, Some(list.clone()));
            return;
        }
        self.base
            .entry(value.clone())
            .or_default()
            .insert(file, list.clone());
        self.dirty = true;
    }

    /// Replace `file`'s contribution: drop every value in `removed`, then
    /// (re)insert every value in `added`.
    pub fn apply_delta(
        &mut self,
        file: FileId,
        removed: &BTreeMap<SmolStr, OccurrenceList>,
        added: &BTreeMap<SmolStr, OccurrenceList>,
    ) {
        for value in removed.keys() {
            self.remove(value, file);
        }
        for (value, list) in added {
            self.insert(value, file, list);
        }
    }

    /// Files contributing `value`, sorted by file id.
    pub fn lookup(&self, value: &str) -> Vec<(FileId, OccurrenceList)> {
        let mut merged: BTreeMap<FileId, OccurrenceList> =
            self.base.get(value).cloned().unwrap_or_default();

        if let Some(overrides) = self.overlay.as_ref().and_then(|o| o.get(value)) {
            for (file, entry) in overrides {
                match entry {
                    Some(list) => {
                        merged.insert(*file, list.clone());
                    }
                    None => {
                        merged.remove(file);
                    }
                }
            }
        }

        merged.into_iter().collect()
    }

    /// All values with at least one contributing file.
    pub fn values(&self) -> Vec<SmolStr> {
        let mut values: Vec<SmolStr> = self.base.keys().cloned().collect();
        if let Some(overlay) = &self.overlay {
            values.extend(overlay.keys().cloned());
            values.sort();
            values.dedup();
        }
        values.retain(|value| !self.lookup(value).is_empty());
        values
    }

    /// Values `file` currently contributes to.
    pub fn values_of(&self, file: FileId) -> Vec<SmolStr> {
        self.values()
            .into_iter()
            .filter(|value| self.lookup(value).iter().any(|(f, _)| *f == file))
            .collect()
    }

    /// Distinct files with at least one entry.
    pub fn file_count(&self) -> usize {
        let mut files = std::collections::BTreeSet::new();
        for value in self.values() {
            files.extend(self.lookup(&value).into_iter().map(|(file, _)| file));
        }
        files.len()
    }

    pub fn clear(&mut self) {
        if !self.base.is_empty() {
            self.dirty = true;
        }
        self.base.clear();
        if let Some(overlay) = &mut self.overlay {
            overlay.clear();
        }
    }

    pub fn set_buffering(&mut self, enabled: bool) {
        match (enabled, self.overlay.is_some()) {
            (true, false) => self.overlay = Some(OverlayEntries::new()),
            (false, true) => self.overlay = None,
            _ => {}
        }
    }

    /// Drop buffered changes, keeping buffering on if it was on.
    pub fn cleanup_overlay(&mut self) {
        if let Some(overlay) = &mut self.overlay {
            overlay.clear();
        }
    }
}
