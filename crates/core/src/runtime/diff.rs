use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};
use stubdex_api::{IndexDomain, IndexSnapshot, OccurrenceList};

/// Changes one file makes to a single domain.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DomainDelta {
    pub removed: BTreeMap<SmolStr, OccurrenceList>,
    pub added: BTreeMap<SmolStr, OccurrenceList>,
}

impl DomainDelta {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Per-domain difference between two snapshots of the same file.
///
/// A value whose occurrence list changed shows up in both `removed` (old list)
/// and `added` (new list). Domains with no change are left out.
pub fn diff_snapshots(old: &IndexSnapshot, new: &IndexSnapshot) -> BTreeMap<IndexDomain, DomainDelta> {
    let empty = BTreeMap::new();
    let domains: BTreeSet<&IndexDomain> = old.keys().chain(new.keys()).collect();

    let mut deltas = BTreeMap::new();
    for domain in domains {
        let before = old.get(domain).unwrap_or(&empty);
        let after = new.get(domain).unwrap_or(&empty);

        let mut delta = DomainDelta::default();
        for (value, list) in before {
            if after.get(value) != Some(list) {
                delta.removed.insert(value.clone(), list.clone());
            }
        }
        for (value, list) in after {
            if before.get(value) != Some(list) {
                delta.added.insert(value.clone(), list.clone());
            }
        }

        if !delta.is_empty() {
            deltas.insert(domain.clone(), delta);
        }
    }
    deltas
}
