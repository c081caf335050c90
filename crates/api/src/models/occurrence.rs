use serde::{Deserialize, Serialize};
use std::fmt;

/// Local ordinal of a node inside one stub tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StubId(pub u32);

impl fmt::Display for StubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The stub ids of one file that contribute a given (domain, value) pair.
///
/// Never empty. Most values are declared once per file, so the single-id form
/// avoids an allocation; `Many` is always sorted and de-duplicated.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<StubId>", into = "Vec<StubId>")]
pub enum OccurrenceList {
    Single(StubId),
    Many(Box<[StubId]>),
}

impl OccurrenceList {
    pub fn single(id: StubId) -> Self {
        Self::Single(id)
    }

    /// Build a list from arbitrary ids. Returns `None` for an empty input.
    pub fn from_ids(ids: impl IntoIterator<Item = StubId>) -> Option<Self> {
        let mut ids: Vec<StubId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        match ids.len() {
            0 => None,
            1 => Some(Self::Single(ids[0])),
            _ => Some(Self::Many(ids.into_boxed_slice())),
        }
    }

    pub fn as_slice(&self) -> &[StubId] {
        match self {
            Self::Single(id) => std::slice::from_ref(id),
            Self::Many(ids) => ids,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Always false; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, id: StubId) -> bool {
        match self {
            Self::Single(single) => *single == id,
            Self::Many(ids) => ids.binary_search(&id).is_ok(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = StubId> + '_ {
        self.as_slice().iter().copied()
    }

    /// Return a copy that also contains `id`.
    pub fn with(&self, id: StubId) -> Self {
        if self.contains(id) {
            return self.clone();
        }
        let mut ids = self.as_slice().to_vec();
        ids.push(id);
        ids.sort_unstable();
        Self::Many(ids.into_boxed_slice())
    }
}

impl PartialEq for OccurrenceList {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for OccurrenceList {}

impl fmt::Debug for OccurrenceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl TryFrom<Vec<StubId>> for OccurrenceList {
    type Error = String;

    fn try_from(ids: Vec<StubId>) -> Result<Self, Self::Error> {
        Self::from_ids(ids).ok_or_else(|| "occurrence list cannot be empty".to_string())
    }
}

impl From<OccurrenceList> for Vec<StubId> {
    fn from(list: OccurrenceList) -> Self {
        list.as_slice().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<StubId> {
        raw.iter().copied().map(StubId).collect()
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(OccurrenceList::from_ids(Vec::new()).is_none());
        assert!(OccurrenceList::try_from(Vec::new()).is_err());
    }

    #[test]
    fn test_single_fast_path() {
        let list = OccurrenceList::from_ids(ids(&[7, 7])).unwrap();
        assert!(matches!(list, OccurrenceList::Single(StubId(7))));
        assert_eq!(list, OccurrenceList::single(StubId(7)));
    }

    #[test]
    fn test_many_is_sorted_and_searchable() {
        let list = OccurrenceList::from_ids(ids(&[9, 2, 5, 2])).unwrap();
        assert_eq!(list.as_slice(), ids(&[2, 5, 9]).as_slice());
        assert!(list.contains(StubId(5)));
        assert!(!list.contains(StubId(3)));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_representations_compare_by_membership() {
        let many = OccurrenceList::Many(ids(&[4]).into_boxed_slice());
        assert_eq!(many, OccurrenceList::single(StubId(4)));
    }

    #[test]
    fn test_with_adds_in_order() {
        let list = OccurrenceList::single(StubId(3)).with(StubId(1));
        assert_eq!(list.as_slice(), ids(&[1, 3]).as_slice());
        assert_eq!(list.with(StubId(3)), list);
    }
}
