use crate::error::Result;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use stubdex_api::{FileId, StubTree};
use stubdex_plugin::{NameInterner, StubCodec};

/// Serialized stub of one file, plus the decoded tree once someone asked for it.
///
/// Bytes are written once at creation and never change. Clones share both the
/// bytes and the memoized tree. Equality is by owning file.
#[derive(Clone)]
pub struct StubValue {
    file: FileId,
    bytes: Arc<[u8]>,
    tree: Arc<OnceLock<StubTree>>,
}

impl StubValue {
    /// Serialize a freshly built tree, keeping it as the cached form.
    pub fn from_tree(
        file: FileId,
        tree: StubTree,
        codec: &dyn StubCodec,
        names: &dyn NameInterner,
    ) -> Result<Self> {
        let bytes = codec.serialize(&tree, names)?;
        let cached = OnceLock::new();
        let _ = cached.set(tree);
        Ok(Self {
            file,
            bytes: bytes.into(),
            tree: Arc::new(cached),
        })
    }

    /// Wrap bytes read back from storage; decoding happens on first `tree` call.
    pub fn from_bytes(file: FileId, bytes: Arc<[u8]>) -> Self {
        Self {
            file,
            bytes,
            tree: Arc::new(OnceLock::new()),
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn cached_tree(&self) -> Option<&StubTree> {
        self.tree.get()
    }

    pub fn tree(&self, codec: &dyn StubCodec, names: &dyn NameInterner) -> Result<&StubTree> {
        if let Some(tree) = self.tree.get() {
            return Ok(tree);
        }
        let decoded = codec.deserialize(&self.bytes, names)?;
        Ok(self.tree.get_or_init(|| decoded))
    }
}

impl PartialEq for StubValue {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file
    }
}

impl Eq for StubValue {}

impl Hash for StubValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file.hash(state);
    }
}

impl std::fmt::Debug for StubValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubValue")
            .field("file", &self.file)
            .field("bytes", &self.bytes.len())
            .field("decoded", &self.tree.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::InternedStubCodec;
    use crate::names::NameStorage;
    use stubdex_api::IndexDomain;

    #[test]
    fn test_lazy_decode_is_memoized() {
        let names = NameStorage::in_memory();
        let mut tree = StubTree::new("outline");
        let foo = tree.add_child(tree.root(), "class", Some("Foo".into()));
        tree.index(foo, IndexDomain::from("class.names"), "Foo");

        let built = StubValue::from_tree(FileId::new(1), tree.clone(), &InternedStubCodec, &names)
            .unwrap();
        assert!(built.cached_tree().is_some());

        let stored = StubValue::from_bytes(FileId::new(1), built.bytes().clone());
        assert!(stored.cached_tree().is_none());
        assert_eq!(stored.tree(&InternedStubCodec, &names).unwrap(), &tree);
        assert!(stored.cached_tree().is_some());

        let clone = stored.clone();
        assert!(clone.cached_tree().is_some());
    }

    #[test]
    fn test_identity_is_by_file() {
        let a = StubValue::from_bytes(FileId::new(7), Arc::from(vec![1u8]));
        let b = StubValue::from_bytes(FileId::new(7), Arc::from(vec![2u8]));
        let c = StubValue::from_bytes(FileId::new(8), Arc::from(vec![1u8]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
