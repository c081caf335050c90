//! Reference `StubCodec`: a format byte followed by a MessagePack-encoded
//! `StorageStub` whose strings live in the shared name table.

pub mod converter;
pub mod model;

use crate::error::{Result, StubIndexError, storage_error};
use model::{STUB_FORMAT, StorageStub};
use stubdex_api::StubTree;
use stubdex_plugin::{NameInterner, StubCodec};

#[derive(Debug, Default, Clone, Copy)]
pub struct InternedStubCodec;

impl StubCodec for InternedStubCodec {
    fn serialize(&self, tree: &StubTree, names: &dyn NameInterner) -> Result<Vec<u8>> {
        let storage = converter::to_storage(tree, names);
        let mut bytes = vec![STUB_FORMAT];
        rmp_serde::encode::write(&mut bytes, &storage)
            .map_err(|e| storage_error("encode stub", e))?;
        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8], names: &dyn NameInterner) -> Result<StubTree> {
        let Some((&format, payload)) = bytes.split_first() else {
            return Err(StubIndexError::Deserialize("empty stub payload".to_string()));
        };
        if format != STUB_FORMAT {
            return Err(StubIndexError::Deserialize(format!(
                "unsupported stub format {format}"
            )));
        }
        let storage: StorageStub = rmp_serde::from_slice(payload)
            .map_err(|e| StubIndexError::Deserialize(e.to_string()))?;
        converter::from_storage(storage, names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NameStorage;
    use stubdex_api::IndexDomain;

    fn sample_tree() -> StubTree {
        let mut tree = StubTree::new("outline");
        let foo = tree.add_child(tree.root(), "class", Some("Foo".into()));
        tree.index(foo, IndexDomain::from("class.names"), "Foo");
        let run = tree.add_child(foo, "fn", Some("run".into()));
        tree.index(run, IndexDomain::from("method.names"), "run");
        tree
    }

    #[test]
    fn test_roundtrip_preserves_tree() {
        let names = NameStorage::in_memory();
        let tree = sample_tree();

        let bytes = InternedStubCodec.serialize(&tree, &names).unwrap();
        assert_eq!(bytes[0], STUB_FORMAT);
        let decoded = InternedStubCodec.deserialize(&bytes, &names).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(decoded.flatten(), tree.flatten());
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let names = NameStorage::in_memory();
        let mut bytes = InternedStubCodec.serialize(&sample_tree(), &names).unwrap();
        bytes[0] = 99;
        let err = InternedStubCodec.deserialize(&bytes, &names).unwrap_err();
        assert!(matches!(err, StubIndexError::Deserialize(_)));
        assert!(InternedStubCodec.deserialize(&[], &names).is_err());
    }

    #[test]
    fn test_stale_ids_mark_names_corrupted() {
        let names = NameStorage::in_memory();
        let bytes = InternedStubCodec.serialize(&sample_tree(), &names).unwrap();

        names.repair();
        let err = InternedStubCodec.deserialize(&bytes, &names).unwrap_err();
        assert!(matches!(err, StubIndexError::Deserialize(_)));
        assert!(names.is_corrupted());
    }
}
