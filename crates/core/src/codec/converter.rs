use super::model::*;
use crate::error::{Result, StubIndexError};
use smol_str::SmolStr;
use stubdex_api::{IndexDomain, StubId, StubNode, StubTree};
use stubdex_plugin::NameInterner;

pub fn to_storage(tree: &StubTree, names: &dyn NameInterner) -> StorageStub {
    let nodes = tree
        .nodes()
        .iter()
        .map(|node| StorageNode {
            parent: node.parent.map(|p| p.0),
            kind_sid: names.intern(&node.kind),
            name_sid: node.name.as_deref().map(|n| names.intern(n)),
            keys: node
                .index_keys
                .iter()
                .map(|(domain, value)| StorageKey {
                    domain_sid: names.intern(domain.as_str()),
                    value_sid: names.intern(value),
                })
                .collect(),
        })
        .collect();

    StorageStub { nodes }
}

/// Resolves ids against the name table. An id the table does not know means
/// the table no longer matches the stored stubs, so it is flagged corrupted.
struct Resolver<'a> {
    names: &'a dyn NameInterner,
}

impl Resolver<'_> {
    fn name(&self, sid: u32) -> Result<SmolStr> {
        self.names.resolve(sid).ok_or_else(|| {
            let reason = format!("stub references unknown name id {sid}");
            self.names.mark_corrupted(&reason);
            StubIndexError::Deserialize(reason)
        })
    }
}

pub fn from_storage(storage: StorageStub, names: &dyn NameInterner) -> Result<StubTree> {
    let resolver = Resolver { names };
    let mut nodes = Vec::with_capacity(storage.nodes.len());

    for (idx, node) in storage.nodes.into_iter().enumerate() {
        let index_keys = node
            .keys
            .into_iter()
            .map(|key| {
                let domain = resolver.name(key.domain_sid)?;
                let value = resolver.name(key.value_sid)?;
                Ok((IndexDomain::new(domain.to_string()), value))
            })
            .collect::<Result<Vec<_>>>()?;

        nodes.push(StubNode {
            id: StubId(idx as u32),
            parent: node.parent.map(StubId),
            kind: resolver.name(node.kind_sid)?,
            name: node.name_sid.map(|sid| resolver.name(sid)).transpose()?,
            index_keys,
        });
    }

    StubTree::from_nodes(nodes).map_err(StubIndexError::Deserialize)
}
