use super::domain::IndexDomain;
use super::occurrence::{OccurrenceList, StubId};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Per-file structural snapshot: domain -> value -> occurrences.
pub type IndexSnapshot = BTreeMap<IndexDomain, BTreeMap<SmolStr, OccurrenceList>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubNode {
    pub id: StubId,
    pub parent: Option<StubId>,
    pub kind: SmolStr,
    pub name: Option<SmolStr>,
    /// (domain, value) pairs this node contributes to the secondary indices.
    pub index_keys: Vec<(IndexDomain, SmolStr)>,
}

/// Structural summary of one file.
///
/// Node 0 is the file root. Ids are dense and equal to the node's position,
/// so they stay stable for identical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubTree {
    nodes: Vec<StubNode>,
}

impl StubTree {
    pub fn new(root_kind: impl Into<SmolStr>) -> Self {
        Self {
            nodes: vec![StubNode {
                id: StubId(0),
                parent: None,
                kind: root_kind.into(),
                name: None,
                index_keys: Vec::new(),
            }],
        }
    }

    /// Rebuild a tree from decoded nodes, checking the id/position invariant.
    pub fn from_nodes(nodes: Vec<StubNode>) -> Result<Self, String> {
        if nodes.is_empty() {
            return Err("stub tree has no root".to_string());
        }
        for (idx, node) in nodes.iter().enumerate() {
            if node.id.0 as usize != idx {
                return Err(format!("stub id {} stored at position {}", node.id, idx));
            }
            if let Some(parent) = node.parent {
                if parent.0 as usize >= idx {
                    return Err(format!("stub {} has forward parent {}", node.id, parent));
                }
            } else if idx != 0 {
                return Err(format!("stub {} has no parent", node.id));
            }
        }
        Ok(Self { nodes })
    }

    pub fn root(&self) -> StubId {
        StubId(0)
    }

    pub fn root_kind(&self) -> &str {
        &self.nodes[0].kind
    }

    pub fn add_child(
        &mut self,
        parent: StubId,
        kind: impl Into<SmolStr>,
        name: Option<SmolStr>,
    ) -> StubId {
        let id = StubId(self.nodes.len() as u32);
        self.nodes.push(StubNode {
            id,
            parent: Some(parent),
            kind: kind.into(),
            name,
            index_keys: Vec::new(),
        });
        id
    }

    /// Record that `id` contributes `value` to `domain`.
    pub fn index(&mut self, id: StubId, domain: IndexDomain, value: impl Into<SmolStr>) {
        if let Some(node) = self.nodes.get_mut(id.0 as usize) {
            node.index_keys.push((domain, value.into()));
        }
    }

    pub fn node(&self, id: StubId) -> Option<&StubNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn nodes(&self) -> &[StubNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Walk the tree and group every index contribution by domain and value.
    pub fn flatten(&self) -> IndexSnapshot {
        let mut grouped: BTreeMap<IndexDomain, BTreeMap<SmolStr, Vec<StubId>>> = BTreeMap::new();
        for node in &self.nodes {
            for (domain, value) in &node.index_keys {
                grouped
                    .entry(domain.clone())
                    .or_default()
                    .entry(value.clone())
                    .or_default()
                    .push(node.id);
            }
        }

        grouped
            .into_iter()
            .map(|(domain, values)| {
                let values = values
                    .into_iter()
                    .filter_map(|(value, ids)| OccurrenceList::from_ids(ids).map(|l| (value, l)))
                    .collect();
                (domain, values)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_groups_by_domain_and_value() {
        let classes = IndexDomain::from("class.names");
        let methods = IndexDomain::from("method.names");

        let mut tree = StubTree::new("file");
        let foo = tree.add_child(tree.root(), "class", Some("Foo".into()));
        tree.index(foo, classes.clone(), "Foo");
        let run = tree.add_child(foo, "method", Some("run".into()));
        tree.index(run, methods.clone(), "run");
        let run2 = tree.add_child(foo, "method", Some("run".into()));
        tree.index(run2, methods.clone(), "run");

        let snapshot = tree.flatten();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot[&classes]["Foo"],
            OccurrenceList::single(StubId(1))
        );
        assert_eq!(snapshot[&methods]["run"].as_slice(), &[StubId(2), StubId(3)]);
    }

    #[test]
    fn test_empty_tree_flattens_to_nothing() {
        let tree = StubTree::new("file");
        assert!(tree.is_empty());
        assert!(tree.flatten().is_empty());
    }

    #[test]
    fn test_from_nodes_rejects_bad_ids() {
        let mut tree = StubTree::new("file");
        tree.add_child(tree.root(), "class", None);
        let mut nodes = tree.nodes().to_vec();
        nodes[1].id = StubId(5);
        assert!(StubTree::from_nodes(nodes).is_err());
        assert!(StubTree::from_nodes(Vec::new()).is_err());
    }
}
