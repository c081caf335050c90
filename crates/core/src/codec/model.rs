use serde::{Deserialize, Serialize};

/// Leading byte of every serialized stub; bump when `StorageStub` changes shape.
pub const STUB_FORMAT: u8 = 1;

/// A stub tree with every string replaced by a name-table id.
/// Node ids are implicit: a node's id is its position.
#[derive(Serialize, Deserialize)]
pub struct StorageStub {
    pub nodes: Vec<StorageNode>,
}

#[derive(Serialize, Deserialize)]
pub struct StorageNode {
    pub parent: Option<u32>,
    pub kind_sid: u32,
    pub name_sid: Option<u32>,
    pub keys: Vec<StorageKey>,
}

#[derive(Serialize, Deserialize)]
pub struct StorageKey {
    pub domain_sid: u32,
    pub value_sid: u32,
}
