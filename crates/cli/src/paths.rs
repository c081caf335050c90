use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use stubdex_api::FileId;
use stubdex_core::storage::persist;
use xxhash_rust::xxh3::xxh3_64;

pub const PATHS_FILE: &str = "paths.bin";

/// Stable id of a file: xxh3 of its canonical path.
pub fn file_id_for(path: &Path) -> FileId {
    FileId::new(xxh3_64(path.to_string_lossy().as_bytes()))
}

/// File id -> path, so query results can be shown as paths.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PathTable {
    paths: BTreeMap<u64, PathBuf>,
}

impl PathTable {
    pub fn load(index_dir: &Path) -> stubdex_core::Result<Self> {
        let path = index_dir.join(PATHS_FILE);
        match persist::load_msgpack::<PathTable>(&path) {
            Ok(table) => Ok(table.unwrap_or_default()),
            Err(e) => {
                tracing::warn!("Failed to read path table: {}. Will rebuild.", e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, index_dir: &Path) -> stubdex_core::Result<()> {
        persist::save_msgpack(&index_dir.join(PATHS_FILE), self)
    }

    pub fn insert(&mut self, path: &Path) -> FileId {
        let id = file_id_for(path);
        self.paths.insert(id.as_u64(), path.to_path_buf());
        id
    }

    pub fn get(&self, id: FileId) -> Option<&Path> {
        self.paths.get(&id.as_u64()).map(PathBuf::as_path)
    }

    /// Files recorded under `root` that are not in `present`.
    pub fn missing_under(&self, root: &Path, present: &HashSet<PathBuf>) -> Vec<(FileId, PathBuf)> {
        self.paths
            .iter()
            .filter(|(_, path)| path.starts_with(root) && !present.contains(*path))
            .map(|(id, path)| (FileId::new(*id), path.clone()))
            .collect()
    }

    pub fn remove(&mut self, id: FileId) {
        self.paths.remove(&id.as_u64());
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
