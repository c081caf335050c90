use super::persist;
use crate::error::{Result, StubIndexError};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use stubdex_api::FileKind;
use stubdex_plugin::VersionStampStore;

pub const VERSIONS_DIR: &str = "versions";

#[derive(Default)]
pub struct MemoryVersionStamps {
    stamps: DashMap<FileKind, u32>,
}

impl MemoryVersionStamps {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionStampStore for MemoryVersionStamps {
    fn read(&self, kind: &FileKind) -> Result<Option<u32>> {
        Ok(self.stamps.get(kind).map(|v| *v))
    }

    fn write(&self, kind: &FileKind, version: u32) -> Result<()> {
        self.stamps.insert(kind.clone(), version);
        Ok(())
    }
}

/// One `<kind>.ver` file per file kind, holding the version as decimal text.
pub struct FileVersionStamps {
    dir: PathBuf,
}

impl FileVersionStamps {
    pub fn new(index_dir: &Path) -> Self {
        Self {
            dir: index_dir.join(VERSIONS_DIR),
        }
    }

    fn stamp_path(&self, kind: &FileKind) -> PathBuf {
        let stem: String = kind
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{stem}.ver"))
    }
}

impl VersionStampStore for FileVersionStamps {
    fn read(&self, kind: &FileKind) -> Result<Option<u32>> {
        let path = self.stamp_path(kind);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        text.trim().parse::<u32>().map(Some).map_err(|e| {
            StubIndexError::Storage(format!("bad version stamp {}: {}", path.display(), e))
        })
    }

    fn write(&self, kind: &FileKind, version: u32) -> Result<()> {
        persist::write_atomic(&self.stamp_path(kind), version.to_string().as_bytes())
    }
}
