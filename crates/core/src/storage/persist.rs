use crate::error::{Result, file_error};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Sibling temp file used for atomic replacement (`names.bin` -> `names.bin.tmp`).
fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Write to a temp file, then rename over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}

pub fn save_msgpack<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = rmp_serde::to_vec(value).map_err(|e| file_error(path, e))?;
    write_atomic(path, &bytes)
}

/// `Ok(None)` when the file does not exist; an error when it cannot be decoded.
pub fn load_msgpack<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    rmp_serde::from_slice(&bytes)
        .map(Some)
        .map_err(|e| file_error(path, e))
}

pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip_and_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/table.bin");

        assert!(load_msgpack::<Vec<u32>>(&path).unwrap().is_none());
        save_msgpack(&path, &vec![1u32, 2, 3]).unwrap();
        assert_eq!(load_msgpack::<Vec<u32>>(&path).unwrap(), Some(vec![1, 2, 3]));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_garbage_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("table.bin");
        std::fs::write(&path, [0xc1, 0xc1, 0xc1]).unwrap();
        assert!(load_msgpack::<Vec<u32>>(&path).is_err());

        remove_if_exists(&path).unwrap();
        remove_if_exists(&path).unwrap();
        assert!(!path.exists());
    }
}
