use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Primary-store key for a file.
///
/// Hosts hand out signed handles; the store only ever sees the magnitude, so
/// two handles that differ in sign address the same entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FileId(u64);

impl FileId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Normalize a host handle with `abs(handle)`.
    pub fn from_handle(handle: i64) -> Self {
        Self(handle.unsigned_abs().min(i64::MAX as u64))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for FileId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// File type as understood by the stub builders (`"outline"`, `"java"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKind(Cow<'static, str>);

impl FileKind {
    pub const UNKNOWN: FileKind = FileKind(Cow::Borrowed("unknown"));

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FileKind {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl From<String> for FileKind {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Raw content of a file, tagged with the kind that decides which builder sees it.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub kind: FileKind,
    pub bytes: Arc<[u8]>,
}

impl FileContent {
    pub fn new(kind: FileKind, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            kind,
            bytes: bytes.into(),
        }
    }

    pub fn from_text(kind: FileKind, text: &str) -> Self {
        Self::new(kind, text.as_bytes())
    }

    /// Content as UTF-8, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_normalization() {
        assert_eq!(FileId::from_handle(42), FileId::new(42));
        assert_eq!(FileId::from_handle(-42), FileId::new(42));
        assert_eq!(FileId::from_handle(i64::MIN), FileId::new(i64::MAX as u64));
    }

    #[test]
    fn test_content_text() {
        let content = FileContent::from_text(FileKind::from("outline"), "class Foo");
        assert_eq!(content.text(), Some("class Foo"));

        let binary = FileContent::new(FileKind::UNKNOWN, vec![0xff, 0xfe]);
        assert!(binary.text().is_none());
        assert_eq!(binary.len(), 2);
    }
}
