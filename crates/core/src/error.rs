pub use stubdex_api::{Result, StubIndexError};

/// Wrap a backend or codec failure as a storage error.
pub(crate) fn storage_error(context: &str, err: impl std::fmt::Display) -> StubIndexError {
    StubIndexError::Storage(format!("{context}: {err}"))
}

/// Turn an encode/decode failure of a durable file into an error carrying its path.
pub(crate) fn file_error(path: &std::path::Path, err: impl std::fmt::Display) -> StubIndexError {
    StubIndexError::Storage(format!("{}: {}", path.display(), err))
}
