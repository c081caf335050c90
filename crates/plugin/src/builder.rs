use stubdex_api::{FileContent, FileKind, IndexDomain, StubTree};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("malformed content: {0}")]
    Malformed(String),
    #[error("unsupported content: {0}")]
    Unsupported(String),
}

/// Produces the stub tree of one file kind.
pub trait StubBuilder: Send + Sync {
    fn kind(&self) -> FileKind;

    /// Structural version of the trees this builder produces. Bumping it
    /// invalidates every stored stub and index entry.
    fn stub_version(&self) -> u32;

    /// File extensions (without the dot) whose files are of this kind.
    fn extensions(&self) -> &[&str] {
        &[]
    }

    /// Domains this builder contributes to. They join the engine's fixed
    /// domain set at construction.
    fn domains(&self) -> Vec<IndexDomain> {
        Vec::new()
    }

    /// Input filter. Content that is not accepted gets no stub.
    fn accepts(&self, _content: &FileContent) -> bool {
        true
    }

    /// `Ok(None)` means the file has no structural contribution.
    fn build(&self, content: &FileContent) -> Result<Option<StubTree>, BuildError>;
}
