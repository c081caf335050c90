use crate::interner::NameInterner;
use stubdex_api::{Result, StubTree};

/// Byte format of a stored stub tree.
///
/// Both directions depend on the interner state, so callers check the
/// interner for corruption before using a codec.
pub trait StubCodec: Send + Sync {
    fn serialize(&self, tree: &StubTree, names: &dyn NameInterner) -> Result<Vec<u8>>;

    /// Decode bytes written by `serialize`. Failures are reported as
    /// `StubIndexError::Deserialize`.
    fn deserialize(&self, bytes: &[u8], names: &dyn NameInterner) -> Result<StubTree>;
}
