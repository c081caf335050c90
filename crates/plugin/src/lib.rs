pub mod builder;
pub mod codec;
pub mod interner;
pub mod storage;

pub use builder::{BuildError, StubBuilder};
pub use codec::StubCodec;
pub use interner::NameInterner;
pub use storage::{KvBackend, VersionStampStore};
