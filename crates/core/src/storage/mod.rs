pub mod backend;
pub mod persist;
pub mod primary;
pub mod versions;

pub use backend::{DiskBackend, MemoryBackend};
pub use primary::{OverlayStore, PrimaryStore, PrimaryWriteGuard, StubStorage};
pub use versions::{FileVersionStamps, MemoryVersionStamps};
