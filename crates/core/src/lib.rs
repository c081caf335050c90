pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod names;
pub mod runtime;
pub mod storage;
pub mod stub_value;

pub use codec::InternedStubCodec;
pub use config::{EngineConfig, LockScope};
pub use error::{Result, StubIndexError};
pub use index::StubIndexSet;
pub use names::NameStorage;
pub use runtime::{EngineStats, StubIndexEngine, StubIndexEngineBuilder, UpdateOutcome};
pub use stub_value::StubValue;
