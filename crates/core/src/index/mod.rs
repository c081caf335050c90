pub mod domain;
pub mod set;

pub use domain::DomainState;
pub use set::{DomainLockSet, DomainReadGuard, DomainWriteGuard, StubIndexSet};
