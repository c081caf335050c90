pub mod domain;
pub mod file;
pub mod occurrence;
pub mod stub;

pub use domain::*;
pub use file::*;
pub use occurrence::*;
pub use stub::*;
