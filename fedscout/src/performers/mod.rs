//! Performers shipped with the engine.
//!
//! Real deployments plug in their own backends by implementing
//! [`SearchPerformer`](crate::search::SearchPerformer); these two cover
//! tests, benchmarks and the command-line tool.

pub mod fixed;
pub mod local_files;

pub use fixed::StaticPerformer;
pub use local_files::LocalFilesPerformer;
