//! Media library and scratch storage
//!
//! Where finished clips go, and where everything in between lives.

pub mod scratch;
pub mod sink;

pub use scratch::{ScratchStore, TempDirStore};
pub use sink::{DirectoryLibrary, MediaSink, SaveError};
