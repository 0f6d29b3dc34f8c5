//! Clip export module
//!
//! Cuts the trailing window out of a finished recording. The cut itself is
//! delegated to an [`ExportEngine`]; [`ClipTrimmer`] owns the window math and
//! the output file naming.

pub mod ffmpeg;
pub mod trimmer;
pub mod types;

pub use ffmpeg::FfmpegEngine;
pub use trimmer::{trailing_window, ClipTrimmer, ExportEngine};
pub use types::{ExportError, PendingSegment, TrailingWindow, TrimmedClip};
