//! Export types
//!
//! Values handed between the recorder and the trimmer, and the error type
//! for everything that can go wrong while cutting a clip.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A finished recording waiting to be trimmed.
///
/// Created when a physical recording stops and consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSegment {
    pub source_file: PathBuf,
    pub requested_window: Duration,
}

/// Section of the source to keep, measured from its start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingWindow {
    pub start: Duration,
    pub length: Duration,
}

impl TrailingWindow {
    pub fn end(&self) -> Duration {
        self.start + self.length
    }

    /// Start offset in seconds for FFmpeg
    pub fn start_secs(&self) -> f64 {
        self.start.as_secs_f64()
    }

    /// Length in seconds for FFmpeg
    pub fn length_secs(&self) -> f64 {
        self.length.as_secs_f64()
    }
}

/// A trimmed clip at a fresh temporary path. The caller owns the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimmedClip {
    pub path: PathBuf,
    pub duration: Duration,
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Source recording not found: {0:?}")]
    SourceMissing(PathBuf),

    #[error("Source recording is empty: {0:?}")]
    EmptySource(PathBuf),

    #[error("Failed to probe source: {0}")]
    Probe(String),

    #[error("Export cancelled")]
    Cancelled,
}
