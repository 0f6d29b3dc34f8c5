//! Trailing-window trimmer

use super::types::{ExportError, TrailingWindow, TrimmedClip};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Extension used for trimmed clips
pub const CLIP_EXTENSION: &str = "mp4";

/// The media engine that actually reads and writes video files
#[async_trait]
pub trait ExportEngine: Send + Sync {
    /// Duration of the media at `source`
    async fn probe_duration(&self, source: &Path) -> Result<Duration, ExportError>;

    /// Write `window` of `source` to `destination`
    async fn export(
        &self,
        source: &Path,
        window: TrailingWindow,
        destination: &Path,
    ) -> Result<(), ExportError>;
}

/// Window covering the last `requested` of a source `available` long.
///
/// Requests longer than the source clamp to the whole source.
pub fn trailing_window(
    requested: Duration,
    available: Duration,
) -> Option<TrailingWindow> {
    if available.is_zero() {
        return None;
    }
    let length = requested.min(available);
    Some(TrailingWindow {
        start: available - length,
        length,
    })
}

pub struct ClipTrimmer {
    engine: Arc<dyn ExportEngine>,
    output_dir: PathBuf,
}

impl ClipTrimmer {
    pub fn new(engine: Arc<dyn ExportEngine>, output_dir: PathBuf) -> Self {
        Self { engine, output_dir }
    }

    /// Produce a new file holding the last `duration` of `source`
    pub async fn trim_trailing(
        &self,
        duration: Duration,
        source: &Path,
    ) -> Result<TrimmedClip, ExportError> {
        if tokio::fs::metadata(source).await.is_err() {
            return Err(ExportError::SourceMissing(source.to_path_buf()));
        }

        let available = self.engine.probe_duration(source).await?;
        let window = trailing_window(duration, available)
            .ok_or_else(|| ExportError::EmptySource(source.to_path_buf()))?;

        if window.length < duration {
            tracing::info!(
                "Requested {:.1}s but {:?} only holds {:.1}s, keeping all of it",
                duration.as_secs_f64(),
                source,
                available.as_secs_f64()
            );
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let destination = self
            .output_dir
            .join(format!("clip-{}.{}", Uuid::new_v4(), CLIP_EXTENSION));

        tracing::info!(
            "Trimming {:?} [{:.1}s..{:.1}s] -> {:?}",
            source,
            window.start_secs(),
            window.end().as_secs_f64(),
            destination
        );

        if let Err(e) = self.engine.export(source, window, &destination).await {
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(e);
        }

        if tokio::fs::metadata(&destination).await.is_err() {
            return Err(ExportError::Ffmpeg(format!(
                "Export reported success but {:?} was not written",
                destination
            )));
        }

        Ok(TrimmedClip {
            path: destination,
            duration: window.length,
        })
    }
}
