//! FFmpeg export engine
//!
//! Probes durations with ffprobe and cuts windows with ffmpeg. By default
//! the cut is a stream copy (fast, snaps to keyframes); `reencode` trades
//! speed for frame-accurate boundaries.

use crate::export::trimmer::ExportEngine;
use crate::export::types::{ExportError, TrailingWindow};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    reencode: bool,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-encode instead of stream copy
    pub fn reencoding() -> Self {
        Self { reencode: true }
    }

    fn trim_args(&self, source: &Path, window: TrailingWindow, destination: &Path) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", window.start_secs()),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
            "-t".to_string(),
            format!("{:.3}", window.length_secs()),
        ];

        if self.reencode {
            args.extend(
                ["-c:v", "libx264", "-preset", "veryfast", "-pix_fmt", "yuv420p", "-an"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        } else {
            args.extend(["-c", "copy"].iter().map(|s| s.to_string()));
        }

        args.extend(["-movflags", "+faststart"].iter().map(|s| s.to_string()));
        args.push(destination.to_string_lossy().to_string());
        args
    }
}

/// Parse ffprobe's `format=duration` output (seconds, as text)
fn parse_duration(stdout: &str) -> Result<Duration, ExportError> {
    let text = stdout.trim();
    let secs: f64 = text
        .parse()
        .map_err(|_| ExportError::Probe(format!("Unexpected ffprobe output: {:?}", text)))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(ExportError::Probe(format!("Invalid duration: {}", secs)));
    }

    Ok(Duration::from_secs_f64(secs))
}

#[async_trait]
impl ExportEngine for FfmpegEngine {
    async fn probe_duration(&self, source: &Path) -> Result<Duration, ExportError> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "csv=p=0",
            ])
            .arg(source)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExportError::Ffmpeg(format!("Failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::Probe(format!("ffprobe failed: {}", stderr.trim())));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn export(
        &self,
        source: &Path,
        window: TrailingWindow,
        destination: &Path,
    ) -> Result<(), ExportError> {
        let args = self.trim_args(source, window, destination);
        tracing::debug!("FFmpeg trim args: {:?}", args);

        let output = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExportError::Ffmpeg(format!("Failed to start FFmpeg: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }

        // Killed by a signal rather than exiting with an error
        if output.status.code().is_none() {
            return Err(ExportError::Cancelled);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ExportError::Ffmpeg(format!(
            "FFmpeg trim failed ({}): {}",
            output.status,
            stderr.trim()
        )))
    }
}
