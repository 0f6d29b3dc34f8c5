//! FFmpeg-backed camera
//!
//! Records an FFmpeg input (a V4L2/AVFoundation device or the lavfi test
//! pattern) into the session file. Stopping sends `q` on stdin so FFmpeg
//! finalizes the container before the finish notification goes out.

use super::traits::{
    CameraDevice, CaptureError, CaptureResult, DeviceCapabilities, FinishNotifier, Orientation,
    RecordingFinished,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// How long FFmpeg gets to finalize after `q` before it is killed
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Source FFmpeg reads frames from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FfmpegInput {
    /// Synthetic lavfi test pattern, paced in real time
    TestPattern { width: u32, height: u32, fps: u32 },
    /// Capture device, e.g. `v4l2` + `/dev/video0` or `avfoundation` + `0`
    Device { format: String, device: String },
}

impl FfmpegInput {
    fn args(&self) -> Vec<String> {
        match self {
            FfmpegInput::TestPattern { width, height, fps } => vec![
                "-re".to_string(),
                "-f".to_string(),
                "lavfi".to_string(),
                "-i".to_string(),
                format!("testsrc=size={}x{}:rate={}", width, height, fps),
            ],
            FfmpegInput::Device { format, device } => vec![
                "-f".to_string(),
                format.clone(),
                "-i".to_string(),
                device.clone(),
            ],
        }
    }
}

struct ActiveRecording {
    stop_tx: oneshot::Sender<()>,
    done_rx: oneshot::Receiver<()>,
}

pub struct FfmpegCamera {
    id: String,
    input: FfmpegInput,
    opened: AtomicBool,
    active: Mutex<Option<ActiveRecording>>,
}

impl FfmpegCamera {
    pub fn new(id: impl Into<String>, input: FfmpegInput) -> Self {
        Self {
            id: id.into(),
            input,
            opened: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    /// Drop the active recording if FFmpeg already exited on its own.
    /// Returns whether a recording is still running.
    fn reap_finished(&self) -> bool {
        let mut active = self.active.lock();
        let Some(current) = active.as_mut() else {
            return false;
        };

        match current.done_rx.try_recv() {
            Err(TryRecvError::Empty) => true,
            _ => {
                tracing::debug!("FFmpeg recording already ended, clearing it");
                *active = None;
                false
            }
        }
    }

    /// 720p test pattern at 30fps
    pub fn test_pattern() -> Self {
        Self::new(
            "ffmpeg-testsrc",
            FfmpegInput::TestPattern {
                width: 1280,
                height: 720,
                fps: 30,
            },
        )
    }

    fn record_args(&self, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
        ];
        args.extend(self.input.args());
        args.extend(
            [
                "-c:v",
                "libx264",
                "-preset",
                "ultrafast",
                "-pix_fmt",
                "yuv420p",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(output.to_string_lossy().to_string());
        args
    }
}

/// Wait for either a stop request or FFmpeg exiting on its own.
///
/// Returns the error to report with the finished file, if any.
async fn supervise(mut child: Child, stop_rx: oneshot::Receiver<()>) -> Option<String> {
    let exited: Option<std::io::Result<ExitStatus>> = tokio::select! {
        status = child.wait() => Some(status),
        _ = stop_rx => None,
    };

    if let Some(status) = exited {
        return Some(match status {
            Ok(status) => format!("FFmpeg exited unexpectedly: {}", status),
            Err(e) => format!("Failed to wait for FFmpeg: {}", e),
        });
    }

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(b"q").await {
            tracing::warn!("Failed to send quit to FFmpeg: {}", e);
        }
    }

    match tokio::time::timeout(STOP_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) if status.success() => None,
        Ok(Ok(status)) => Some(format!("FFmpeg exited with {}", status)),
        Ok(Err(e)) => Some(format!("Failed to wait for FFmpeg: {}", e)),
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::error!("Failed to kill FFmpeg: {}", e);
            }
            Some("FFmpeg did not stop in time".to_string())
        }
    }
}

#[async_trait]
impl CameraDevice for FfmpegCamera {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open(&self) -> CaptureResult<DeviceCapabilities> {
        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-version"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| CaptureError::DeviceNotFound(format!("FFmpeg not available: {}", e)))?;

        if !output.success() {
            return Err(CaptureError::DeviceNotFound(format!(
                "FFmpeg probe failed: {}",
                output
            )));
        }

        self.opened.store(true, Ordering::SeqCst);
        tracing::info!("FFmpeg camera {} ready ({:?})", self.id, self.input);

        Ok(DeviceCapabilities {
            min_zoom: 1.0,
            max_zoom: 1.0,
            orientation: Orientation::LandscapeLeft,
        })
    }

    async fn close(&self) {
        if self.active.lock().is_some() {
            if let Err(e) = self.stop_recording().await {
                tracing::warn!("Failed to stop FFmpeg on close: {}", e);
            }
        }
        self.opened.store(false, Ordering::SeqCst);
    }

    async fn start_recording(
        &self,
        output: &Path,
        on_finish: FinishNotifier,
    ) -> CaptureResult<()> {
        if !self.opened.load(Ordering::SeqCst) {
            return Err(CaptureError::NotConfigured);
        }
        if self.reap_finished() {
            return Err(CaptureError::AlreadyRecording);
        }

        let args = self.record_args(output);
        tracing::debug!("Spawning FFmpeg with args: {:?}", args);

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::Capture(format!("Failed to start FFmpeg: {}", e)))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let path = output.to_path_buf();

        tokio::spawn(async move {
            let error = supervise(child, stop_rx).await;
            if let Some(error) = &error {
                tracing::warn!("Recording {:?} finished with error: {}", path, error);
            }
            on_finish.notify(RecordingFinished { path, error });
            let _ = done_tx.send(());
        });

        *self.active.lock() = Some(ActiveRecording { stop_tx, done_rx });
        Ok(())
    }

    async fn stop_recording(&self) -> CaptureResult<()> {
        let active = self.active.lock().take().ok_or(CaptureError::NotRecording)?;

        // The supervisor may already be gone if FFmpeg died on its own
        let _ = active.stop_tx.send(());
        let _ = active.done_rx.await;

        Ok(())
    }
}
