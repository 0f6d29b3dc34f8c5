//! Capture session
//!
//! Resource manager for one camera: open/close, and the raw start/stop
//! primitives. At most one physical recording exists at any instant.

use super::traits::{
    CameraDevice, CaptureError, CaptureResult, DeviceCapabilities, FinishNotifier,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Extension used for physical recordings
pub const RECORDING_EXTENSION: &str = "mp4";

pub struct CaptureSession {
    camera: Arc<dyn CameraDevice>,

    /// Directory new recordings are written into
    output_dir: PathBuf,

    /// Set while the device is open
    capabilities: Option<DeviceCapabilities>,

    /// File the device is currently writing to
    active_output: Option<PathBuf>,

    zoom: f64,
}

impl CaptureSession {
    pub fn new(camera: Arc<dyn CameraDevice>, output_dir: PathBuf) -> Self {
        Self {
            camera,
            output_dir,
            capabilities: None,
            active_output: None,
            zoom: 1.0,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.capabilities.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.active_output.is_some()
    }

    pub fn active_output(&self) -> Option<&Path> {
        self.active_output.as_deref()
    }


    /// Open the camera if it is not open yet
    pub async fn configure(&mut self) -> CaptureResult<()> {
        if self.is_configured() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;

        tracing::info!("Opening camera: {}", self.camera.id());
        let capabilities = self.camera.open().await?;
        self.zoom = capabilities.clamp_zoom(self.zoom);
        self.capabilities = Some(capabilities);

        Ok(())
    }

    /// Begin a new physical recording to a fresh file
    pub async fn start(&mut self, on_finish: FinishNotifier) -> CaptureResult<PathBuf> {
        if !self.is_configured() {
            return Err(CaptureError::NotConfigured);
        }
        if let Some(active) = &self.active_output {
            tracing::warn!("Refusing to start: still recording to {:?}", active);
            return Err(CaptureError::AlreadyRecording);
        }

        let output = self
            .output_dir
            .join(format!("recording-{}.{}", Uuid::new_v4(), RECORDING_EXTENSION));

        self.camera.start_recording(&output, on_finish).await?;
        tracing::debug!("Recording to {:?}", output);
        self.active_output = Some(output.clone());

        Ok(output)
    }

    /// Stop the current physical recording, returning the file it wrote
    pub async fn stop(&mut self) -> CaptureResult<PathBuf> {
        let output = self.active_output.take().ok_or(CaptureError::NotRecording)?;
        self.camera.stop_recording().await?;
        tracing::debug!("Stopped recording to {:?}", output);
        Ok(output)
    }

    /// Forget the active recording after the device stopped it on its own
    pub fn mark_stopped(&mut self) -> Option<PathBuf> {
        let output = self.active_output.take()?;
        tracing::warn!("Device stopped recording to {:?} on its own", output);
        Some(output)
    }

    /// Stop any recording and close the camera.
    ///
    /// Returns the file that was being written, if any.
    pub async fn teardown(&mut self) -> Option<PathBuf> {
        let abandoned = if self.is_recording() {
            match self.stop().await {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Failed to stop recording during teardown: {}", e);
                    None
                }
            }
        } else {
            None
        };

        if self.is_configured() {
            tracing::info!("Closing camera: {}", self.camera.id());
            self.camera.close().await;
            self.capabilities = None;
        }

        abandoned
    }

    /// Set the zoom factor within the device range
    pub fn set_zoom(&mut self, factor: f64) -> f64 {
        let capabilities = self.capabilities.unwrap_or_default();
        self.zoom = capabilities.clamp_zoom(factor);
        self.zoom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCamera;
    use tempfile::tempdir;

    fn notifier() -> FinishNotifier {
        FinishNotifier::new(|_| {})
    }

    #[tokio::test]
    async fn test_start_requires_configure() {
        let dir = tempdir().unwrap();
        let camera = Arc::new(FakeCamera::new());
        let mut session = CaptureSession::new(camera, dir.path().to_path_buf());

        assert!(matches!(
            session.start(notifier()).await,
            Err(CaptureError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_single_active_recording() {
        let dir = tempdir().unwrap();
        let camera = Arc::new(FakeCamera::new());
        let mut session = CaptureSession::new(camera.clone(), dir.path().to_path_buf());

        session.configure().await.unwrap();
        let first = session.start(notifier()).await.unwrap();
        assert!(first.starts_with(dir.path()));
        assert!(matches!(
            session.start(notifier()).await,
            Err(CaptureError::AlreadyRecording)
        ));

        let stopped = session.stop().await.unwrap();
        assert_eq!(stopped, first);
        assert!(!session.is_recording());

        let second = session.start(notifier()).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(camera.starts(), 2);
    }

    #[tokio::test]
    async fn test_configure_is_idempotent() {
        let dir = tempdir().unwrap();
        let camera = Arc::new(FakeCamera::new());
        let mut session = CaptureSession::new(camera.clone(), dir.path().to_path_buf());

        session.configure().await.unwrap();
        session.configure().await.unwrap();
        assert_eq!(camera.opens(), 1);
    }

    #[tokio::test]
    async fn test_teardown_returns_abandoned_file() {
        let dir = tempdir().unwrap();
        let camera = Arc::new(FakeCamera::new());
        let mut session = CaptureSession::new(camera.clone(), dir.path().to_path_buf());

        session.configure().await.unwrap();
        let output = session.start(notifier()).await.unwrap();

        assert_eq!(session.teardown().await, Some(output));
        assert!(!session.is_configured());
        assert_eq!(camera.closes(), 1);
        assert_eq!(session.teardown().await, None);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_session_unconfigured() {
        let dir = tempdir().unwrap();
        let camera = Arc::new(FakeCamera::new());
        camera.fail_open(true);
        let mut session = CaptureSession::new(camera, dir.path().to_path_buf());

        assert!(session.configure().await.is_err());
        assert!(!session.is_configured());
    }

    #[tokio::test]
    async fn test_mark_stopped_forgets_output() {
        let dir = tempdir().unwrap();
        let camera = Arc::new(FakeCamera::new());
        let mut session = CaptureSession::new(camera.clone(), dir.path().to_path_buf());
        session.configure().await.unwrap();
        let output = session.start(notifier()).await.unwrap();

        assert_eq!(session.active_output(), Some(output.as_path()));
        assert_eq!(session.mark_stopped(), Some(output));
        assert_eq!(session.active_output(), None);
        assert_eq!(session.mark_stopped(), None);
        assert!(matches!(session.stop().await, Err(CaptureError::NotRecording)));
        assert_eq!(camera.stops(), 0);

        // A fresh recording can start straight away
        session.start(notifier()).await.unwrap();
        assert_eq!(camera.starts(), 2);
    }

    #[tokio::test]
    async fn test_zoom_clamped_to_device_range() {
        let dir = tempdir().unwrap();
        let camera = Arc::new(FakeCamera::new());
        let mut session = CaptureSession::new(camera, dir.path().to_path_buf());
        session.configure().await.unwrap();

        assert_eq!(session.set_zoom(3.0), 3.0);
        assert_eq!(session.set_zoom(99.0), 5.0);
    }
}
