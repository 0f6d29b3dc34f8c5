//! Capture trait definitions
//!
//! Platform-agnostic seams for the camera. The recording loop only ever sees
//! these traits; real devices and test doubles both implement them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by the capture layer
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Capture session is not configured")]
    NotConfigured,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Camera authorization as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
}

/// Query and request camera access
#[async_trait]
pub trait CameraAuthorization: Send + Sync {
    /// Current authorization without prompting
    fn status(&self) -> AuthorizationStatus;

    /// Prompt for access; resolves to whether it was granted
    async fn request_access(&self) -> bool;
}

/// Capture orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

/// Constraints reported by an opened device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub orientation: Orientation,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 1.0,
            orientation: Orientation::Portrait,
        }
    }
}

impl DeviceCapabilities {
    pub fn clamp_zoom(&self, factor: f64) -> f64 {
        if factor.is_nan() {
            return self.min_zoom;
        }
        factor.clamp(self.min_zoom, self.max_zoom)
    }
}

/// Platform report that a physical recording has been finalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingFinished {
    /// File the device was writing to
    pub path: PathBuf,
    /// Set when the device stopped abnormally
    pub error: Option<String>,
}

/// Delivers [`RecordingFinished`] back to whoever started the recording.
///
/// Devices call this from their own threads; the receiving side is expected
/// to queue the message rather than act on it inline.
#[derive(Clone)]
pub struct FinishNotifier {
    deliver: Arc<dyn Fn(RecordingFinished) + Send + Sync>,
}

impl FinishNotifier {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(RecordingFinished) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn notify(&self, finished: RecordingFinished) {
        (self.deliver)(finished)
    }
}

impl fmt::Debug for FinishNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FinishNotifier")
    }
}

/// A camera that records to a file.
///
/// `stop_recording` resolves once the device has stopped writing; the
/// finalized file is reported separately through the [`FinishNotifier`]
/// handed to `start_recording`.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Device identifier used in logs
    fn id(&self) -> &str;

    /// Open and configure the device
    async fn open(&self) -> CaptureResult<DeviceCapabilities>;

    /// Release the device. Stops any recording first.
    async fn close(&self);

    /// Begin writing a new physical recording to `output`
    async fn start_recording(&self, output: &Path, on_finish: FinishNotifier)
        -> CaptureResult<()>;

    /// Stop the current physical recording
    async fn stop_recording(&self) -> CaptureResult<()>;
}
