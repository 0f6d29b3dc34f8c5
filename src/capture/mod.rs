//! Camera capture
//!
//! The capture session owns the camera handle and the single file currently
//! being written. It holds no loop logic; the recorder drives it.

pub mod ffmpeg;
pub mod session;
pub mod traits;

pub use ffmpeg::{FfmpegCamera, FfmpegInput};
pub use session::CaptureSession;
pub use traits::{
    AuthorizationStatus, CameraAuthorization, CameraDevice, CaptureError, CaptureResult,
    DeviceCapabilities, FinishNotifier, Orientation, RecordingFinished,
};
