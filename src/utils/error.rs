//! Error types and handling
//!
//! Common error taxonomy shared by the recording loop. Nothing in here is
//! fatal to the process: every variant is either surfaced to observers or
//! logged, and the loop keeps going.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::export::ExportError;
use crate::library::SaveError;
use crate::recorder::RecordingState;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Camera unusable. Surfaced to the UI, never retried by the loop.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Camera open/configure/start failed. The next external start retries.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Trim failed. The clip is skipped and recording re-arms.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Library write failed. Logged only.
    #[error("Save error: {0}")]
    Save(#[from] SaveError),

    /// A trigger arrived in a state that does not accept it.
    #[error("{action} ignored while {state:?}")]
    GuardViolation {
        action: &'static str,
        state: RecordingState,
    },
}

impl AppError {
    /// Stable code for observers
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            AppError::Export(_) => "EXPORT_ERROR",
            AppError::Save(_) => "SAVE_ERROR",
            AppError::GuardViolation { .. } => "GUARD_VIOLATION",
        }
    }
}

impl From<CaptureError> for AppError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::PermissionDenied(message) => AppError::PermissionDenied(message),
            other => AppError::DeviceUnavailable(other.to_string()),
        }
    }
}

/// Error payload published to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
