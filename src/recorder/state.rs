//! Recording state management
//!
//! The loop's state machine. [`RecordingState::next`] is the complete
//! transition table; anything it does not list is a guard violation.

use crate::utils::ErrorResponse;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Current state of the recording loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingState {
    /// Camera closed, nothing recording
    #[default]
    NotStarted,
    /// Recording, filling the pre-roll
    PreRecording,
    /// Recording with a full pre-roll; a trigger yields a complete clip
    Ready,
    /// Save requested, filling the post-roll
    PostRecording,
    /// Trimming and saving the last recording
    TransferringToLibrary,
}

/// Inputs that move the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Start (or re-arm) recording
    Start,
    /// Save the current moment
    Stop,
    /// The pre-roll timer ran out
    PhaseComplete,
    /// The physical recording was finalized after the post-roll
    PhysicalStop,
    /// Explicit session teardown
    SessionStop,
}

impl Trigger {
    pub fn name(self) -> &'static str {
        match self {
            Trigger::Start => "start",
            Trigger::Stop => "stop",
            Trigger::PhaseComplete => "phase complete",
            Trigger::PhysicalStop => "physical stop",
            Trigger::SessionStop => "session stop",
        }
    }
}

impl RecordingState {
    pub const ALL: [RecordingState; 5] = [
        RecordingState::NotStarted,
        RecordingState::PreRecording,
        RecordingState::Ready,
        RecordingState::PostRecording,
        RecordingState::TransferringToLibrary,
    ];

    /// State reached by applying `trigger`, or `None` if not permitted
    pub fn next(self, trigger: Trigger) -> Option<RecordingState> {
        use RecordingState::*;

        match (self, trigger) {
            (_, Trigger::SessionStop) => Some(NotStarted),
            (NotStarted | TransferringToLibrary, Trigger::Start) => Some(PreRecording),
            (PreRecording, Trigger::PhaseComplete) => Some(Ready),
            (Ready, Trigger::Stop) => Some(PostRecording),
            (PostRecording, Trigger::PhysicalStop) => Some(TransferringToLibrary),
            (PreRecording | Ready | PostRecording, Trigger::Start)
            | (NotStarted | Ready | PostRecording | TransferringToLibrary, Trigger::PhaseComplete)
            | (NotStarted | PreRecording | PostRecording | TransferringToLibrary, Trigger::Stop)
            | (NotStarted | PreRecording | Ready | TransferringToLibrary, Trigger::PhysicalStop) => {
                None
            }
        }
    }

    pub fn accepts_start(self) -> bool {
        self.next(Trigger::Start).is_some()
    }

    pub fn accepts_stop(self) -> bool {
        self.next(Trigger::Stop).is_some()
    }
}

/// Events published to observers
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// The loop moved to a new state
    StateChanged(RecordingState),
    /// Phase progress in [0, 1]
    Progress(f64),
    /// A clip reached the media library
    ClipSaved { clip: PathBuf, duration: Duration },
    /// Something failed; the loop carries on
    Error(ErrorResponse),
}
