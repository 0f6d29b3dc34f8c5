//! Loop recorder
//!
//! This module implements the rolling capture loop:
//! - RecordingState machine and its transition table
//! - SegmentTimer driving the pre-roll and post-roll phases
//! - Watchdog bounding the length of one physical recording
//! - RecordingController tying capture, trimming and saving together

pub mod controller;
pub mod state;
pub mod timer;
pub mod watchdog;

pub use controller::{Collaborators, RecorderHandle, RecordingController};
pub use state::{RecorderEvent, RecordingState, Trigger};
pub use timer::SegmentTimer;
pub use watchdog::Watchdog;
