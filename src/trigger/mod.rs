//! Automatic save triggers
//!
//! Sensor-driven sources that ask the recorder to keep the current moment.
//! Each one owns its own detection state and only ever calls
//! [`RecorderHandle::stop_recording`]; the recorder decides whether the
//! request is actionable.

pub mod motion;
pub mod speed_limit;

pub use motion::{Acceleration, MotionDetector};
pub use speed_limit::{
    read_speed_limit, speed_limit_candidate, SpeedLimitMonitor, TextCandidate, TextObservation,
};

use crate::recorder::RecorderHandle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Input for the speed trigger
#[derive(Debug, Clone)]
pub enum SpeedInput {
    /// Text recognized in one camera frame
    Sign(Vec<TextObservation>),
    /// Current speed in km/h
    Speed(f64),
}

/// Ask the recorder to keep the current moment
fn request_save(handle: &RecorderHandle, reason: std::fmt::Arguments<'_>) {
    let state = handle.state();
    if state.accepts_stop() {
        tracing::info!("{}, requesting save", reason);
    } else {
        tracing::debug!("{} while {:?}, not armed", reason, state);
    }
    handle.stop_recording();
}

/// Forward acceleration samples into save requests until the sender closes.
///
/// The threshold follows `motionThreshold` from the recorder's configuration.
pub fn spawn_motion_trigger(
    handle: RecorderHandle,
    mut samples: mpsc::Receiver<Acceleration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut config = handle.watch_config();
        let mut detector = MotionDetector::new(config.borrow_and_update().motion_threshold);

        loop {
            tokio::select! {
                changed = config.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let threshold = config.borrow_and_update().motion_threshold;
                    if threshold != detector.threshold() {
                        tracing::debug!(
                            "Motion threshold {:.2}g -> {:.2}g",
                            detector.threshold(),
                            threshold
                        );
                        detector.set_threshold(threshold);
                    }
                }
                sample = samples.recv() => {
                    let Some(sample) = sample else { break };
                    if detector.observe(sample, Instant::now()) {
                        request_save(
                            &handle,
                            format_args!(
                                "Motion spike of {:.2}g (peak {:.2}g)",
                                sample.max_axis(),
                                detector.peak()
                            ),
                        );
                    }
                }
            }
        }
        tracing::debug!("Motion trigger stopped");
    })
}

/// Forward sign reads and speed updates into save requests.
///
/// Enabled while `speedSignDetection` is set in the recorder's configuration.
pub fn spawn_speed_trigger(
    handle: RecorderHandle,
    mut inputs: mpsc::Receiver<SpeedInput>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut config = handle.watch_config();
        let mut monitor = SpeedLimitMonitor::new(config.borrow_and_update().speed_sign_detection);

        loop {
            tokio::select! {
                changed = config.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let enabled = config.borrow_and_update().speed_sign_detection;
                    monitor.set_enabled(enabled);
                }
                input = inputs.recv() => {
                    let Some(input) = input else { break };
                    match input {
                        SpeedInput::Sign(observations) => {
                            monitor.observe_sign(&observations);
                        }
                        SpeedInput::Speed(kmh) => {
                            if monitor.observe_speed(kmh) {
                                request_save(
                                    &handle,
                                    format_args!(
                                        "Speed {:.0} km/h over posted {:?}",
                                        kmh,
                                        monitor.posted_limit()
                                    ),
                                );
                            }
                        }
                    }
                }
            }
        }
        tracing::debug!("Speed trigger stopped");
    })
}
