//! Acceleration spike detection

use std::time::Duration;
use tokio::time::Instant;

/// How long an alarm suppresses further triggers
pub const ALARM_HOLD: Duration = Duration::from_secs(3);

/// One accelerometer sample, in g
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Largest absolute component
    pub fn max_axis(&self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }
}

/// Fires once when acceleration crosses the threshold, then holds.
///
/// Also tracks the peak reading, which resets once it has not increased
/// for [`ALARM_HOLD`].
#[derive(Debug)]
pub struct MotionDetector {
    threshold: f64,
    alarm_until: Option<Instant>,
    peak: f64,
    peak_at: Option<Instant>,
}

impl MotionDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            alarm_until: None,
            peak: 0.0,
            peak_at: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    pub fn is_alarmed(&self, now: Instant) -> bool {
        self.alarm_until.is_some_and(|until| now < until)
    }

    /// Feed one sample. Returns true when it should trigger a save.
    pub fn observe(&mut self, sample: Acceleration, now: Instant) -> bool {
        let magnitude = sample.max_axis();
        self.track_peak(magnitude, now);

        if magnitude <= self.threshold || self.is_alarmed(now) {
            return false;
        }

        self.alarm_until = Some(now + ALARM_HOLD);
        true
    }

    fn track_peak(&mut self, magnitude: f64, now: Instant) {
        if let Some(at) = self.peak_at {
            if now.duration_since(at) >= ALARM_HOLD {
                self.peak = 0.0;
                self.peak_at = None;
            }
        }

        if magnitude > self.peak {
            self.peak = magnitude;
            self.peak_at = Some(now);
        }
    }
}
