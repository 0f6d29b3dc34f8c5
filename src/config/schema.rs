//! Configuration schema
//!
//! Field names match the JSON written by the settings panel.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::store::ConfigError;

// =============================================================================
// Defaults
// =============================================================================

pub const DEFAULT_PRE_ROLL_SECS: f64 = 5.0;
pub const DEFAULT_POST_ROLL_SECS: f64 = 5.0;
pub const DEFAULT_MOTION_THRESHOLD: f64 = 2.0;
pub const DEFAULT_MAX_SESSION_SECS: u64 = 5 * 60;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

// =============================================================================
// Limits
// =============================================================================

/// Longest pre-roll or post-roll accepted
pub const MAX_ROLL_SECS: f64 = 60.0 * 60.0;
/// Longest physical recording the watchdog may allow
pub const MAX_SESSION_SECS: u64 = 24 * 60 * 60;
pub const MAX_TICK_INTERVAL_MS: u64 = 60 * 1000;

fn default_pre_roll_secs() -> f64 {
    DEFAULT_PRE_ROLL_SECS
}

fn default_post_roll_secs() -> f64 {
    DEFAULT_POST_ROLL_SECS
}

fn default_motion_threshold() -> f64 {
    DEFAULT_MOTION_THRESHOLD
}

fn default_speed_sign_detection() -> bool {
    true
}

fn default_max_session_secs() -> u64 {
    DEFAULT_MAX_SESSION_SECS
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

// =============================================================================
// Loop Config
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopConfig {
    /// Seconds captured before a trigger may arm a save
    #[serde(default = "default_pre_roll_secs")]
    pub pre_roll_secs: f64,

    /// Seconds captured after a save is requested
    #[serde(default = "default_post_roll_secs")]
    pub post_roll_secs: f64,

    /// Acceleration (in g) above which the motion trigger fires
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: f64,

    /// Whether the posted speed-limit trigger is active
    #[serde(default = "default_speed_sign_detection")]
    pub speed_sign_detection: bool,

    /// Wall-clock length after which the watchdog forces a fresh session
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: u64,

    /// Progress timer resolution
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            pre_roll_secs: DEFAULT_PRE_ROLL_SECS,
            post_roll_secs: DEFAULT_POST_ROLL_SECS,
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
            speed_sign_detection: true,
            max_session_secs: DEFAULT_MAX_SESSION_SECS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl LoopConfig {
    pub fn pre_roll(&self) -> Duration {
        Duration::from_secs_f64(self.pre_roll_secs)
    }

    pub fn post_roll(&self) -> Duration {
        Duration::from_secs_f64(self.post_roll_secs)
    }

    /// Trailing window kept from each finished recording (pre + post roll)
    pub fn clip_window(&self) -> Duration {
        self.pre_roll() + self.post_roll()
    }

    pub fn max_session(&self) -> Duration {
        Duration::from_secs(self.max_session_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject values the loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("preRollSecs", self.pre_roll_secs),
            ("postRollSecs", self.post_roll_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
            if value > MAX_ROLL_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{} must be at most {}, got {}",
                    name, MAX_ROLL_SECS, value
                )));
            }
        }

        if !self.motion_threshold.is_finite() || self.motion_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "motionThreshold must be positive, got {}",
                self.motion_threshold
            )));
        }

        if !(1..=MAX_SESSION_SECS).contains(&self.max_session_secs) {
            return Err(ConfigError::Invalid(format!(
                "maxSessionSecs must be between 1 and {}, got {}",
                MAX_SESSION_SECS, self.max_session_secs
            )));
        }

        if !(1..=MAX_TICK_INTERVAL_MS).contains(&self.tick_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "tickIntervalMs must be between 1 and {}, got {}",
                MAX_TICK_INTERVAL_MS, self.tick_interval_ms
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LoopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.clip_window(), Duration::from_secs(10));
        assert_eq!(config.max_session(), Duration::from_secs(300));
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: LoopConfig = serde_json::from_str(r#"{"preRollSecs": 8.0}"#).unwrap();
        assert_eq!(config.pre_roll_secs, 8.0);
        assert_eq!(config.post_roll_secs, DEFAULT_POST_ROLL_SECS);
        assert!(config.speed_sign_detection);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = LoopConfig {
            pre_roll_secs: -1.0,
            ..LoopConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = LoopConfig {
            post_roll_secs: f64::NAN,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LoopConfig {
            tick_interval_ms: 0,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LoopConfig {
            motion_threshold: 0.0,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_values_too_large_for_timers() {
        let config = LoopConfig {
            pre_roll_secs: 1e20,
            ..LoopConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = LoopConfig {
            post_roll_secs: MAX_ROLL_SECS + 1.0,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LoopConfig {
            max_session_secs: u64::MAX,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LoopConfig {
            tick_interval_ms: u64::MAX,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limits_are_valid() {
        let config = LoopConfig {
            pre_roll_secs: MAX_ROLL_SECS,
            post_roll_secs: MAX_ROLL_SECS,
            max_session_secs: MAX_SESSION_SECS,
            tick_interval_ms: MAX_TICK_INTERVAL_MS,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.clip_window(), Duration::from_secs(2 * 60 * 60));
    }
}
