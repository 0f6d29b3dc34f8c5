//! Posted speed limit from recognized text

use std::collections::HashMap;

/// Candidates considered per observation
pub const MAX_CANDIDATES: usize = 10;

/// Minimum recognition confidence for a candidate to count
pub const MIN_CONFIDENCE: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct TextCandidate {
    pub text: String,
    pub confidence: f32,
}

impl TextCandidate {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// One recognized text region, candidates ordered best first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextObservation {
    pub candidates: Vec<TextCandidate>,
}

/// Parse text as a plausible posted limit: 10 to 130 in steps of 10
pub fn speed_limit_candidate(text: &str) -> Option<u32> {
    let value: u32 = text.trim().parse().ok()?;
    ((10..=130).contains(&value) && value % 10 == 0).then_some(value)
}

/// The most frequently read limit across all observations.
///
/// Ties go to the limit that was read first.
pub fn read_speed_limit(observations: &[TextObservation]) -> Option<u32> {
    let mut counts: HashMap<u32, (usize, usize)> = HashMap::new();
    let mut order = 0;

    let readings = observations
        .iter()
        .flat_map(|observation| observation.candidates.iter().take(MAX_CANDIDATES))
        .filter(|candidate| candidate.confidence > MIN_CONFIDENCE)
        .filter_map(|candidate| speed_limit_candidate(&candidate.text));

    for value in readings {
        let entry = counts.entry(value).or_insert((0, order));
        entry.0 += 1;
        order += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (a_count, a_first)), (_, (b_count, b_first))| {
            a_count.cmp(b_count).then(b_first.cmp(a_first))
        })
        .map(|(value, _)| value)
}

/// Tracks the posted limit and fires once each time speed goes over it
#[derive(Debug, Default)]
pub struct SpeedLimitMonitor {
    enabled: bool,
    posted_limit: Option<u32>,
    over_limit: bool,
}

impl SpeedLimitMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn posted_limit(&self) -> Option<u32> {
        self.posted_limit
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.over_limit = false;
        }
    }

    /// Update the posted limit from one frame's text. Frames without a
    /// readable sign keep the previous limit.
    pub fn observe_sign(&mut self, observations: &[TextObservation]) -> Option<u32> {
        if !self.enabled {
            return None;
        }

        let limit = read_speed_limit(observations)?;
        if self.posted_limit != Some(limit) {
            tracing::debug!("Posted speed limit: {} km/h", limit);
            self.posted_limit = Some(limit);
        }
        Some(limit)
    }

    /// Returns true on the sample that first exceeds the posted limit
    pub fn observe_speed(&mut self, kmh: f64) -> bool {
        let Some(limit) = self.posted_limit.filter(|_| self.enabled) else {
            return false;
        };

        let over = kmh > f64::from(limit);
        let crossed = over && !self.over_limit;
        self.over_limit = over;
        crossed
    }
}
