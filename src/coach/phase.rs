use serde::Serialize;

use crate::config::PhaseConfig;

/// Stage of one repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepPhase {
    #[default]
    Standing,
    Descending,
    Bottom,
    Ascending,
}

impl RepPhase {
    /// Anything but idle standing
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Standing)
    }
}

/// Knee-angle trigger points, degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseThresholds {
    /// Above this the leg counts as extended
    pub up_threshold: f32,
    /// Fully flexed band [down_min, down_max]
    pub down_min: f32,
    pub down_max: f32,
}

impl PhaseThresholds {
    pub fn from_config(config: &PhaseConfig) -> Self {
        Self {
            up_threshold: config.up_threshold,
            down_min: config.down_min,
            down_max: config.down_max,
        }
    }

    pub fn in_down_range(&self, angle: f32) -> bool {
        (self.down_min..=self.down_max).contains(&angle)
    }
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self::from_config(&PhaseConfig::default())
    }
}

/// Emitted when a full cycle returns to standing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepEvent {
    /// Counted; carries the new total
    Counted { total: u32 },
    /// Full cycle, but too soon after the previous counted rep
    TooFast { since_last_ms: u64 },
}

/// Rep state machine over the knee angle.
///
/// STANDING → DESCENDING → BOTTOM → ASCENDING → STANDING, counting one rep
/// on the final edge only. There is no shortcut back to STANDING, so an
/// aborted descent never earns credit. Several edges may fire on one
/// sample when the angle jumps between frames.
#[derive(Debug, Clone)]
pub struct RepClassifier {
    thresholds: PhaseThresholds,
    min_rep_interval_ms: u64,
    phase: RepPhase,
    completed_reps: u32,
    last_rep_ms: Option<u64>,
}

impl RepClassifier {
    pub fn new(thresholds: PhaseThresholds) -> Self {
        Self {
            thresholds,
            min_rep_interval_ms: 0,
            phase: RepPhase::Standing,
            completed_reps: 0,
            last_rep_ms: None,
        }
    }

    pub fn from_config(config: &PhaseConfig) -> Self {
        Self::new(PhaseThresholds::from_config(config))
            .with_min_rep_interval(config.min_rep_interval_ms)
    }

    pub fn with_min_rep_interval(mut self, ms: u64) -> Self {
        self.min_rep_interval_ms = ms;
        self
    }

    pub fn phase(&self) -> RepPhase {
        self.phase
    }

    pub fn completed_reps(&self) -> u32 {
        self.completed_reps
    }

    pub fn thresholds(&self) -> &PhaseThresholds {
        &self.thresholds
    }

    pub fn reset(&mut self) {
        self.phase = RepPhase::Standing;
        self.completed_reps = 0;
        self.last_rep_ms = None;
    }

    fn next_phase(&self, phase: RepPhase, angle: f32) -> Option<RepPhase> {
        let t = &self.thresholds;
        match phase {
            RepPhase::Standing if angle < t.up_threshold => Some(RepPhase::Descending),
            // deeper than the band means it was crossed between frames
            RepPhase::Descending if t.in_down_range(angle) || angle < t.down_min => {
                Some(RepPhase::Bottom)
            }
            RepPhase::Bottom if angle > t.down_max => Some(RepPhase::Ascending),
            RepPhase::Ascending if angle > t.up_threshold => Some(RepPhase::Standing),
            RepPhase::Ascending if angle <= t.down_max => Some(RepPhase::Bottom),
            _ => None,
        }
    }

    /// Feed one knee angle. `None` is a dropped frame and changes nothing.
    pub fn update(&mut self, knee: Option<f32>, timestamp_ms: u64) -> Option<RepEvent> {
        let angle = knee?;
        let mut event = None;

        // at most one full lap per sample
        for _ in 0..4 {
            let Some(next) = self.next_phase(self.phase, angle) else {
                break;
            };
            tracing::debug!("phase {:?} -> {:?} at {:.1}°", self.phase, next, angle);
            if self.phase == RepPhase::Ascending && next == RepPhase::Standing {
                event = Some(self.complete_rep(timestamp_ms));
            }
            self.phase = next;
        }
        event
    }

    fn complete_rep(&mut self, timestamp_ms: u64) -> RepEvent {
        if let Some(last) = self.last_rep_ms {
            let since_last_ms = timestamp_ms.saturating_sub(last);
            if since_last_ms < self.min_rep_interval_ms {
                tracing::debug!("rep ignored, {}ms after previous", since_last_ms);
                return RepEvent::TooFast { since_last_ms };
            }
        }
        self.completed_reps += 1;
        self.last_rep_ms = Some(timestamp_ms);
        RepEvent::Counted {
            total: self.completed_reps,
        }
    }
}

impl Default for RepClassifier {
    fn default() -> Self {
        Self::new(PhaseThresholds::default())
    }
}
