use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, FramingConfig, PhaseConfig};
use crate::error::{CoachError, Result};
use crate::exercise::{self, Exercise};
use crate::pose::FrameSnapshot;

use super::phase::{RepClassifier, RepEvent, RepPhase};
use super::safety::{SafetyCheck, SafetyMonitor, SafetyWarning};
use super::sample::{measure, AngleSample};
use super::side::{leg_in_frame, ActiveSide, SidePolicy, SideSelector};
use super::smooth::AngleSmoother;

/// What the presentation layer should tell the user after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    #[default]
    None,
    /// Detector returned no landmarks
    NoPose,
    /// Active leg landmarks below the visibility gate
    NoLegVisible,
    /// Leg too small, at the image edge, or not upright
    OutOfFrame,
    KeepBackStraight,
}

impl Cue {
    pub fn message(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::NoPose => "Step into the camera view",
            Self::NoLegVisible => "Turn sideways so one leg is visible",
            Self::OutOfFrame => "Move back so your whole leg is in frame",
            Self::KeepBackStraight => "Keep your back straight!",
        }
    }
}

/// Everything the presentation layer renders. Owned by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub completed_reps: u32,
    pub current_phase: RepPhase,
    /// Oldest first
    pub warnings: VecDeque<SafetyWarning>,
    pub last_sample: AngleSample,
    pub completed_sets: u32,
    pub reps_in_current_set: u32,
    pub active_side: Option<ActiveSide>,
    /// Catalog id of the exercise being coached
    pub exercise: &'static str,
    pub cue: Cue,
    pub frames_ingested: u64,
}

impl SessionState {
    fn new(exercise: &'static str) -> Self {
        Self {
            completed_reps: 0,
            current_phase: RepPhase::Standing,
            warnings: VecDeque::new(),
            last_sample: AngleSample::EMPTY,
            completed_sets: 0,
            reps_in_current_set: 0,
            active_side: None,
            exercise,
            cue: Cue::None,
            frames_ingested: 0,
        }
    }
}

/// Runs one frame at a time through side selection, angle measurement,
/// the rep classifier and the safety monitor.
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    exercise: &'static Exercise,
    min_visibility: f32,
    framing: FramingConfig,
    reps_per_set: u32,
    max_warnings: usize,
    selector: SideSelector,
    smoother: AngleSmoother,
    classifier: RepClassifier,
    monitor: SafetyMonitor,
    state: SessionState,
}

impl SessionAggregator {
    /// Validates the config and resolves the configured exercise id
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let exercise = exercise::find_by_id(&config.session.exercise).ok_or_else(|| {
            CoachError::InvalidConfig(format!("unknown exercise '{}'", config.session.exercise))
        })?;

        Ok(Self {
            exercise,
            min_visibility: config.landmarks.min_visibility,
            framing: config.framing.clone(),
            reps_per_set: config.session.reps_per_set,
            max_warnings: config.safety.max_warnings,
            selector: SideSelector::new(config.landmarks.side_policy, config.landmarks.min_visibility),
            smoother: AngleSmoother::from_config(&config.smoothing),
            classifier: RepClassifier::from_config(&config.phase),
            monitor: SafetyMonitor::from_config(&config.safety),
            state: SessionState::new(exercise.id),
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Owned copy for consumers that outlive the next `ingest`
    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    pub fn exercise(&self) -> &'static Exercise {
        self.exercise
    }

    /// Back to a fresh session. Pinned side and smoothing history go too.
    pub fn reset(&mut self) {
        self.selector.reset();
        self.smoother.reset();
        self.classifier.reset();
        self.monitor.reset();
        self.state = SessionState::new(self.exercise.id);
        info!("session reset ({})", self.exercise.id);
    }

    pub fn set_exercise(&mut self, exercise: &'static Exercise) {
        self.exercise = exercise;
        self.reset();
    }

    pub fn set_side_policy(&mut self, policy: SidePolicy) {
        self.selector = SideSelector::new(policy, self.min_visibility);
        self.reset();
    }

    /// Switch to a fixed side; counts as a side change
    pub fn pin_side(&mut self, side: ActiveSide) {
        self.reset();
        self.selector.pin(side);
        self.state.active_side = Some(side);
    }

    /// New knee thresholds; rejected without touching the session if invalid
    pub fn set_thresholds(&mut self, phase: &PhaseConfig) -> Result<()> {
        Config {
            phase: phase.clone(),
            ..Config::default()
        }
        .validate()?;
        self.classifier = RepClassifier::from_config(phase);
        self.reset();
        Ok(())
    }

    /// One pipeline step. Frames that carry no usable leg are dropped
    /// frames: they set a cue but never move the phase or the counters.
    pub fn ingest(&mut self, frame: &FrameSnapshot) -> &SessionState {
        self.state.frames_ingested += 1;

        if !self.exercise.is_coached() {
            self.state.cue = Cue::None;
            return &self.state;
        }

        let Some(side) = self.usable_side(frame) else {
            self.state.last_sample = AngleSample::EMPTY;
            return &self.state;
        };
        self.state.active_side = Some(side);

        let sample = self.smoother.apply(measure(frame, side, self.min_visibility));
        self.state.last_sample = sample;

        match self.classifier.update(sample.knee, frame.timestamp_ms) {
            Some(RepEvent::Counted { total }) => self.record_rep(total),
            Some(RepEvent::TooFast { since_last_ms }) => {
                debug!("rep not counted, {}ms after previous", since_last_ms);
            }
            None => {}
        }
        self.state.current_phase = self.classifier.phase();

        let check = self
            .monitor
            .check(sample.back, self.state.current_phase, frame.timestamp_ms);
        if let SafetyCheck::Raised(warning) = check {
            warn!(
                "{} at {:.1}° ({:?})",
                warning.kind.as_str(),
                warning.angle_at_trigger,
                self.state.current_phase
            );
            self.push_warning(warning);
        }
        self.state.cue = if check.is_unsafe() {
            Cue::KeepBackStraight
        } else {
            Cue::None
        };

        &self.state
    }

    fn usable_side(&mut self, frame: &FrameSnapshot) -> Option<ActiveSide> {
        if frame.is_empty() {
            self.state.cue = Cue::NoPose;
            return None;
        }
        let Some(side) = self.selector.select(frame) else {
            self.state.cue = Cue::NoLegVisible;
            return None;
        };
        if self.framing.enabled && !leg_in_frame(frame, side, &self.framing) {
            self.state.cue = Cue::OutOfFrame;
            return None;
        }
        Some(side)
    }

    fn record_rep(&mut self, total: u32) {
        let s = &mut self.state;
        s.completed_reps = total;
        s.reps_in_current_set += 1;
        info!("rep {} ({}/{} in set)", total, s.reps_in_current_set, self.reps_per_set);
        if s.reps_in_current_set >= self.reps_per_set {
            s.completed_sets += 1;
            s.reps_in_current_set = 0;
            info!("set {} complete", s.completed_sets);
        }
    }

    fn push_warning(&mut self, warning: SafetyWarning) {
        if self.max_warnings == 0 {
            return;
        }
        if self.state.warnings.len() >= self.max_warnings {
            self.state.warnings.pop_front();
        }
        self.state.warnings.push_back(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{side_view_frame, Joint, Landmark, LandmarkLayout};

    const UPRIGHT: f32 = 175.0;

    fn session() -> SessionAggregator {
        SessionAggregator::from_config(&Config::default()).unwrap()
    }

    fn run(session: &mut SessionAggregator, knees: &[f32], t0: u64) -> u64 {
        let mut t = t0;
        for &k in knees {
            session.ingest(&side_view_frame(t, k, UPRIGHT));
            t += 33;
        }
        t
    }

    #[test]
    fn test_one_rep_from_frames() {
        let mut s = session();
        run(&mut s, &[170.0, 150.0, 90.0, 85.0, 95.0, 165.0], 0);
        let st = s.state();
        assert_eq!(st.completed_reps, 1);
        assert_eq!(st.current_phase, RepPhase::Standing);
        assert_eq!(st.reps_in_current_set, 1);
        assert_eq!(st.active_side, Some(ActiveSide::Left));
        assert_eq!(st.frames_ingested, 6);
        assert!(st.warnings.is_empty());
        assert!((st.last_sample.knee.unwrap() - 165.0).abs() < 0.05);
    }

    #[test]
    fn test_shallow_dip_no_credit() {
        let mut s = session();
        run(&mut s, &[170.0, 150.0, 165.0], 0);
        assert_eq!(s.state().completed_reps, 0);
        assert_eq!(s.state().current_phase, RepPhase::Descending);
    }

    #[test]
    fn test_dropped_frames_keep_progress() {
        let mut s = session();
        let t = run(&mut s, &[170.0, 150.0, 90.0], 0);

        let empty = FrameSnapshot::new(t, LandmarkLayout::BlazePose33, Vec::new());
        assert_eq!(s.ingest(&empty).cue, Cue::NoPose);
        assert_eq!(s.state().current_phase, RepPhase::Bottom);

        let mut hidden = side_view_frame(t + 33, 120.0, UPRIGHT);
        hidden.set(Joint::LeftKnee, Landmark::new(0.5, 0.6, 0.0, 0.1));
        let st = s.ingest(&hidden);
        assert_eq!(st.cue, Cue::NoLegVisible);
        assert_eq!(st.current_phase, RepPhase::Bottom);
        assert!(st.last_sample.is_empty());

        run(&mut s, &[120.0, 170.0], t + 66);
        assert_eq!(s.state().completed_reps, 1);
    }

    #[test]
    fn test_out_of_frame_is_dropped() {
        let mut s = session();
        run(&mut s, &[170.0, 150.0], 0);
        let mut f = side_view_frame(100, 90.0, UPRIGHT);
        f.set(Joint::LeftAnkle, Landmark::new(0.99, 0.6, 0.0, 0.9));
        let st = s.ingest(&f);
        assert_eq!(st.cue, Cue::OutOfFrame);
        assert_eq!(st.current_phase, RepPhase::Descending);
    }

    #[test]
    fn test_identical_frames_are_idempotent() {
        let mut s = session();
        run(&mut s, &[170.0, 150.0, 90.0], 0);
        let frame = side_view_frame(500, 90.0, UPRIGHT);
        let first = s.ingest(&frame).clone();
        for _ in 0..5 {
            let st = s.ingest(&frame);
            assert_eq!(st.current_phase, first.current_phase);
            assert_eq!(st.completed_reps, first.completed_reps);
            assert_eq!(st.last_sample, first.last_sample);
        }
    }

    #[test]
    fn test_bent_back_warns_once_per_cooldown() {
        let mut s = session();
        s.ingest(&side_view_frame(0, 170.0, UPRIGHT));
        for i in 0..10 {
            let st = s.ingest(&side_view_frame(33 + i * 33, 150.0, 140.0));
            assert_eq!(st.cue, Cue::KeepBackStraight);
        }
        assert_eq!(s.state().current_phase, RepPhase::Descending);
        assert_eq!(s.state().warnings.len(), 1);
        assert!((s.state().warnings[0].angle_at_trigger - 140.0).abs() < 0.05);

        s.ingest(&side_view_frame(5000, 150.0, 140.0));
        assert_eq!(s.state().warnings.len(), 2);
        // safety never touches counting
        assert_eq!(s.state().completed_reps, 0);
    }

    #[test]
    fn test_standing_with_bent_back_is_fine() {
        let mut s = session();
        let st = s.ingest(&side_view_frame(0, 170.0, 120.0));
        assert_eq!(st.cue, Cue::None);
        assert!(st.warnings.is_empty());
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut s = session();
        run(&mut s, &[170.0, 150.0, 90.0, 120.0, 170.0, 150.0], 0);
        s.ingest(&side_view_frame(1000, 90.0, 130.0));
        assert_eq!(s.state().completed_reps, 1);
        assert!(!s.state().warnings.is_empty());

        s.reset();
        let st = s.state();
        assert_eq!(st.completed_reps, 0);
        assert_eq!(st.current_phase, RepPhase::Standing);
        assert!(st.warnings.is_empty());
        assert_eq!(st.active_side, None);
        assert_eq!(st.frames_ingested, 0);
    }

    #[test]
    fn test_sets_roll_over() {
        let mut config = Config::default();
        config.session.reps_per_set = 2;
        let mut s = SessionAggregator::from_config(&config).unwrap();
        let mut t = 0;
        for _ in 0..5 {
            t = run(&mut s, &[170.0, 140.0, 90.0, 120.0, 170.0], t);
        }
        let st = s.state();
        assert_eq!(st.completed_reps, 5);
        assert_eq!(st.completed_sets, 2);
        assert_eq!(st.reps_in_current_set, 1);
    }

    #[test]
    fn test_warning_history_is_capped() {
        let mut config = Config::default();
        config.safety.max_warnings = 2;
        config.safety.cooldown_ms = 0;
        let mut s = SessionAggregator::from_config(&config).unwrap();
        s.ingest(&side_view_frame(0, 150.0, 140.0));
        for t in [10, 20, 30] {
            s.ingest(&side_view_frame(t, 150.0, 140.0));
        }
        let times: Vec<_> = s.state().warnings.iter().map(|w| w.timestamp_ms).collect();
        assert_eq!(times, vec![20, 30]);

        for t in (40..2_000).step_by(10) {
            s.ingest(&side_view_frame(t, 150.0, 140.0));
        }
        assert_eq!(s.state().warnings.len(), 2);
        assert_eq!(s.state().warnings.front().map(|w| w.timestamp_ms), Some(1_980));
        assert_eq!(s.state().warnings.back().map(|w| w.timestamp_ms), Some(1_990));
    }

    #[test]
    fn test_set_exercise_resets_and_uncoached_is_ignored() {
        let mut s = session();
        run(&mut s, &[170.0, 150.0, 90.0, 120.0, 170.0], 0);
        assert_eq!(s.state().completed_reps, 1);

        s.set_exercise(exercise::find_by_id("glute_bridge").unwrap());
        assert_eq!(s.state().completed_reps, 0);
        assert_eq!(s.state().exercise, "glute_bridge");
        run(&mut s, &[170.0, 150.0, 90.0, 120.0, 170.0], 1000);
        assert_eq!(s.state().completed_reps, 0);
        assert_eq!(s.state().current_phase, RepPhase::Standing);
    }

    #[test]
    fn test_pin_side_resets() {
        let mut s = session();
        run(&mut s, &[170.0, 150.0, 90.0], 0);
        s.pin_side(ActiveSide::Right);
        assert_eq!(s.state().current_phase, RepPhase::Standing);
        assert_eq!(s.state().active_side, Some(ActiveSide::Right));
        // synthetic frames only show the left leg
        assert_eq!(s.ingest(&side_view_frame(500, 170.0, UPRIGHT)).cue, Cue::NoLegVisible);
    }

    #[test]
    fn test_set_side_policy_resets() {
        let mut s = session();
        run(&mut s, &[170.0, 150.0], 0);
        s.set_side_policy(SidePolicy::PerFrame);
        assert_eq!(s.state().current_phase, RepPhase::Standing);
        run(&mut s, &[170.0, 150.0, 90.0, 120.0, 170.0], 100);
        assert_eq!(s.state().completed_reps, 1);
    }

    #[test]
    fn test_set_thresholds() {
        let mut s = session();
        let bad = PhaseConfig {
            down_min: 120.0,
            down_max: 100.0,
            ..PhaseConfig::default()
        };
        assert!(s.set_thresholds(&bad).is_err());

        let shallow = PhaseConfig {
            down_max: 130.0,
            ..PhaseConfig::default()
        };
        s.set_thresholds(&shallow).unwrap();
        run(&mut s, &[170.0, 150.0, 125.0, 140.0, 170.0], 0);
        assert_eq!(s.state().completed_reps, 1);
    }

    #[test]
    fn test_unknown_exercise_is_rejected() {
        let mut config = Config::default();
        config.session.exercise = "deadlift".to_string();
        assert!(matches!(
            SessionAggregator::from_config(&config),
            Err(CoachError::InvalidConfig(_))
        ));
    }
}
