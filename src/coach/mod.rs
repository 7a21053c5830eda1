//! Squat coaching core: joint angles in, rep counts and form warnings out

pub mod geometry;
pub mod phase;
pub mod runner;
pub mod safety;
pub mod sample;
pub mod session;
pub mod side;
pub mod smooth;

pub use geometry::{angle_at_vertex, angle_between};
pub use phase::{PhaseThresholds, RepClassifier, RepEvent, RepPhase};
pub use runner::{run_session, RunEnd, RunSummary};
pub use safety::{SafetyCheck, SafetyMonitor, SafetyWarning, WarningKind};
pub use sample::{measure, AngleSample};
pub use session::{Cue, SessionAggregator, SessionState};
pub use side::{pick_active_side, ActiveSide, SidePolicy, SideSelector};
pub use smooth::AngleSmoother;
