use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use crate::error::{CoachError, Result};
use crate::pose::PoseSource;

use super::session::{SessionAggregator, SessionState};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Source reported end of stream
    Exhausted,
    /// Stop flag was raised
    Stopped,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub end: RunEnd,
    pub frames: u64,
    pub elapsed_secs: f64,
    pub final_state: SessionState,
}

/// One exercise run with the pose source as a scoped resource.
///
/// `open` acquires the source; any failure comes back as
/// `CoachError::SourceUnavailable`. The source is dropped, and with it the
/// camera released, on every return path. `on_state` sees the state after
/// each ingested frame. Frames are processed strictly one after another.
pub fn run_session<S, O, F>(
    session: &mut SessionAggregator,
    open: O,
    stop: &AtomicBool,
    mut on_state: F,
) -> Result<RunSummary>
where
    S: PoseSource,
    O: FnOnce() -> Result<S>,
    F: FnMut(&SessionState),
{
    let mut source = open().map_err(|e| match e {
        CoachError::SourceUnavailable(msg) => CoachError::SourceUnavailable(msg),
        other => CoachError::SourceUnavailable(other.to_string()),
    })?;

    // no partial state carries over between runs
    session.reset();
    let start = Instant::now();
    let mut frames = 0u64;

    let end = loop {
        if stop.load(Ordering::Relaxed) {
            break RunEnd::Stopped;
        }
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break RunEnd::Exhausted,
            Err(e) => {
                warn!("pose source failed after {} frames: {}", frames, e);
                return Err(e);
            }
        };
        frames += 1;
        on_state(session.ingest(&frame));
    };

    let elapsed_secs = start.elapsed().as_secs_f64();
    let final_state = session.snapshot();
    info!(
        "run ended ({:?}): {} frames, {} reps, {} warnings",
        end,
        frames,
        final_state.completed_reps,
        final_state.warnings.len()
    );
    Ok(RunSummary {
        end,
        frames,
        elapsed_secs,
        final_state,
    })
}
