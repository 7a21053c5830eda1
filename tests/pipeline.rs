//! Recorded frames through the whole coaching pipeline

use std::io::Cursor;
use std::sync::atomic::AtomicBool;

use armonia_coach::coach::{run_session, Cue, RepPhase, RunEnd, SessionAggregator};
use armonia_coach::config::Config;
use armonia_coach::pose::{side_view_frame, FrameSnapshot, ReplaySource};
use armonia_coach::CoachError;

const UPRIGHT: f32 = 175.0;

/// (knee, back) per frame, 30 fps
fn recording(angles: &[(f32, f32)]) -> String {
    let mut out = String::from("# synthetic squat recording\n");
    for (i, &(knee, back)) in angles.iter().enumerate() {
        let frame = side_view_frame(i as u64 * 33, knee, back);
        out.push_str(&serde_json::to_string(&frame).unwrap());
        out.push('\n');
    }
    out
}

fn squat(back_at_bottom: f32) -> Vec<(f32, f32)> {
    vec![
        (172.0, UPRIGHT),
        (150.0, 165.0),
        (120.0, 155.0),
        (90.0, back_at_bottom),
        (85.0, back_at_bottom),
        (110.0, 155.0),
        (140.0, 165.0),
        (168.0, UPRIGHT),
    ]
}

fn replay(config: &Config, data: String) -> armonia_coach::Result<armonia_coach::coach::RunSummary> {
    let mut session = SessionAggregator::from_config(config)?;
    let stop = AtomicBool::new(false);
    run_session(&mut session, || Ok(ReplaySource::new(Cursor::new(data))), &stop, |_| {})
}

#[test]
fn test_clean_squats_are_counted() {
    let mut angles = Vec::new();
    for _ in 0..3 {
        angles.extend(squat(160.0));
    }
    let summary = replay(&Config::default(), recording(&angles)).unwrap();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(summary.frames, angles.len() as u64);
    let state = summary.final_state;
    assert_eq!(state.completed_reps, 3);
    assert_eq!(state.current_phase, RepPhase::Standing);
    assert!(state.warnings.is_empty());
    assert_eq!(state.cue, Cue::None);
}

#[test]
fn test_folded_back_warns_without_changing_count() {
    let mut angles = squat(160.0);
    angles.extend(squat(130.0));
    let summary = replay(&Config::default(), recording(&angles)).unwrap();

    let state = summary.final_state;
    assert_eq!(state.completed_reps, 2);
    assert_eq!(state.warnings.len(), 1);
    assert!((state.warnings[0].angle_at_trigger - 130.0).abs() < 0.1);
}

#[test]
fn test_sets_with_config_from_toml() {
    let config = Config::from_toml_str(
        r#"
        [session]
        reps_per_set = 2

        [smoothing]
        window = 1
        "#,
    )
    .unwrap();
    let angles: Vec<_> = (0..5).flat_map(|_| squat(160.0)).collect();
    let state = replay(&config, recording(&angles)).unwrap().final_state;
    assert_eq!(state.completed_reps, 5);
    assert_eq!(state.completed_sets, 2);
    assert_eq!(state.reps_in_current_set, 1);
}

#[test]
fn test_lost_frames_mid_rep() {
    let mut data = String::new();
    for (i, &(knee, back)) in squat(160.0).iter().enumerate() {
        let t = i as u64 * 33;
        data.push_str(&serde_json::to_string(&side_view_frame(t, knee, back)).unwrap());
        data.push('\n');
        // detector drops the person after every frame
        let empty = FrameSnapshot::new(t + 16, Default::default(), Vec::new());
        data.push_str(&serde_json::to_string(&empty).unwrap());
        data.push('\n');
    }
    let state = replay(&Config::default(), data).unwrap().final_state;
    assert_eq!(state.completed_reps, 1);
    assert_eq!(state.cue, Cue::NoPose);
    assert_eq!(state.current_phase, RepPhase::Standing);
}

#[test]
fn test_corrupt_recording_reports_line() {
    let mut data = recording(&squat(160.0));
    data.push_str("{\"timestamp_ms\": \n");
    match replay(&Config::default(), data) {
        Err(CoachError::Replay { line, .. }) => assert_eq!(line, 10),
        other => panic!("expected replay error, got {:?}", other.map(|s| s.frames)),
    }
}
