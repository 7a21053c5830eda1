//! Side-view frames with exact joint angles, for demos and tests

use super::landmark::{FrameSnapshot, Joint, Landmark, LandmarkLayout};

const SEGMENT: f32 = 0.3;
const VISIBILITY: f32 = 0.9;

/// Left-side profile with the given knee and back angles (degrees).
///
/// Hip at (0.5, 0.3), knee straight below it. Right-side joints are left
/// invisible so side selection always lands on the left leg.
pub fn side_view_frame(timestamp_ms: u64, knee_deg: f32, back_deg: f32) -> FrameSnapshot {
    let mut frame = FrameSnapshot::empty(timestamp_ms, LandmarkLayout::BlazePose33);
    let (hip_x, hip_y) = (0.5, 0.3);
    let (knee_x, knee_y) = (hip_x, hip_y + SEGMENT);

    let k = knee_deg.to_radians();
    let b = back_deg.to_radians();
    frame.set(Joint::LeftHip, Landmark::new(hip_x, hip_y, 0.0, VISIBILITY));
    frame.set(Joint::LeftKnee, Landmark::new(knee_x, knee_y, 0.0, VISIBILITY));
    frame.set(
        Joint::LeftAnkle,
        Landmark::new(knee_x + SEGMENT * k.sin(), knee_y - SEGMENT * k.cos(), 0.0, VISIBILITY),
    );
    frame.set(
        Joint::LeftShoulder,
        Landmark::new(hip_x + SEGMENT * b.sin(), hip_y + SEGMENT * b.cos(), 0.0, VISIBILITY),
    );
    frame
}
