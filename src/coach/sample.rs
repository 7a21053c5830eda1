use serde::Serialize;

use crate::pose::{FrameSnapshot, Joint, Landmark};

use super::geometry::angle_at_vertex;
use super::side::ActiveSide;

/// Joint angles of one frame, in degrees. `None` means no information.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AngleSample {
    /// At the knee, between thigh and shin
    pub knee: Option<f32>,
    /// At the hip, between trunk and thigh
    pub back: Option<f32>,
}

impl AngleSample {
    pub const EMPTY: AngleSample = AngleSample { knee: None, back: None };

    pub fn new(knee: Option<f32>, back: Option<f32>) -> Self {
        Self { knee, back }
    }

    pub fn is_empty(&self) -> bool {
        self.knee.is_none() && self.back.is_none()
    }
}

fn visible(frame: &FrameSnapshot, joint: Joint, min_visibility: f32) -> Option<&Landmark> {
    frame.get(joint).filter(|lm| lm.is_visible(min_visibility))
}

/// Knee and back angles on `side`; low-visibility landmarks leave the
/// dependent angle empty.
pub fn measure(frame: &FrameSnapshot, side: ActiveSide, min_visibility: f32) -> AngleSample {
    let shoulder = visible(frame, side.shoulder(), min_visibility);
    let hip = visible(frame, side.hip(), min_visibility);
    let knee = visible(frame, side.knee(), min_visibility);
    let ankle = visible(frame, side.ankle(), min_visibility);

    let knee_angle = match (hip, knee, ankle) {
        (Some(h), Some(k), Some(a)) => angle_at_vertex(h, k, a),
        _ => None,
    };
    let back_angle = match (shoulder, hip, knee) {
        (Some(s), Some(h), Some(k)) => angle_at_vertex(s, h, k),
        _ => None,
    };
    AngleSample::new(knee_angle, back_angle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::LandmarkLayout;

    fn straight_leg_frame(shoulder_vis: f32) -> FrameSnapshot {
        let mut frame = FrameSnapshot::empty(0, LandmarkLayout::BlazePose33);
        frame.set(Joint::LeftShoulder, Landmark::new(0.5, 0.0, 0.0, shoulder_vis));
        frame.set(Joint::LeftHip, Landmark::new(0.5, 0.3, 0.0, 0.9));
        frame.set(Joint::LeftKnee, Landmark::new(0.5, 0.6, 0.0, 0.9));
        frame.set(Joint::LeftAnkle, Landmark::new(0.5, 0.9, 0.0, 0.9));
        frame
    }

    #[test]
    fn test_straight_leg_and_back() {
        let sample = measure(&straight_leg_frame(0.9), ActiveSide::Left, 0.3);
        assert!((sample.knee.unwrap() - 180.0).abs() < 0.1);
        assert!((sample.back.unwrap() - 180.0).abs() < 0.1);
    }

    #[test]
    fn test_hidden_shoulder_only_drops_back() {
        let sample = measure(&straight_leg_frame(0.1), ActiveSide::Left, 0.3);
        assert!(sample.knee.is_some());
        assert!(sample.back.is_none());
    }

    #[test]
    fn test_other_side_is_empty() {
        let sample = measure(&straight_leg_frame(0.9), ActiveSide::Right, 0.3);
        assert!(sample.is_empty());
    }

    #[test]
    fn test_collapsed_joint_is_none() {
        let mut frame = straight_leg_frame(0.9);
        frame.set(Joint::LeftAnkle, Landmark::new(0.5, 0.6, 0.0, 0.9));
        let sample = measure(&frame, ActiveSide::Left, 0.3);
        assert!(sample.knee.is_none());
        assert!(sample.back.is_some());
    }
}
