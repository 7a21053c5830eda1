use serde::{Deserialize, Serialize};

/// Joints the coach reads from a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

/// Joint numbering scheme of the detector that produced a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkLayout {
    /// MediaPipe BlazePose, 33 landmarks
    #[default]
    #[serde(rename = "blazepose33")]
    BlazePose33,
    /// MoveNet, 17 keypoints
    #[serde(rename = "movenet17")]
    MoveNet17,
}

impl LandmarkLayout {
    pub fn count(&self) -> usize {
        match self {
            Self::BlazePose33 => 33,
            Self::MoveNet17 => 17,
        }
    }

    pub fn index_of(&self, joint: Joint) -> usize {
        use Joint::*;
        match self {
            Self::BlazePose33 => match joint {
                LeftShoulder => 11,
                RightShoulder => 12,
                LeftHip => 23,
                RightHip => 24,
                LeftKnee => 25,
                RightKnee => 26,
                LeftAnkle => 27,
                RightAnkle => 28,
            },
            Self::MoveNet17 => match joint {
                LeftShoulder => 5,
                RightShoulder => 6,
                LeftHip => 11,
                RightHip => 12,
                LeftKnee => 13,
                RightKnee => 14,
                LeftAnkle => 15,
                RightAnkle => 16,
            },
        }
    }
}

/// One detected joint: normalized image coordinates plus visibility (0.0〜1.0)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// Visibility at or above the threshold
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold
    }
}

/// All landmarks of one detector callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub layout: LandmarkLayout,
    pub landmarks: Vec<Landmark>,
}

impl FrameSnapshot {
    pub fn new(timestamp_ms: u64, layout: LandmarkLayout, landmarks: Vec<Landmark>) -> Self {
        Self {
            timestamp_ms,
            layout,
            landmarks,
        }
    }

    /// A frame with every landmark at the origin and zero visibility
    pub fn empty(timestamp_ms: u64, layout: LandmarkLayout) -> Self {
        Self::new(timestamp_ms, layout, vec![Landmark::default(); layout.count()])
    }

    /// `None` when the detector returned fewer landmarks than the layout needs
    pub fn get(&self, joint: Joint) -> Option<&Landmark> {
        self.landmarks.get(self.layout.index_of(joint))
    }

    pub fn set(&mut self, joint: Joint, landmark: Landmark) {
        let idx = self.layout.index_of(joint);
        if idx >= self.landmarks.len() {
            self.landmarks.resize(idx + 1, Landmark::default());
        }
        self.landmarks[idx] = landmark;
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_counts() {
        assert_eq!(LandmarkLayout::BlazePose33.count(), 33);
        assert_eq!(LandmarkLayout::MoveNet17.count(), 17);
    }

    #[test]
    fn test_layout_indices_in_range() {
        use Joint::*;
        for layout in [LandmarkLayout::BlazePose33, LandmarkLayout::MoveNet17] {
            for joint in [
                LeftShoulder, RightShoulder, LeftHip, RightHip,
                LeftKnee, RightKnee, LeftAnkle, RightAnkle,
            ] {
                assert!(layout.index_of(joint) < layout.count());
            }
        }
        assert_eq!(LandmarkLayout::BlazePose33.index_of(LeftHip), 23);
        assert_eq!(LandmarkLayout::MoveNet17.index_of(RightKnee), 14);
    }

    #[test]
    fn test_landmark_is_visible() {
        let lm = Landmark::new(0.5, 0.5, 0.0, 0.3);
        assert!(lm.is_visible(0.3));
        assert!(!lm.is_visible(0.31));
    }

    #[test]
    fn test_frame_get_and_set() {
        let mut frame = FrameSnapshot::empty(0, LandmarkLayout::MoveNet17);
        frame.set(Joint::LeftKnee, Landmark::new(0.4, 0.6, 0.0, 0.9));
        let knee = frame.get(Joint::LeftKnee).unwrap();
        assert_eq!(knee.x, 0.4);
        assert_eq!(knee.visibility, 0.9);
    }

    #[test]
    fn test_short_frame_returns_none() {
        let frame = FrameSnapshot::new(0, LandmarkLayout::BlazePose33, vec![Landmark::default(); 13]);
        assert!(frame.get(Joint::RightShoulder).is_some());
        assert!(frame.get(Joint::LeftHip).is_none());
    }

    #[test]
    fn test_frame_json_defaults() {
        let frame: FrameSnapshot =
            serde_json::from_str(r#"{"timestamp_ms": 5, "landmarks": [{"x": 0.1, "y": 0.2}]}"#).unwrap();
        assert_eq!(frame.layout, LandmarkLayout::BlazePose33);
        assert_eq!(frame.landmarks[0].z, 0.0);
        assert_eq!(frame.landmarks[0].visibility, 0.0);
    }
}
