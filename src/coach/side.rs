use serde::{Deserialize, Serialize};

use crate::config::FramingConfig;
use crate::pose::{FrameSnapshot, Joint};

/// Body side whose leg feeds the angle computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveSide {
    #[default]
    Left,
    Right,
}

impl ActiveSide {
    pub fn shoulder(&self) -> Joint {
        match self {
            Self::Left => Joint::LeftShoulder,
            Self::Right => Joint::RightShoulder,
        }
    }

    pub fn hip(&self) -> Joint {
        match self {
            Self::Left => Joint::LeftHip,
            Self::Right => Joint::RightHip,
        }
    }

    pub fn knee(&self) -> Joint {
        match self {
            Self::Left => Joint::LeftKnee,
            Self::Right => Joint::RightKnee,
        }
    }

    pub fn ankle(&self) -> Joint {
        match self {
            Self::Left => Joint::LeftAnkle,
            Self::Right => Joint::RightAnkle,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// hip, knee, ankle
    pub fn leg(&self) -> [Joint; 3] {
        [self.hip(), self.knee(), self.ankle()]
    }
}

/// When the active side is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidePolicy {
    /// Chosen on the first frame with a usable leg, kept until reset.
    /// Avoids flipping sides when visibility is noisy near the midline.
    #[default]
    Pinned,
    /// Re-evaluated on every frame
    PerFrame,
}

/// Sum of hip/knee/ankle visibility; missing landmarks count as zero
pub fn leg_visibility(frame: &FrameSnapshot, side: ActiveSide) -> f32 {
    side.leg()
        .iter()
        .map(|&j| frame.get(j).map_or(0.0, |lm| lm.visibility))
        .sum()
}

/// Side with the higher leg visibility sum. Ties go to `Left`.
pub fn pick_active_side(frame: &FrameSnapshot) -> ActiveSide {
    let left = leg_visibility(frame, ActiveSide::Left);
    let right = leg_visibility(frame, ActiveSide::Right);
    if right > left {
        ActiveSide::Right
    } else {
        ActiveSide::Left
    }
}

/// All three leg landmarks present and visible
pub fn leg_visible(frame: &FrameSnapshot, side: ActiveSide, min_visibility: f32) -> bool {
    side.leg()
        .iter()
        .all(|&j| frame.get(j).is_some_and(|lm| lm.is_visible(min_visibility)))
}

/// One leg is enough: it has to be tall enough in the image, clear of the
/// side edges, and standing (ankle below hip).
pub fn leg_in_frame(frame: &FrameSnapshot, side: ActiveSide, config: &FramingConfig) -> bool {
    let (Some(hip), Some(knee), Some(ankle)) = (
        frame.get(side.hip()),
        frame.get(side.knee()),
        frame.get(side.ankle()),
    ) else {
        return false;
    };

    let xs = [hip.x, knee.x, ankle.x];
    let ys = [hip.y, knee.y, ankle.y];
    let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
    let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min);
    let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if max_y - min_y < config.min_leg_span {
        return false;
    }
    if min_x < config.roi_margin_x || max_x > 1.0 - config.roi_margin_x {
        return false;
    }
    // image y grows downward
    ankle.y > hip.y
}

/// Applies the side policy frame by frame
#[derive(Debug, Clone)]
pub struct SideSelector {
    policy: SidePolicy,
    min_visibility: f32,
    pinned: Option<ActiveSide>,
}

impl SideSelector {
    pub fn new(policy: SidePolicy, min_visibility: f32) -> Self {
        Self {
            policy,
            min_visibility,
            pinned: None,
        }
    }

    pub fn policy(&self) -> SidePolicy {
        self.policy
    }

    pub fn pinned(&self) -> Option<ActiveSide> {
        self.pinned
    }

    /// Force a side regardless of policy until the next reset
    pub fn pin(&mut self, side: ActiveSide) {
        self.pinned = Some(side);
    }

    pub fn reset(&mut self) {
        self.pinned = None;
    }

    /// Side to measure on this frame, or `None` when its leg is not usable
    pub fn select(&mut self, frame: &FrameSnapshot) -> Option<ActiveSide> {
        if let Some(side) = self.pinned {
            return leg_visible(frame, side, self.min_visibility).then_some(side);
        }
        let side = self.usable_side(frame)?;
        if self.policy == SidePolicy::Pinned {
            tracing::debug!("active side pinned to {:?}", side);
            self.pinned = Some(side);
        }
        Some(side)
    }

    /// More visible leg if it passes the gate, else the other one if that does
    fn usable_side(&self, frame: &FrameSnapshot) -> Option<ActiveSide> {
        let preferred = pick_active_side(frame);
        [preferred, preferred.opposite()]
            .into_iter()
            .find(|&side| leg_visible(frame, side, self.min_visibility))
    }
}
