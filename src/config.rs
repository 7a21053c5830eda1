use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::coach::side::SidePolicy;
use crate::error::CoachError;
use crate::pose::LandmarkLayout;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub phase: PhaseConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub landmarks: LandmarkConfig,
    #[serde(default)]
    pub framing: FramingConfig,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Knee-angle thresholds driving the rep phase machine (degrees)
#[derive(Debug, Deserialize, Clone)]
pub struct PhaseConfig {
    /// Above this the leg counts as extended
    #[serde(default = "default_up_threshold")]
    pub up_threshold: f32,
    /// Lower edge of the fully-flexed band
    #[serde(default = "default_down_min")]
    pub down_min: f32,
    /// Upper edge of the fully-flexed band
    #[serde(default = "default_down_max")]
    pub down_max: f32,
    /// Minimum gap between two counted reps (0 = off)
    #[serde(default)]
    pub min_rep_interval_ms: u64,
}

fn default_up_threshold() -> f32 { 160.0 }
fn default_down_min() -> f32 { 70.0 }
fn default_down_max() -> f32 { 100.0 }

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            up_threshold: default_up_threshold(),
            down_min: default_down_min(),
            down_max: default_down_max(),
            min_rep_interval_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    /// Back angle below this during movement raises a warning
    #[serde(default = "default_back_safe_threshold")]
    pub back_safe_threshold: f32,
    /// Same-kind warnings inside this window are suppressed
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Oldest warnings are dropped past this many
    #[serde(default = "default_max_warnings")]
    pub max_warnings: usize,
}

fn default_back_safe_threshold() -> f32 { 150.0 }
fn default_cooldown_ms() -> u64 { 3000 }
fn default_max_warnings() -> usize { 100 }

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            back_safe_threshold: default_back_safe_threshold(),
            cooldown_ms: default_cooldown_ms(),
            max_warnings: default_max_warnings(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LandmarkConfig {
    /// Landmarks below this visibility are treated as missing
    #[serde(default = "default_min_visibility")]
    pub min_visibility: f32,
    #[serde(default)]
    pub side_policy: SidePolicy,
    #[serde(default)]
    pub layout: LandmarkLayout,
}

fn default_min_visibility() -> f32 { 0.30 }

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            min_visibility: default_min_visibility(),
            side_policy: SidePolicy::default(),
            layout: LandmarkLayout::default(),
        }
    }
}

/// Checks that the active leg is usable before any angle is measured
#[derive(Debug, Deserialize, Clone)]
pub struct FramingConfig {
    #[serde(default = "default_framing_enabled")]
    pub enabled: bool,
    /// Hip→ankle vertical span as a fraction of image height
    #[serde(default = "default_min_leg_span")]
    pub min_leg_span: f32,
    /// Side margin the leg must stay clear of
    #[serde(default = "default_roi_margin_x")]
    pub roi_margin_x: f32,
}

fn default_framing_enabled() -> bool { true }
fn default_min_leg_span() -> f32 { 0.28 }
fn default_roi_margin_x() -> f32 { 0.08 }

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            enabled: default_framing_enabled(),
            min_leg_span: default_min_leg_span(),
            roi_margin_x: default_roi_margin_x(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmoothingConfig {
    /// Moving-average window in samples (1 = pass-through)
    #[serde(default = "default_smoothing_window")]
    pub window: usize,
}

fn default_smoothing_window() -> usize { 1 }

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { window: default_smoothing_window() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_reps_per_set")]
    pub reps_per_set: u32,
    /// Catalog id of the exercise to coach
    #[serde(default = "default_exercise")]
    pub exercise: String,
}

fn default_reps_per_set() -> u32 { 10 }
fn default_exercise() -> String { "squat_bw".to_string() }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reps_per_set: default_reps_per_set(),
            exercise: default_exercise(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

fn default_camera_width() -> u32 { 640 }
fn default_camera_height() -> u32 { 480 }
fn default_model_path() -> String { "models/movenet_lightning.onnx".to_string() }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
            model_path: default_model_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_base_url() -> String { "https://armonia-backend.onrender.com".to_string() }
fn default_timeout_secs() -> u64 { 20 }
fn default_language() -> String { "ar".to_string() }

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            language: default_language(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    /// Falls back to defaults when the file is missing or unusable
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}: {:#}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_toml_str(content: &str) -> crate::error::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |msg: String| Err(CoachError::InvalidConfig(msg));
        let p = &self.phase;
        for (name, v) in [
            ("phase.up_threshold", p.up_threshold),
            ("phase.down_min", p.down_min),
            ("phase.down_max", p.down_max),
            ("safety.back_safe_threshold", self.safety.back_safe_threshold),
        ] {
            if !(0.0..=180.0).contains(&v) {
                return invalid(format!("{} must be within [0, 180], got {}", name, v));
            }
        }
        if p.down_min > p.down_max {
            return invalid(format!(
                "phase.down_min ({}) exceeds phase.down_max ({})",
                p.down_min, p.down_max
            ));
        }
        if p.down_max >= p.up_threshold {
            return invalid(format!(
                "phase.down_max ({}) must be below phase.up_threshold ({})",
                p.down_max, p.up_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.landmarks.min_visibility) {
            return invalid(format!(
                "landmarks.min_visibility must be within [0, 1], got {}",
                self.landmarks.min_visibility
            ));
        }
        if self.smoothing.window == 0 {
            return invalid("smoothing.window must be at least 1".to_string());
        }
        if self.session.reps_per_set == 0 {
            return invalid("session.reps_per_set must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.phase.up_threshold, 160.0);
        assert_eq!(config.phase.down_min, 70.0);
        assert_eq!(config.phase.down_max, 100.0);
        assert_eq!(config.safety.back_safe_threshold, 150.0);
        assert_eq!(config.smoothing.window, 1);
        assert_eq!(config.landmarks.side_policy, SidePolicy::Pinned);
        assert_eq!(config.landmarks.layout, LandmarkLayout::BlazePose33);
        assert!(config.framing.enabled);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [phase]
            up_threshold = 155.0

            [landmarks]
            side_policy = "per_frame"
            layout = "movenet17"
            "#,
        )
        .unwrap();
        assert_eq!(config.phase.up_threshold, 155.0);
        assert_eq!(config.phase.down_max, 100.0);
        assert_eq!(config.landmarks.side_policy, SidePolicy::PerFrame);
        assert_eq!(config.landmarks.layout, LandmarkLayout::MoveNet17);
        assert_eq!(config.chat.timeout_secs, 20);
    }

    #[test]
    fn test_rejects_overlapping_bands() {
        let err = Config::from_toml_str("[phase]\ndown_max = 165.0\n").unwrap_err();
        assert!(matches!(err, CoachError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_inverted_down_range() {
        let err = Config::from_toml_str("[phase]\ndown_min = 120.0\n").unwrap_err();
        assert!(matches!(err, CoachError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = Config::from_toml_str("[smoothing]\nwindow = 0\n").unwrap_err();
        assert!(matches!(err, CoachError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = Config::from_toml_str("[phase\n").unwrap_err();
        assert!(matches!(err, CoachError::ConfigParse(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.session.reps_per_set, 10);
    }
}
