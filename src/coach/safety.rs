use serde::Serialize;
use std::collections::HashMap;

use crate::config::SafetyConfig;

use super::phase::RepPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Trunk folded too far toward the thigh
    UnsafeBack,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsafeBack => "unsafe_back",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::UnsafeBack => "Keep your back straight!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafetyWarning {
    pub kind: WarningKind,
    /// Back angle that triggered the warning, degrees
    pub angle_at_trigger: f32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyCheck {
    Clear,
    Raised(SafetyWarning),
    /// Unsafe, but the same kind fired within the cooldown
    Suppressed(WarningKind),
}

impl SafetyCheck {
    pub fn is_unsafe(&self) -> bool {
        !matches!(self, Self::Clear)
    }
}

/// Watches the back angle during active movement. Never touches rep counts.
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    back_safe_threshold: f32,
    cooldown_ms: u64,
    last_raised: HashMap<WarningKind, u64>,
}

impl SafetyMonitor {
    pub fn new(back_safe_threshold: f32, cooldown_ms: u64) -> Self {
        Self {
            back_safe_threshold,
            cooldown_ms,
            last_raised: HashMap::new(),
        }
    }

    pub fn from_config(config: &SafetyConfig) -> Self {
        Self::new(config.back_safe_threshold, config.cooldown_ms)
    }

    pub fn reset(&mut self) {
        self.last_raised.clear();
    }

    /// Idle standing is never flagged
    pub fn check(&mut self, back: Option<f32>, phase: RepPhase, timestamp_ms: u64) -> SafetyCheck {
        let Some(angle) = back else {
            return SafetyCheck::Clear;
        };
        if !phase.is_active() || angle >= self.back_safe_threshold {
            return SafetyCheck::Clear;
        }
        self.raise(WarningKind::UnsafeBack, angle, timestamp_ms)
    }

    fn raise(&mut self, kind: WarningKind, angle: f32, timestamp_ms: u64) -> SafetyCheck {
        if let Some(&last) = self.last_raised.get(&kind) {
            if timestamp_ms.saturating_sub(last) < self.cooldown_ms {
                return SafetyCheck::Suppressed(kind);
            }
        }
        self.last_raised.insert(kind, timestamp_ms);
        SafetyCheck::Raised(SafetyWarning {
            kind,
            angle_at_trigger: angle,
            timestamp_ms,
        })
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::from_config(&SafetyConfig::default())
    }
}
