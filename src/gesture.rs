// src/gesture.rs
//! Stateless per-frame gesture classification.

use serde::{Deserialize, Serialize};

use crate::features::{ControlFeature, FeatureValue};

/// Discrete gesture recognised in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureEvent {
    #[default]
    None,
    Pinch,
    Fist,
    Open,
}

impl GestureEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pinch => "pinch",
            Self::Fist => "fist",
            Self::Open => "open",
        }
    }
}

impl std::fmt::Display for GestureEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureThresholds {
    /// Thumb/index tip distance below which the hand is pinching, px.
    #[serde(default = "default_pinch_distance")]
    pub pinch_distance_px: f64,
    /// Folded digits needed for a fist.
    #[serde(default = "default_fist_min_folded")]
    pub fist_min_folded: u8,
    /// Solidity at or below which a motion region reads as a fist.
    #[serde(default = "default_fist_max_solidity")]
    pub fist_max_solidity: f64,
}

fn default_pinch_distance() -> f64 {
    30.0
}

fn default_fist_min_folded() -> u8 {
    4
}

fn default_fist_max_solidity() -> f64 {
    0.8
}

impl Default for GestureThresholds {
    fn default() -> Self {
        Self {
            pinch_distance_px: default_pinch_distance(),
            fist_min_folded: default_fist_min_folded(),
            fist_max_solidity: default_fist_max_solidity(),
        }
    }
}

/// Classify an extracted feature. `None` (insufficient data) is always
/// [`GestureEvent::None`].
pub fn classify(feature: Option<&ControlFeature>, thresholds: &GestureThresholds) -> GestureEvent {
    let Some(feature) = feature else {
        return GestureEvent::None;
    };

    match feature.value {
        FeatureValue::Distance(d) => {
            if d < thresholds.pinch_distance_px {
                GestureEvent::Pinch
            } else {
                GestureEvent::None
            }
        }
        FeatureValue::FoldedDigits(n) => {
            if n >= thresholds.fist_min_folded {
                GestureEvent::Fist
            } else {
                GestureEvent::Open
            }
        }
        FeatureValue::Solidity(s) => {
            if s <= thresholds.fist_max_solidity {
                GestureEvent::Fist
            } else {
                GestureEvent::Open
            }
        }
    }
}
