// src/strategy.rs
//! The three recognition strategies and what each one implies for the
//! extractor, lock policy and default channel mappings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::features::{ContourSolidity, FeatureExtractor, FingerFlexion, PinchDistance};
use crate::lock::LockPolicy;
use crate::mapper::{ChannelMapping, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Thumb/index distance drives the level, pinch toggles the lock.
    Pinch,
    /// Wrist position drives the level, a fist holds the lock.
    #[default]
    Flexion,
    /// One motion region drives both channels, a concave shape holds the lock.
    Contour,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Pinch, Strategy::Flexion, Strategy::Contour];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinch => "pinch",
            Self::Flexion => "flexion",
            Self::Contour => "contour",
        }
    }

    pub fn lock_policy(&self) -> LockPolicy {
        match self {
            Self::Pinch => LockPolicy::Toggle,
            Self::Flexion | Self::Contour => LockPolicy::Level,
        }
    }

    pub fn extractor(&self, min_contour_area: f64) -> Box<dyn FeatureExtractor + Send> {
        match self {
            Self::Pinch => Box::new(PinchDistance),
            Self::Flexion => Box::new(FingerFlexion),
            Self::Contour => Box::new(ContourSolidity {
                min_area: min_contour_area,
            }),
        }
    }

    /// Contour tracking sees a single region and feeds it to both channels.
    pub fn shares_observation(&self) -> bool {
        matches!(self, Self::Contour)
    }

    /// Landmark strategies need an estimator upstream; contour works on raw frames.
    pub fn needs_landmarks(&self) -> bool {
        !matches!(self, Self::Contour)
    }

    pub fn default_brightness_mapping(&self) -> ChannelMapping {
        match self {
            Self::Contour => ChannelMapping::horizontal().with_range(Span::new(10.0, 100.0)),
            _ => ChannelMapping::horizontal(),
        }
    }

    pub fn default_volume_mapping(&self) -> ChannelMapping {
        ChannelMapping::vertical_inverted()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pinch" | "distance" => Ok(Self::Pinch),
            "flexion" | "fist" => Ok(Self::Flexion),
            "contour" | "motion" => Ok(Self::Contour),
            other => Err(format!(
                "unknown strategy '{}' (expected pinch, flexion or contour)",
                other
            )),
        }
    }
}
