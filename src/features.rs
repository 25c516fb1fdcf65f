// src/features.rs
//! Control features extracted from a single hand observation.
//!
//! Three interchangeable extractors share the [`FeatureExtractor`] trait:
//!
//! | Extractor | Feature | Anchor |
//! |---|---|---|
//! | [`PinchDistance`] | thumb-tip ↔ index-tip distance (px) | midpoint of the two tips |
//! | [`FingerFlexion`] | folded digit count (0–5) | wrist |
//! | [`ContourSolidity`] | contour area / hull area (0–1) | bounding-box center |

use nalgebra::distance;

use crate::error::ExtractError;
use crate::landmarks::{index, HandObservation, Point, HAND_LANDMARK_COUNT};

/// Default minimum motion region area, px².
pub const MIN_CONTOUR_AREA: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Distance(f64),
    FoldedDigits(u8),
    Solidity(f64),
}

impl FeatureValue {
    pub fn scalar(&self) -> f64 {
        match *self {
            Self::Distance(d) => d,
            Self::FoldedDigits(n) => n as f64,
            Self::Solidity(s) => s,
        }
    }
}

/// Scalar feature plus the point the display layer anchors overlays to.
/// Derived fresh every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlFeature {
    pub value: FeatureValue,
    pub anchor: Point,
    /// Endpoints of the measured segment, for line overlays.
    pub span: Option<(Point, Point)>,
}

pub trait FeatureExtractor {
    fn extract(&self, hand: &HandObservation) -> Result<ControlFeature, ExtractError>;
}

fn require(hand: &HandObservation, needed: usize) -> Result<(), ExtractError> {
    if hand.landmarks.len() < needed {
        return Err(ExtractError::InsufficientData {
            needed,
            got: hand.landmarks.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PinchDistance;

impl FeatureExtractor for PinchDistance {
    fn extract(&self, hand: &HandObservation) -> Result<ControlFeature, ExtractError> {
        require(hand, index::INDEX_TIP + 1)?;
        let thumb = hand.landmarks[index::THUMB_TIP];
        let tip = hand.landmarks[index::INDEX_TIP];

        Ok(ControlFeature {
            value: FeatureValue::Distance(distance(&thumb, &tip)),
            anchor: nalgebra::center(&thumb, &tip),
            span: Some((thumb, tip)),
        })
    }
}

/// (tip, reference joint) per digit. Thumb compares against its IP joint,
/// the fingers against their PIP joints.
const DIGITS: [(usize, usize); 5] = [
    (index::THUMB_TIP, index::THUMB_IP),
    (index::INDEX_TIP, index::INDEX_PIP),
    (index::MIDDLE_TIP, index::MIDDLE_PIP),
    (index::RING_TIP, index::RING_PIP),
    (index::PINKY_TIP, index::PINKY_PIP),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct FingerFlexion;

impl FingerFlexion {
    /// A digit is folded when its tip sits lower in the image (larger y)
    /// than its reference joint.
    pub fn folded_digits(hand: &HandObservation) -> Result<u8, ExtractError> {
        require(hand, HAND_LANDMARK_COUNT)?;
        let folded = DIGITS
            .iter()
            .filter(|(tip, joint)| hand.landmarks[*tip].y > hand.landmarks[*joint].y)
            .count();
        Ok(folded as u8)
    }
}

impl FeatureExtractor for FingerFlexion {
    fn extract(&self, hand: &HandObservation) -> Result<ControlFeature, ExtractError> {
        let folded = Self::folded_digits(hand)?;
        Ok(ControlFeature {
            value: FeatureValue::FoldedDigits(folded),
            anchor: hand.landmarks[index::WRIST],
            span: None,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContourSolidity {
    pub min_area: f64,
}

impl Default for ContourSolidity {
    fn default() -> Self {
        Self {
            min_area: MIN_CONTOUR_AREA,
        }
    }
}

impl FeatureExtractor for ContourSolidity {
    fn extract(&self, hand: &HandObservation) -> Result<ControlFeature, ExtractError> {
        let region = hand.region.ok_or(ExtractError::MissingShape)?;
        if region.area < self.min_area {
            return Err(ExtractError::RegionTooSmall {
                area: region.area,
                min_area: self.min_area,
            });
        }

        let solidity = if region.hull_area > 0.0 {
            (region.area / region.hull_area).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok(ControlFeature {
            value: FeatureValue::Solidity(solidity),
            anchor: region.bounds.center(),
            span: None,
        })
    }
}
