// src/landmarks.rs
//! Per-frame hand pose data as delivered by the pose-estimation service.
//!
//! Coordinates are pixels in (already mirrored) frame space.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

pub type Point = Point2<f64>;

/// Number of landmarks in a model-tracked hand.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// MediaPipe hand landmark indices.
#[allow(dead_code)]
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// Classifier-provided hand identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a label such as MediaPipe's `"Left"`; anything else is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::Unknown,
        }
    }
}

/// Axis-aligned pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Integer center, matching `x + w / 2` on the pixel grid.
    pub fn center(&self) -> Point {
        Point::new(
            (self.x + self.width / 2) as f64,
            (self.y + self.height / 2) as f64,
        )
    }
}

/// Shape statistics of a motion region (contour strategy only).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegionShape {
    pub area: f64,
    pub hull_area: f64,
    pub bounds: BoundingBox,
}

/// One tracked hand: 21 landmarks from the model, or a single centroid
/// plus region shape from motion tracking.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandObservation {
    pub handedness: Handedness,
    pub landmarks: Vec<Point>,
    pub region: Option<RegionShape>,
}

impl HandObservation {
    pub fn from_landmarks(handedness: Handedness, landmarks: Vec<Point>) -> Self {
        Self {
            handedness,
            landmarks,
            region: None,
        }
    }

    pub fn from_region(region: RegionShape) -> Self {
        Self {
            handedness: Handedness::Unknown,
            landmarks: vec![region.bounds.center()],
            region: Some(region),
        }
    }

    pub fn landmark(&self, idx: usize) -> Option<Point> {
        self.landmarks.get(idx).copied()
    }

    pub fn is_full_hand(&self) -> bool {
        self.landmarks.len() >= HAND_LANDMARK_COUNT
    }
}

/// Zero to two hands seen in one camera frame. Order is not stable
/// across frames; use `handedness` where available.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoseFrame {
    pub width: u32,
    pub height: u32,
    pub hands: Vec<HandObservation>,
}

impl PoseFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            hands: Vec::new(),
        }
    }

    pub fn with_hand(mut self, hand: HandObservation) -> Self {
        self.hands.push(hand);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    /// Flip every landmark horizontally. Used when the estimator ran on an
    /// unmirrored frame.
    pub fn mirrored(&self) -> Self {
        let max_x = self.width.saturating_sub(1) as f64;
        let hands = self
            .hands
            .iter()
            .map(|hand| HandObservation {
                handedness: hand.handedness,
                landmarks: hand
                    .landmarks
                    .iter()
                    .map(|p| Point::new((max_x - p.x).max(0.0), p.y))
                    .collect(),
                region: hand.region,
            })
            .collect();

        Self {
            width: self.width,
            height: self.height,
            hands,
        }
    }

    /// Clamp landmarks into `[0, width) × [0, height)`.
    pub fn clamp_to_frame(&mut self) {
        let max_x = self.width.saturating_sub(1) as f64;
        let max_y = self.height.saturating_sub(1) as f64;
        for hand in &mut self.hands {
            for p in &mut hand.landmarks {
                p.x = p.x.clamp(0.0, max_x);
                p.y = p.y.clamp(0.0, max_y);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handedness_labels() {
        assert_eq!(Handedness::from_label("Left"), Handedness::Left);
        assert_eq!(Handedness::from_label(" right "), Handedness::Right);
        assert_eq!(Handedness::from_label("Ambidextrous"), Handedness::Unknown);
        assert_eq!(Handedness::Right.as_str(), "right");
    }

    #[test]
    fn test_bounding_box_center_is_integer() {
        let b = BoundingBox { x: 10, y: 20, width: 5, height: 7 };
        assert_eq!(b.center(), Point::new(12.0, 23.0));
    }

    #[test]
    fn test_region_observation_uses_center() {
        let region = RegionShape {
            area: 1200.0,
            hull_area: 1500.0,
            bounds: BoundingBox { x: 100, y: 100, width: 40, height: 60 },
        };
        let hand = HandObservation::from_region(region);
        assert_eq!(hand.landmarks, vec![Point::new(120.0, 130.0)]);
        assert!(!hand.is_full_hand());
    }

    #[test]
    fn test_mirrored_flips_x_only() {
        let frame = PoseFrame::new(640, 480).with_hand(HandObservation::from_landmarks(
            Handedness::Left,
            vec![Point::new(0.0, 10.0), Point::new(639.0, 20.0)],
        ));
        let m = frame.mirrored();
        assert_eq!(m.hands[0].landmarks[0], Point::new(639.0, 10.0));
        assert_eq!(m.hands[0].landmarks[1], Point::new(0.0, 20.0));
        assert_eq!(m.hands[0].handedness, Handedness::Left);
    }

    #[test]
    fn test_clamp_to_frame() {
        let mut frame = PoseFrame::new(100, 50).with_hand(HandObservation::from_landmarks(
            Handedness::Unknown,
            vec![Point::new(-3.0, 70.0)],
        ));
        frame.clamp_to_frame();
        assert_eq!(frame.hands[0].landmarks[0], Point::new(0.0, 49.0));
    }
}
