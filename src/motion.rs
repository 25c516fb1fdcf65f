// src/motion.rs
//! Motion-based hand tracking for the contour strategy.
//!
//! A running per-pixel background model separates the moving hand from the
//! scene. The mask is cleaned with a morphological open, and the largest
//! external contour becomes a single [`HandObservation`] carrying its
//! polygon area, convex hull area and bounding box.
//!
//! The model carries state between frames, so [`MotionDetector::detect`]
//! must see every frame exactly once, in capture order.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::geometry::convex_hull;
use imageproc::morphology;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::features::MIN_CONTOUR_AREA;
use crate::landmarks::{BoundingBox, HandObservation, PoseFrame, RegionShape};

const FOREGROUND: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Frames after which the learning rate settles at `1 / history`.
    #[serde(default = "default_history")]
    pub history: u32,
    /// Squared distance, in variances, beyond which a pixel is foreground.
    #[serde(default = "default_var_threshold")]
    pub var_threshold: f32,
    #[serde(default = "default_initial_variance")]
    pub initial_variance: f32,
    #[serde(default = "default_min_variance")]
    pub min_variance: f32,
    #[serde(default = "default_max_variance")]
    pub max_variance: f32,
    /// Smallest region accepted as a hand, px².
    #[serde(default = "default_min_area")]
    pub min_area: f64,
    /// Remove speckle noise with a 3×3 morphological open.
    #[serde(default = "default_open_mask")]
    pub open_mask: bool,
}

fn default_history() -> u32 {
    500
}

fn default_var_threshold() -> f32 {
    16.0
}

fn default_initial_variance() -> f32 {
    225.0
}

fn default_min_variance() -> f32 {
    4.0
}

fn default_max_variance() -> f32 {
    5.0 * 225.0
}

fn default_min_area() -> f64 {
    MIN_CONTOUR_AREA
}

fn default_open_mask() -> bool {
    true
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            history: default_history(),
            var_threshold: default_var_threshold(),
            initial_variance: default_initial_variance(),
            min_variance: default_min_variance(),
            max_variance: default_max_variance(),
            min_area: default_min_area(),
            open_mask: default_open_mask(),
        }
    }
}

/// Exponentially updated per-pixel intensity mean and variance.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    config: MotionConfig,
    width: u32,
    height: u32,
    mean: Vec<f32>,
    variance: Vec<f32>,
    frames: u32,
}

impl BackgroundModel {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
            frames: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.frames > 0
    }

    pub fn frames_seen(&self) -> u32 {
        self.frames
    }

    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.mean.clear();
        self.variance.clear();
        self.frames = 0;
    }

    fn initialize(&mut self, frame: &GrayImage) {
        self.width = frame.width();
        self.height = frame.height();
        self.mean = frame.pixels().map(|p| p[0] as f32).collect();
        self.variance = vec![self.config.initial_variance; self.mean.len()];
        self.frames = 1;
    }

    /// Classify `frame` against the model, then fold it in.
    ///
    /// The first frame (or a frame of new dimensions) seeds the model and
    /// yields an empty mask.
    pub fn apply(&mut self, frame: &GrayImage) -> GrayImage {
        let (width, height) = frame.dimensions();
        if !self.is_initialized() || width != self.width || height != self.height {
            debug!(width, height, "background model (re)initialised");
            self.initialize(frame);
            return GrayImage::new(width, height);
        }

        self.frames = self.frames.saturating_add(1);
        let alpha = 1.0 / self.frames.min(self.config.history.max(1)) as f32;

        let mut mask = GrayImage::new(width, height);
        for (i, (pixel, out)) in frame.pixels().zip(mask.pixels_mut()).enumerate() {
            let value = pixel[0] as f32;
            let delta = value - self.mean[i];
            let dist2 = delta * delta;
            if dist2 > self.config.var_threshold * self.variance[i] {
                *out = Luma([FOREGROUND]);
            }
            self.mean[i] += alpha * delta;
            self.variance[i] = (self.variance[i] + alpha * (dist2 - self.variance[i]))
                .clamp(self.config.min_variance, self.config.max_variance);
        }
        mask
    }
}

/// Erode then dilate with a 3×3 cross (the 3×3 elliptical kernel).
pub fn open(mask: &GrayImage) -> GrayImage {
    morphology::open(mask, Norm::L1, 1)
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

fn bounding_box(points: &[Point<i32>]) -> BoundingBox {
    let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
    let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    BoundingBox {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1).max(0) as u32,
        height: (max_y - min_y + 1).max(0) as u32,
    }
}

/// Largest external contour of `mask`, or `None` when the mask is empty.
///
/// Areas are polygon areas through the boundary pixel centers, so a filled
/// `n×n` block measures `(n-1)²`.
pub fn largest_region(mask: &GrayImage) -> Option<RegionShape> {
    let mut best: Option<(f64, Vec<Point<i32>>)> = None;
    for contour in find_contours::<i32>(mask) {
        if !matches!(contour.border_type, BorderType::Outer) || contour.points.is_empty() {
            continue;
        }
        let area = polygon_area(&contour.points);
        if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
            best = Some((area, contour.points));
        }
    }

    let (area, points) = best?;
    let hull_area = if points.len() >= 3 {
        polygon_area(&convex_hull(&points))
    } else {
        0.0
    };
    Some(RegionShape {
        area,
        hull_area,
        bounds: bounding_box(&points),
    })
}

/// Background subtraction front end producing at most one observation.
#[derive(Debug, Clone)]
pub struct MotionDetector {
    model: BackgroundModel,
    open_mask: bool,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            model: BackgroundModel::new(config),
            open_mask: config.open_mask,
        }
    }

    pub fn model(&self) -> &BackgroundModel {
        &self.model
    }

    pub fn reset(&mut self) {
        self.model.reset();
    }

    /// Foreground mask of `frame`, after noise removal.
    pub fn foreground(&mut self, frame: &RgbImage) -> GrayImage {
        let gray = image::imageops::grayscale(frame);
        let mask = self.model.apply(&gray);
        if self.open_mask {
            open(&mask)
        } else {
            mask
        }
    }

    pub fn detect(&mut self, frame: &RgbImage) -> Option<HandObservation> {
        let mask = self.foreground(frame);
        let region = largest_region(&mask)?;
        trace!(
            area = region.area,
            hull_area = region.hull_area,
            x = region.bounds.x,
            y = region.bounds.y,
            "motion region"
        );
        Some(HandObservation::from_region(region))
    }

    pub fn detect_frame(&mut self, frame: &RgbImage) -> PoseFrame {
        let mut pose = PoseFrame::new(frame.width(), frame.height());
        if let Some(hand) = self.detect(frame) {
            pose.hands.push(hand);
        }
        pose
    }
}
