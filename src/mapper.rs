// src/mapper.rs
//! Linear interpolation of features and hand positions onto 0–100 levels.

use serde::{Deserialize, Serialize};

use crate::landmarks::Point;

/// Closed interval `[lo, hi]`. `lo > hi` expresses an inverted range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub lo: f64,
    pub hi: f64,
}

impl Span {
    pub const PERCENT: Span = Span { lo: 0.0, hi: 100.0 };

    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn midpoint(&self) -> f64 {
        (self.lo + self.hi) / 2.0
    }

    pub fn reversed(&self) -> Self {
        Self { lo: self.hi, hi: self.lo }
    }

    pub fn is_degenerate(&self) -> bool {
        (self.hi - self.lo).abs() < f64::EPSILON
    }
}

/// Default pinch distance domain, px.
pub const PINCH_DOMAIN: Span = Span::new(50.0, 220.0);

/// Map `value` from `domain` onto `range`, clamped to the range.
/// A zero-width domain yields the middle of the range.
pub fn interp(value: f64, domain: Span, range: Span) -> f64 {
    if domain.is_degenerate() {
        return range.midpoint();
    }
    let out = range.lo + (value - domain.lo) * (range.hi - range.lo) / (domain.hi - domain.lo);
    out.clamp(range.lo.min(range.hi), range.lo.max(range.hi))
}

/// Truncate an interpolated value to an integer level in `[0, 100]`.
pub fn to_level(value: f64) -> u8 {
    value.clamp(0.0, 100.0) as u8
}

/// `map(d, [50, 220], [0, 100])` for the pinch strategy.
pub fn map_distance(distance: f64, domain: Span, range: Span) -> u8 {
    to_level(interp(distance, domain, range))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

/// Position-based mapping for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelMapping {
    #[serde(default = "default_axis")]
    pub axis: Axis,
    /// Dead border on each side of the frame, px.
    #[serde(default = "default_margin")]
    pub margin_px: f64,
    /// High values at the top/left of the frame.
    #[serde(default)]
    pub invert: bool,
    #[serde(default = "default_range")]
    pub range: Span,
}

fn default_axis() -> Axis {
    Axis::X
}

fn default_margin() -> f64 {
    50.0
}

fn default_range() -> Span {
    Span::PERCENT
}

impl Default for ChannelMapping {
    fn default() -> Self {
        Self {
            axis: default_axis(),
            margin_px: default_margin(),
            invert: false,
            range: default_range(),
        }
    }
}

impl ChannelMapping {
    pub fn horizontal() -> Self {
        Self::default()
    }

    /// Vertical, top of frame = high value.
    pub fn vertical_inverted() -> Self {
        Self {
            axis: Axis::Y,
            invert: true,
            ..Self::default()
        }
    }

    pub fn with_range(mut self, range: Span) -> Self {
        self.range = range;
        self
    }

    /// Coordinate span inside the margins. Frames too small for the margin
    /// use their full extent.
    pub fn domain(&self, width: u32, height: u32) -> Span {
        let extent = match self.axis {
            Axis::X => width as f64,
            Axis::Y => height as f64,
        };
        if extent > 2.0 * self.margin_px {
            Span::new(self.margin_px, extent - self.margin_px)
        } else {
            Span::new(0.0, extent)
        }
    }

    pub fn map_position(&self, anchor: Point, width: u32, height: u32) -> u8 {
        let value = match self.axis {
            Axis::X => anchor.x,
            Axis::Y => anchor.y,
        };
        let range = if self.invert { self.range.reversed() } else { self.range };
        to_level(interp(value, self.domain(width, height), range))
    }
}

/// Device-native volume range (e.g. dB limits reported by the mixer).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NativeRange {
    pub min: f64,
    pub max: f64,
}

impl NativeRange {
    pub fn from_percent(&self, percent: u8) -> f64 {
        interp(percent as f64, Span::PERCENT, Span::new(self.min, self.max))
    }

    pub fn to_percent(&self, level: f64) -> u8 {
        to_level(interp(level, Span::new(self.min, self.max), Span::PERCENT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_distance_mapping_clamps() {
        assert_eq!(map_distance(40.0, PINCH_DOMAIN, Span::PERCENT), 0);
        assert_eq!(map_distance(10.0, PINCH_DOMAIN, Span::PERCENT), 0);
        assert_eq!(map_distance(50.0, PINCH_DOMAIN, Span::PERCENT), 0);
        assert_eq!(map_distance(135.0, PINCH_DOMAIN, Span::PERCENT), 50);
        assert_eq!(map_distance(220.0, PINCH_DOMAIN, Span::PERCENT), 100);
        assert_eq!(map_distance(300.0, PINCH_DOMAIN, Span::PERCENT), 100);
    }

    #[test]
    fn test_distance_mapping_monotonic() {
        let mut last = 0;
        let mut d = 0.0;
        while d <= 400.0 {
            let level = map_distance(d, PINCH_DOMAIN, Span::PERCENT);
            assert!(level >= last, "non-monotonic at d={}", d);
            assert!(level <= 100);
            last = level;
            d += 0.5;
        }
    }

    #[test]
    fn test_degenerate_domain_is_midpoint() {
        assert_eq!(interp(12.0, Span::new(5.0, 5.0), Span::PERCENT), 50.0);
        assert_eq!(interp(12.0, Span::new(5.0, 5.0), Span::new(10.0, 100.0)), 55.0);
    }

    #[test]
    fn test_inverted_range_clamps() {
        let r = Span::PERCENT.reversed();
        assert_eq!(interp(-20.0, Span::new(0.0, 10.0), r), 100.0);
        assert_eq!(interp(30.0, Span::new(0.0, 10.0), r), 0.0);
        assert!(approx_eq(interp(2.5, Span::new(0.0, 10.0), r), 75.0, 1e-12));
    }

    #[test]
    fn test_horizontal_position_with_margin() {
        let m = ChannelMapping::horizontal();
        assert_eq!(m.domain(640, 480), Span::new(50.0, 590.0));
        assert_eq!(m.map_position(Point::new(10.0, 0.0), 640, 480), 0);
        assert_eq!(m.map_position(Point::new(320.0, 0.0), 640, 480), 50);
        assert_eq!(m.map_position(Point::new(600.0, 0.0), 640, 480), 100);
    }

    #[test]
    fn test_vertical_inverted_top_is_loud() {
        let m = ChannelMapping::vertical_inverted();
        assert_eq!(m.map_position(Point::new(0.0, 20.0), 640, 480), 100);
        assert_eq!(m.map_position(Point::new(0.0, 470.0), 640, 480), 0);
        assert_eq!(m.map_position(Point::new(0.0, 240.0), 640, 480), 50);
    }

    #[test]
    fn test_output_floor() {
        let m = ChannelMapping::horizontal().with_range(Span::new(10.0, 100.0));
        assert_eq!(m.map_position(Point::new(0.0, 0.0), 640, 480), 10);
        assert_eq!(m.map_position(Point::new(639.0, 0.0), 640, 480), 100);
    }

    #[test]
    fn test_tiny_frame_uses_full_extent() {
        let m = ChannelMapping::horizontal();
        assert_eq!(m.domain(80, 60), Span::new(0.0, 80.0));
        assert_eq!(ChannelMapping::horizontal().domain(0, 0), Span::new(0.0, 0.0));
        assert_eq!(m.map_position(Point::new(3.0, 0.0), 0, 0), 50);
    }

    #[test]
    fn test_native_range() {
        let r = NativeRange { min: -65.25, max: 0.0 };
        assert_eq!(r.from_percent(100), 0.0);
        assert_eq!(r.from_percent(0), -65.25);
        assert!(approx_eq(r.from_percent(50), -32.625, 1e-9));
        assert_eq!(r.to_percent(-32.625), 50);
    }
}
