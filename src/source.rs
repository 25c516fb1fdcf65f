// src/source.rs
//! Frame and pose sources feeding the driver.
//!
//! Landmark strategies consume [`PoseFrame`]s from an external estimator,
//! read here as a JSON-lines stream. The contour strategy consumes raw
//! frames (camera or image directory) through [`MotionPoseSource`].

use std::f64::consts::TAU;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::AcquisitionError;
use crate::landmarks::{index, HandObservation, Handedness, Point, PoseFrame, HAND_LANDMARK_COUNT};
use crate::motion::{MotionConfig, MotionDetector};

pub trait FrameSource {
    fn next_frame(&mut self) -> Result<RgbImage, AcquisitionError>;
}

pub trait PoseSource {
    fn next_pose(&mut self) -> Result<PoseFrame, AcquisitionError>;
}

impl<T: PoseSource + ?Sized> PoseSource for Box<T> {
    fn next_pose(&mut self) -> Result<PoseFrame, AcquisitionError> {
        (**self).next_pose()
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<RgbImage, AcquisitionError> {
        (**self).next_frame()
    }
}

// ---------------------------------------------------------------------------
// Pose stream
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PoseRecord {
    width: u32,
    height: u32,
    /// Coordinates in [0, 1]. Inferred when absent.
    #[serde(default)]
    normalized: Option<bool>,
    #[serde(default)]
    hands: Vec<HandRecord>,
}

#[derive(Debug, Deserialize)]
struct HandRecord {
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default)]
    landmarks: Vec<LandmarkRecord>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum LandmarkRecord {
    Pair([f64; 2]),
    Triple([f64; 3]),
    Object { x: f64, y: f64 },
}

impl LandmarkRecord {
    fn xy(&self) -> (f64, f64) {
        match *self {
            Self::Pair([x, y]) | Self::Triple([x, y, _]) | Self::Object { x, y } => (x, y),
        }
    }
}

impl PoseRecord {
    fn into_frame(self) -> PoseFrame {
        let normalized = self.normalized.unwrap_or_else(|| {
            let mut coords = self
                .hands
                .iter()
                .flat_map(|h| h.landmarks.iter().map(|l| l.xy()))
                .peekable();
            coords.peek().is_some()
                && coords.all(|(x, y)| (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y))
        });
        let (sx, sy) = if normalized {
            (self.width as f64, self.height as f64)
        } else {
            (1.0, 1.0)
        };

        let hands = self
            .hands
            .into_iter()
            .map(|hand| {
                let handedness = hand
                    .handedness
                    .as_deref()
                    .map(Handedness::from_label)
                    .unwrap_or_default();
                let landmarks = hand
                    .landmarks
                    .iter()
                    .map(|l| {
                        let (x, y) = l.xy();
                        Point::new(x * sx, y * sy)
                    })
                    .collect();
                HandObservation::from_landmarks(handedness, landmarks)
            })
            .collect();

        PoseFrame {
            width: self.width,
            height: self.height,
            hands,
        }
    }
}

/// One JSON object per line, as written by an external landmark estimator:
///
/// ```json
/// {"width":640,"height":480,"hands":[{"handedness":"left","landmarks":[[0.41,0.72],...]}]}
/// ```
pub struct PoseStreamSource<R> {
    reader: R,
    line: usize,
    mirror: bool,
    buf: String,
}

impl PoseStreamSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AcquisitionError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            AcquisitionError::Unavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "replaying pose stream");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> PoseStreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            mirror: false,
            buf: String::new(),
        }
    }

    /// Flip landmarks horizontally, for estimators fed unmirrored frames.
    pub fn mirrored(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> PoseSource for PoseStreamSource<R> {
    fn next_pose(&mut self) -> Result<PoseFrame, AcquisitionError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Err(AcquisitionError::EndOfStream);
            }
            self.line += 1;

            let text = self.buf.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let record: PoseRecord = serde_json::from_str(text).map_err(|source| {
                AcquisitionError::Malformed {
                    line: self.line,
                    source,
                }
            })?;
            let mut frame = record.into_frame();
            if self.mirror {
                frame = frame.mirrored();
            }
            frame.clamp_to_frame();
            return Ok(frame);
        }
    }
}

// ---------------------------------------------------------------------------
// Synthetic hands
// ---------------------------------------------------------------------------

/// Digits in folding order: pinky first, thumb last.
const FOLD_ORDER: [usize; 5] = [4, 3, 2, 1, 0];

/// A full 21-landmark upright hand with its wrist at `wrist`.
///
/// `folded` digits (0–5) are curled, pinky first and thumb last.
/// `pinch_gap` moves the thumb tip beside the index tip at that distance,
/// which makes the thumb share the index finger's fold state.
pub fn synthetic_hand(
    handedness: Handedness,
    wrist: Point,
    folded: u8,
    pinch_gap: Option<f64>,
) -> HandObservation {
    let (wx, wy) = (wrist.x, wrist.y);
    let mut curled = [false; 5];
    for digit in FOLD_ORDER.iter().take(folded.min(5) as usize) {
        curled[*digit] = true;
    }

    let mut lm = vec![Point::new(wx, wy); HAND_LANDMARK_COUNT];

    let tx = wx - 40.0;
    lm[index::THUMB_CMC] = Point::new(tx, wy - 15.0);
    lm[index::THUMB_MCP] = Point::new(tx, wy - 30.0);
    lm[index::THUMB_IP] = Point::new(tx, wy - 50.0);
    lm[index::THUMB_TIP] = Point::new(tx, if curled[0] { wy - 30.0 } else { wy - 80.0 });

    for finger in 1..5 {
        let base = index::INDEX_MCP + (finger - 1) * 4;
        let x = wx + (finger as f64 - 2.0) * 20.0;
        lm[base] = Point::new(x, wy - 30.0);
        lm[base + 1] = Point::new(x, wy - 60.0);
        if curled[finger] {
            lm[base + 2] = Point::new(x, wy - 50.0);
            lm[base + 3] = Point::new(x, wy - 40.0);
        } else {
            lm[base + 2] = Point::new(x, wy - 80.0);
            lm[base + 3] = Point::new(x, wy - 100.0);
        }
    }

    if let Some(gap) = pinch_gap {
        let tip = lm[index::INDEX_TIP];
        lm[index::THUMB_TIP] = Point::new(tip.x - gap, tip.y);
    }

    HandObservation::from_landmarks(handedness, lm)
}

/// Deterministic two-hand demo: the left hand sweeps horizontally, the
/// right hand vertically, with periodic fists and pinches.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    period: u64,
    tick: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            period: 120,
            tick: 0,
        }
    }

    pub fn with_period(mut self, frames: u64) -> Self {
        self.period = frames.max(4);
        self
    }

    fn frame_at(&self, tick: u64) -> PoseFrame {
        let (w, h) = (self.width as f64, self.height as f64);
        let cycle = tick / self.period;
        let phase = (tick % self.period) as f64 / self.period as f64;
        let wave = (TAU * phase).sin();

        // every third cycle the hands close for the middle of the sweep
        let folded = if cycle % 3 == 2 && (0.4..0.6).contains(&phase) { 5 } else { 0 };
        let gap = 20.0 + 100.0 * (1.0 + wave);

        let left = synthetic_hand(
            Handedness::Left,
            Point::new(w / 2.0 + (w / 2.0 - 80.0).max(0.0) * wave, h * 0.75),
            folded,
            Some(gap),
        );
        let right = synthetic_hand(
            Handedness::Right,
            Point::new(w * 0.75, h / 2.0 + (h / 2.0 - 100.0).max(0.0) * (TAU * phase).cos()),
            folded,
            Some(gap),
        );

        let mut frame = PoseFrame::new(self.width, self.height)
            .with_hand(left)
            .with_hand(right);
        frame.clamp_to_frame();
        frame
    }
}

impl PoseSource for SyntheticSource {
    fn next_pose(&mut self) -> Result<PoseFrame, AcquisitionError> {
        let frame = self.frame_at(self.tick);
        self.tick += 1;
        Ok(frame)
    }
}

/// Rendered frames of a bright blob drifting over a dark scene, alternating
/// between a compact block and a spread hand shape.
pub struct SyntheticFrames {
    width: u32,
    height: u32,
    period: u64,
    tick: u64,
}

impl SyntheticFrames {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            period: 120,
            tick: 0,
        }
    }

    fn render(&self, tick: u64) -> RgbImage {
        let (w, h) = (self.width as f64, self.height as f64);
        let phase = (tick % self.period) as f64 / self.period as f64;
        let cx = w / 2.0 + (w / 3.0) * (TAU * phase).sin();
        let cy = h / 2.0 + (h / 4.0) * (TAU * phase).cos();
        let spread = (tick / self.period) % 2 == 1;

        RgbImage::from_fn(self.width, self.height, |x, y| {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let palm = dx.abs() < 35.0 && dy.abs() < 35.0;
            let finger = spread
                && dy < -35.0
                && dy > -95.0
                && [-30.0, -10.0, 10.0, 30.0].iter().any(|fx| (dx - fx).abs() < 4.0);
            if palm || finger {
                Rgb([225, 190, 170])
            } else {
                Rgb([24, 24, 28])
            }
        })
    }
}

impl FrameSource for SyntheticFrames {
    fn next_frame(&mut self) -> Result<RgbImage, AcquisitionError> {
        let frame = self.render(self.tick);
        self.tick += 1;
        Ok(frame)
    }
}

// ---------------------------------------------------------------------------
// Frame sources
// ---------------------------------------------------------------------------

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Still frames from a directory, in file-name order.
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AcquisitionError> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(AcquisitionError::Unavailable(format!(
                "no image frames in {}",
                dir.display()
            )));
        }
        info!(dir = %dir.display(), frames = files.len(), "reading image frames");
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<RgbImage, AcquisitionError> {
        let path = self.files.get(self.next).ok_or(AcquisitionError::EndOfStream)?;
        self.next += 1;
        let img = image::open(path)
            .map_err(|e| AcquisitionError::Capture(format!("{}: {}", path.display(), e)))?;
        Ok(img.to_rgb8())
    }
}

/// Runs background subtraction over a frame source. Every frame pulled is
/// folded into the model exactly once.
pub struct MotionPoseSource<F> {
    frames: F,
    detector: MotionDetector,
    mirror: bool,
}

impl<F: FrameSource> MotionPoseSource<F> {
    pub fn new(frames: F, config: MotionConfig) -> Self {
        Self {
            frames,
            detector: MotionDetector::new(config),
            mirror: false,
        }
    }

    pub fn mirrored(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }
}

impl<F: FrameSource> PoseSource for MotionPoseSource<F> {
    fn next_pose(&mut self) -> Result<PoseFrame, AcquisitionError> {
        let mut frame = self.frames.next_frame()?;
        if self.mirror {
            frame = image::imageops::flip_horizontal(&frame);
        }
        let pose = self.detector.detect_frame(&frame);
        if pose.is_empty() {
            debug!("no motion");
        }
        Ok(pose)
    }
}

#[cfg(feature = "camera")]
pub use camera::CameraSource;

#[cfg(feature = "camera")]
mod camera {
    use image::RgbImage;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    };
    use nokhwa::Camera;
    use tracing::{debug, info, warn};

    use super::FrameSource;
    use crate::error::AcquisitionError;

    pub struct CameraSource {
        camera: Camera,
    }

    impl CameraSource {
        pub fn open(index: u32, width: u32, height: u32) -> Result<Self, AcquisitionError> {
            debug!(index, width, height, "opening camera");
            let format = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30);
            let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

            let camera = Camera::new(CameraIndex::Index(index), requested)
                .map_err(|e| AcquisitionError::Unavailable(format!("camera {}: {}", index, e)))?;
            info!(index, resolution = %camera.resolution(), "camera opened");
            Ok(Self { camera })
        }
    }

    impl FrameSource for CameraSource {
        fn next_frame(&mut self) -> Result<RgbImage, AcquisitionError> {
            if !self.camera.is_stream_open() {
                self.camera
                    .open_stream()
                    .map_err(|e| AcquisitionError::Unavailable(e.to_string()))?;
            }
            let frame = self
                .camera
                .frame()
                .map_err(|e| AcquisitionError::Capture(e.to_string()))?;
            frame
                .decode_image::<RgbFormat>()
                .map_err(|e| AcquisitionError::Capture(format!("decode: {}", e)))
        }
    }

    impl Drop for CameraSource {
        fn drop(&mut self) {
            if let Err(e) = self.camera.stop_stream() {
                warn!("failed to stop camera stream: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureExtractor, FingerFlexion, PinchDistance};
    use std::io::Cursor;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_synthetic_pinch_gap_is_distance() {
        let hand = synthetic_hand(Handedness::Left, Point::new(300.0, 300.0), 0, Some(42.0));
        let f = PinchDistance.extract(&hand).unwrap();
        assert!(approx_eq(f.value.scalar(), 42.0, 1e-9));
        assert_eq!(FingerFlexion::folded_digits(&hand).unwrap(), 0);

        let fist = synthetic_hand(Handedness::Left, Point::new(300.0, 300.0), 5, Some(5.0));
        assert_eq!(FingerFlexion::folded_digits(&fist).unwrap(), 5);
    }

    #[test]
    fn test_pose_stream_pixels_and_handedness() {
        let input = concat!(
            r#"{"width":640,"height":480,"hands":[{"handedness":"Right","landmarks":[[100,200],[110,210]]}]}"#,
            "\n\n",
            r#"{"width":640,"height":480,"hands":[]}"#,
            "\n"
        );
        let mut source = PoseStreamSource::new(Cursor::new(input));

        let frame = source.next_pose().unwrap();
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].handedness, Handedness::Right);
        assert_eq!(frame.hands[0].landmarks[1], Point::new(110.0, 210.0));

        assert!(source.next_pose().unwrap().is_empty());
        assert!(matches!(source.next_pose(), Err(AcquisitionError::EndOfStream)));
        assert_eq!(source.lines_read(), 3);
    }

    #[test]
    fn test_pose_stream_scales_normalised_coordinates() {
        let input = r#"{"width":640,"height":480,"hands":[{"landmarks":[{"x":0.5,"y":0.25,"z":-0.1},[1.0,1.0,0.0]]}]}"#;
        let mut source = PoseStreamSource::new(Cursor::new(input));
        let frame = source.next_pose().unwrap();
        let hand = &frame.hands[0];
        assert_eq!(hand.handedness, Handedness::Unknown);
        assert_eq!(hand.landmarks[0], Point::new(320.0, 120.0));
        // clamped into the frame
        assert_eq!(hand.landmarks[1], Point::new(639.0, 479.0));
    }

    #[test]
    fn test_pose_stream_mirror() {
        let input = r#"{"width":100,"height":100,"normalized":false,"hands":[{"landmarks":[[10,5]]}]}"#;
        let mut source = PoseStreamSource::new(Cursor::new(input)).mirrored(true);
        let frame = source.next_pose().unwrap();
        assert_eq!(frame.hands[0].landmarks[0], Point::new(89.0, 5.0));
    }

    #[test]
    fn test_pose_stream_malformed_line() {
        let input = "{\"width\":640,\"height\":480}\nnot json\n";
        let mut source = PoseStreamSource::new(Cursor::new(input));
        assert!(source.next_pose().is_ok());
        match source.next_pose() {
            Err(AcquisitionError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed record, got {:?}", other.map(|f| f.hands.len())),
        }
    }

    #[test]
    fn test_synthetic_source_is_deterministic() {
        let mut a = SyntheticSource::new(640, 480).with_period(40);
        let mut b = SyntheticSource::new(640, 480).with_period(40);
        for _ in 0..100 {
            let fa = a.next_pose().unwrap();
            let fb = b.next_pose().unwrap();
            assert_eq!(fa, fb);
            assert_eq!(fa.hands.len(), 2);
            for p in fa.hands.iter().flat_map(|h| h.landmarks.iter()) {
                assert!(p.x >= 0.0 && p.x < 640.0 && p.y >= 0.0 && p.y < 480.0);
            }
        }
    }

    #[test]
    fn test_synthetic_source_closes_hands() {
        let mut source = SyntheticSource::new(640, 480).with_period(10);
        let folded: Vec<u8> = (0..30)
            .map(|_| {
                let frame = source.next_pose().unwrap();
                FingerFlexion::folded_digits(&frame.hands[0]).unwrap()
            })
            .collect();
        assert!(folded.iter().any(|&n| n >= 4));
        assert!(folded.iter().any(|&n| n == 0));
    }

    #[test]
    fn test_motion_source_over_synthetic_frames() {
        let mut source =
            MotionPoseSource::new(SyntheticFrames::new(320, 240), MotionConfig::default())
                .mirrored(true);
        assert!(source.next_pose().unwrap().is_empty());
        let frame = source.next_pose().unwrap();
        assert_eq!((frame.width, frame.height), (320, 240));
        assert_eq!(source.detector().model().frames_seen(), 2);
    }

    #[test]
    fn test_image_dir_source() {
        let dir = std::env::temp_dir().join(format!("gesture_frames_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut frames = SyntheticFrames::new(64, 48);
        for i in 0..3 {
            frames
                .next_frame()
                .unwrap()
                .save(dir.join(format!("frame_{:04}.png", i)))
                .unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "skip me").unwrap();

        let mut source = ImageDirSource::open(&dir).unwrap();
        assert_eq!(source.len(), 3);
        for _ in 0..3 {
            assert_eq!(source.next_frame().unwrap().dimensions(), (64, 48));
        }
        assert!(matches!(source.next_frame(), Err(AcquisitionError::EndOfStream)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_image_dir_source_empty() {
        let dir = std::env::temp_dir().join(format!("gesture_empty_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(matches!(ImageDirSource::open(&dir), Err(AcquisitionError::Unavailable(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
}
