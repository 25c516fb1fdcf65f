// src/config.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::gesture::GestureThresholds;
use crate::mapper::{ChannelMapping, NativeRange, Span, PINCH_DOMAIN};
use crate::motion::MotionConfig;
use crate::strategy::Strategy;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strategy: Strategy,
    /// Target tick interval of the frame driver.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Wait before retrying a source that produced no frame.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    /// Flip incoming frames horizontally so the user sees a mirror.
    #[serde(default = "default_mirror")]
    pub mirror: bool,
    #[serde(default)]
    pub thresholds: GestureThresholds,
    #[serde(default = "default_pinch_domain")]
    pub pinch_domain: Span,
    /// Unset mappings take the strategy's defaults.
    #[serde(default)]
    pub brightness: Option<ChannelMapping>,
    #[serde(default)]
    pub volume: Option<ChannelMapping>,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub volume_native_range: Option<NativeRange>,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

fn default_frame_interval_ms() -> u64 {
    30
}

fn default_retry_interval_ms() -> u64 {
    100
}

fn default_frame_width() -> u32 {
    640
}

fn default_frame_height() -> u32 {
    480
}

fn default_mirror() -> bool {
    true
}

fn default_pinch_domain() -> Span {
    PINCH_DOMAIN
}

fn default_export_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.document_dir().map(|p| p.join("GestureControl")))
        .unwrap_or_else(|| PathBuf::from("./output"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            frame_interval_ms: default_frame_interval_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            mirror: default_mirror(),
            thresholds: GestureThresholds::default(),
            pinch_domain: default_pinch_domain(),
            brightness: None,
            volume: None,
            motion: MotionConfig::default(),
            volume_native_range: None,
            export_dir: default_export_dir(),
        }
    }
}

impl Config {
    pub fn for_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn brightness_mapping(&self) -> ChannelMapping {
        self.brightness
            .unwrap_or_else(|| self.strategy.default_brightness_mapping())
    }

    pub fn volume_mapping(&self) -> ChannelMapping {
        self.volume
            .unwrap_or_else(|| self.strategy.default_volume_mapping())
    }

    /// `<config dir>/GestureControl/config.json`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "GestureControl", "GestureControl")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, else the default location if a file exists there, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            info!(path = %path.display(), "loading config");
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "loading config");
                Self::load(path)
            }
            _ => {
                debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.frame_interval_ms == 0 {
            return invalid("frame_interval_ms must be positive".into());
        }
        if self.retry_interval_ms == 0 {
            return invalid("retry_interval_ms must be positive".into());
        }
        if self.thresholds.pinch_distance_px <= 0.0 {
            return invalid(format!(
                "pinch_distance_px must be positive, got {}",
                self.thresholds.pinch_distance_px
            ));
        }
        if !(1..=5).contains(&self.thresholds.fist_min_folded) {
            return invalid(format!(
                "fist_min_folded must be within 1..=5, got {}",
                self.thresholds.fist_min_folded
            ));
        }
        if !(0.0..=1.0).contains(&self.thresholds.fist_max_solidity) {
            return invalid(format!(
                "fist_max_solidity must be within [0, 1], got {}",
                self.thresholds.fist_max_solidity
            ));
        }
        if self.pinch_domain.hi < self.pinch_domain.lo {
            return invalid(format!(
                "pinch_domain is inverted: [{}, {}]",
                self.pinch_domain.lo, self.pinch_domain.hi
            ));
        }

        for (name, mapping) in [
            ("brightness", self.brightness_mapping()),
            ("volume", self.volume_mapping()),
        ] {
            let range = mapping.range;
            if range.hi < range.lo {
                return invalid(format!("{} range is inverted; use `invert`", name));
            }
            if range.lo < 0.0 || range.hi > 100.0 {
                return invalid(format!(
                    "{} range must lie within [0, 100], got [{}, {}]",
                    name, range.lo, range.hi
                ));
            }
            if mapping.margin_px < 0.0 {
                return invalid(format!("{} margin_px must not be negative", name));
            }
        }

        if let Some(native) = self.volume_native_range {
            if (native.max - native.min).abs() < f64::EPSILON {
                return invalid("volume_native_range must not be empty".into());
            }
        }

        if self.motion.history == 0 {
            return invalid("motion.history must be positive".into());
        }
        if self.motion.var_threshold <= 0.0 {
            return invalid("motion.var_threshold must be positive".into());
        }
        if self.motion.min_variance > self.motion.max_variance {
            return invalid("motion.min_variance exceeds motion.max_variance".into());
        }

        Ok(())
    }
}
