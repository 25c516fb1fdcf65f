// src/lib.rs
//! Hand gestures to display brightness and audio volume.
//!
//! Each frame of hand observations goes through one [`ControlSession`]:
//! a strategy-specific extractor turns a hand into a [`ControlFeature`],
//! the classifier derives a [`GestureEvent`], a per-channel lock reacts to
//! it, and unlocked channels are mapped to a 0–100 level.
//!
//! | Strategy | Level from | Lock gesture | Lock policy |
//! |---|---|---|---|
//! | `pinch` | thumb/index distance | pinch | toggle per frame |
//! | `flexion` | wrist position | fist (≥ 4 folded digits) | held while closed |
//! | `contour` | motion region center | fist (solidity ≤ 0.8) | held while closed |
//!
//! The pinch toggle fires on every frame that reports a pinch, so a held
//! pinch flips the lock at the frame rate. The fist strategies track the
//! gesture instead. Both are kept as they are.
//!
//! [`ControlFeature`]: features::ControlFeature
//! [`GestureEvent`]: gesture::GestureEvent

pub mod actuator;
pub mod config;
pub mod data;
pub mod driver;
pub mod error;
pub mod features;
pub mod gesture;
pub mod landmarks;
pub mod lock;
pub mod logging;
pub mod mapper;
pub mod motion;
pub mod session;
pub mod source;
pub mod strategy;

#[cfg(feature = "gui")]
pub mod app;
#[cfg(feature = "gui")]
pub mod ui;

pub use config::Config;
pub use session::{Channel, ChannelState, ControlOutput, ControlSession};
pub use strategy::Strategy;
