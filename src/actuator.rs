// src/actuator.rs
//! Brightness and volume backends.
//!
//! Failures never reach the session: [`Actuators::apply`] logs them and
//! moves on, and the session's values are not rolled back.

use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::ActuatorError;
use crate::mapper::NativeRange;
use crate::session::ControlOutput;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeLevel {
    Percent(u8),
    /// Device-native level, e.g. dB.
    Native(f64),
}

pub trait BrightnessActuator: Send {
    fn name(&self) -> &'static str;
    fn set_brightness(&mut self, percent: u8) -> Result<(), ActuatorError>;
    /// Current device level, used to seed the session.
    fn current(&mut self) -> Option<u8> {
        None
    }
}

pub trait VolumeActuator: Send {
    fn name(&self) -> &'static str;
    fn set_volume(&mut self, level: VolumeLevel) -> Result<(), ActuatorError>;
    fn current(&mut self) -> Option<u8> {
        None
    }
}

/// Headless backend: records and logs values without touching the system.
#[derive(Debug, Default, Clone)]
pub struct LoggingActuator {
    pub brightness: Option<u8>,
    pub volume: Option<VolumeLevel>,
}

impl BrightnessActuator for LoggingActuator {
    fn name(&self) -> &'static str {
        "log"
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), ActuatorError> {
        info!(percent, "brightness");
        self.brightness = Some(percent);
        Ok(())
    }

    fn current(&mut self) -> Option<u8> {
        self.brightness
    }
}

impl VolumeActuator for LoggingActuator {
    fn name(&self) -> &'static str {
        "log"
    }

    fn set_volume(&mut self, level: VolumeLevel) -> Result<(), ActuatorError> {
        info!(?level, "volume");
        self.volume = Some(level);
        Ok(())
    }

    fn current(&mut self) -> Option<u8> {
        match self.volume {
            Some(VolumeLevel::Percent(p)) => Some(p),
            _ => None,
        }
    }
}

fn run(backend: &'static str, cmd: &mut Command) -> Result<String, ActuatorError> {
    debug!(backend, command = ?cmd, "running");
    let output = cmd
        .output()
        .map_err(|source| ActuatorError::Spawn { backend, source })?;
    if !output.status.success() {
        return Err(ActuatorError::CommandFailed {
            backend,
            detail: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Backlight via `brightnessctl`.
#[derive(Debug, Clone, Default)]
pub struct BrightnessCtl {
    /// Specific device (`-d`), otherwise the default backlight.
    pub device: Option<String>,
}

impl BrightnessCtl {
    const BACKEND: &'static str = "brightnessctl";

    fn command(&self) -> Command {
        let mut cmd = Command::new(Self::BACKEND);
        if let Some(device) = &self.device {
            cmd.arg("-d").arg(device);
        }
        cmd
    }
}

/// Percentage column of `brightnessctl -m` (`device,class,current,NN%,max`).
pub fn parse_brightnessctl(output: &str) -> Option<u8> {
    let field = output.lines().next()?.split(',').nth(3)?;
    field.trim().trim_end_matches('%').parse().ok()
}

impl BrightnessActuator for BrightnessCtl {
    fn name(&self) -> &'static str {
        Self::BACKEND
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), ActuatorError> {
        run(
            Self::BACKEND,
            self.command().arg("-q").arg("set").arg(format!("{}%", percent.min(100))),
        )
        .map(|_| ())
    }

    fn current(&mut self) -> Option<u8> {
        match run(Self::BACKEND, self.command().arg("-m")) {
            Ok(out) => parse_brightnessctl(&out),
            Err(e) => {
                debug!("cannot read brightness: {}", e);
                None
            }
        }
    }
}

/// ALSA mixer control via `amixer`.
#[derive(Debug, Clone)]
pub struct AmixerVolume {
    pub control: String,
}

impl Default for AmixerVolume {
    fn default() -> Self {
        Self {
            control: "Master".to_string(),
        }
    }
}

/// First `[NN%]` in `amixer get` output.
pub fn parse_amixer(output: &str) -> Option<u8> {
    output
        .split('[')
        .skip(1)
        .filter_map(|field| field.split_once(']').map(|(inner, _)| inner))
        .find_map(|inner| inner.strip_suffix('%')?.trim().parse().ok())
}

impl AmixerVolume {
    const BACKEND: &'static str = "amixer";
}

impl VolumeActuator for AmixerVolume {
    fn name(&self) -> &'static str {
        Self::BACKEND
    }

    fn set_volume(&mut self, level: VolumeLevel) -> Result<(), ActuatorError> {
        let value = match level {
            VolumeLevel::Percent(p) => format!("{}%", p.min(100)),
            VolumeLevel::Native(db) => format!("{:.2}dB", db),
        };
        run(
            Self::BACKEND,
            Command::new(Self::BACKEND)
                .arg("-q")
                .arg("set")
                .arg(&self.control)
                .arg(value),
        )
        .map(|_| ())
    }

    fn current(&mut self) -> Option<u8> {
        match run(Self::BACKEND, Command::new(Self::BACKEND).arg("get").arg(&self.control)) {
            Ok(out) => parse_amixer(&out),
            Err(e) => {
                debug!("cannot read volume: {}", e);
                None
            }
        }
    }
}

/// Forwards changed values to both backends.
pub struct Actuators {
    brightness: Box<dyn BrightnessActuator>,
    volume: Box<dyn VolumeActuator>,
    native_range: Option<NativeRange>,
    failures: u64,
}

impl Actuators {
    pub fn new(brightness: Box<dyn BrightnessActuator>, volume: Box<dyn VolumeActuator>) -> Self {
        Self {
            brightness,
            volume,
            native_range: None,
            failures: 0,
        }
    }

    pub fn logging() -> Self {
        Self::new(
            Box::new(LoggingActuator::default()),
            Box::new(LoggingActuator::default()),
        )
    }

    pub fn system() -> Self {
        Self::new(Box::new(BrightnessCtl::default()), Box::new(AmixerVolume::default()))
    }

    pub fn with_native_range(mut self, range: Option<NativeRange>) -> Self {
        self.native_range = range;
        self
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn current_brightness(&mut self) -> Option<u8> {
        self.brightness.current()
    }

    pub fn current_volume(&mut self) -> Option<u8> {
        self.volume.current()
    }

    fn volume_level(&self, percent: u8) -> VolumeLevel {
        match self.native_range {
            Some(range) => VolumeLevel::Native(range.from_percent(percent)),
            None => VolumeLevel::Percent(percent),
        }
    }

    /// Push the values that moved this frame. Returns the number of failures.
    pub fn apply(&mut self, output: &ControlOutput) -> usize {
        let mut failed = 0;

        if output.brightness.value_changed {
            let value = output.brightness.state.current_value;
            if let Err(e) = self.brightness.set_brightness(value) {
                warn!(backend = self.brightness.name(), value, "brightness not applied: {}", e);
                failed += 1;
            }
        }

        if output.volume.value_changed {
            let value = output.volume.state.current_value;
            let level = self.volume_level(value);
            if let Err(e) = self.volume.set_volume(level) {
                warn!(backend = self.volume.name(), value, "volume not applied: {}", e);
                failed += 1;
            }
        }

        self.failures += failed as u64;
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ChannelReport, ChannelState};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl BrightnessActuator for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn set_brightness(&mut self, percent: u8) -> Result<(), ActuatorError> {
            self.calls.lock().unwrap().push(format!("b{}", percent));
            if self.fail {
                return Err(ActuatorError::Unavailable {
                    backend: "recorder",
                    reason: "no backlight".into(),
                });
            }
            Ok(())
        }
    }

    impl VolumeActuator for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn set_volume(&mut self, level: VolumeLevel) -> Result<(), ActuatorError> {
            self.calls.lock().unwrap().push(match level {
                VolumeLevel::Percent(p) => format!("v{}%", p),
                VolumeLevel::Native(db) => format!("v{:.1}dB", db),
            });
            Ok(())
        }
    }

    fn output(b: u8, b_changed: bool, v: u8, v_changed: bool) -> ControlOutput {
        let report = |value, changed| ChannelReport {
            state: ChannelState {
                locked: false,
                current_value: value,
            },
            value_changed: changed,
            observed: true,
            ..ChannelReport::default()
        };
        ControlOutput {
            brightness: report(b, b_changed),
            volume: report(v, v_changed),
            ..ControlOutput::default()
        }
    }

    #[test]
    fn test_only_changed_values_are_sent() {
        let rec = Recorder::default();
        let mut actuators = Actuators::new(Box::new(rec.clone()), Box::new(rec.clone()));
        actuators.apply(&output(40, true, 70, false));
        actuators.apply(&output(40, false, 75, true));
        assert_eq!(*rec.calls.lock().unwrap(), vec!["b40", "v75%"]);
    }

    #[test]
    fn test_native_volume_range() {
        let rec = Recorder::default();
        let mut actuators = Actuators::new(Box::new(rec.clone()), Box::new(rec.clone()))
            .with_native_range(Some(NativeRange { min: -60.0, max: 0.0 }));
        actuators.apply(&output(0, false, 50, true));
        assert_eq!(*rec.calls.lock().unwrap(), vec!["v-30.0dB"]);
    }

    #[test]
    fn test_failures_are_counted_not_fatal() {
        let failing = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let ok = Recorder::default();
        let mut actuators = Actuators::new(Box::new(failing), Box::new(ok.clone()));
        assert_eq!(actuators.apply(&output(10, true, 20, true)), 1);
        assert_eq!(actuators.apply(&output(11, true, 20, false)), 1);
        assert_eq!(actuators.failures(), 2);
        assert_eq!(*ok.calls.lock().unwrap(), vec!["v20%"]);
    }

    #[test]
    fn test_logging_actuator_reports_current() {
        let mut actuators = Actuators::logging();
        assert_eq!(actuators.current_brightness(), None);
        actuators.apply(&output(33, true, 66, true));
        assert_eq!(actuators.current_brightness(), Some(33));
        assert_eq!(actuators.current_volume(), Some(66));
    }

    #[test]
    fn test_parse_brightnessctl() {
        assert_eq!(parse_brightnessctl("intel_backlight,backlight,937,39%,2400\n"), Some(39));
        assert_eq!(parse_brightnessctl("garbage"), None);
    }

    #[test]
    fn test_parse_amixer() {
        let out = "Simple mixer control 'Master',0\n  Mono: Playback 65536 [100%] [0.00dB] [on]\n  Front Left: Playback 41942 [64%] [on]";
        assert_eq!(parse_amixer(out), Some(100));
        assert_eq!(parse_amixer("Mono: Playback [on]"), None);
        assert_eq!(parse_amixer("Mono: Playback [on] [50%]"), Some(50));
        assert_eq!(
            parse_amixer("Front Left: Playback 39321 [60%] [-12.00dB] [on]"),
            Some(60)
        );
        assert_eq!(parse_amixer("Mono: Playback [off] [x%] [7%]"), Some(7));
    }
}
