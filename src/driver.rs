// src/driver.rs
//! Fixed-interval frame loop.
//!
//! Each tick pulls one pose frame, runs the session, forwards changed
//! values to the actuators and publishes the output on a `watch` channel
//! for the display. The loop only waits between ticks.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::actuator::Actuators;
use crate::config::Config;
use crate::data::SessionRecorder;
use crate::error::AcquisitionError;
use crate::session::{ControlOutput, ControlSession};
use crate::source::PoseSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub frame_interval: Duration,
    pub retry_interval: Duration,
    /// Stop after this many processed frames.
    pub max_frames: Option<u64>,
}

impl DriverConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            frame_interval: Duration::from_millis(config.frame_interval_ms),
            retry_interval: Duration::from_millis(config.retry_interval_ms),
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub frames: u64,
    pub acquisition_failures: u64,
    pub actuator_failures: u64,
}

#[derive(Debug)]
pub enum Tick {
    Processed(ControlOutput),
    /// No frame this cycle; state held.
    Skipped(AcquisitionError),
    Finished,
}

pub struct FrameDriver {
    config: DriverConfig,
    session: ControlSession,
    actuators: Actuators,
    recorder: Option<SessionRecorder>,
    publisher: watch::Sender<Option<ControlOutput>>,
    stats: DriverStats,
}

impl FrameDriver {
    pub fn new(config: DriverConfig, session: ControlSession, actuators: Actuators) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            config,
            session,
            actuators,
            recorder: None,
            publisher,
            stats: DriverStats::default(),
        }
    }

    pub fn with_recorder(mut self, recorder: SessionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ControlOutput>> {
        self.publisher.subscribe()
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn session(&self) -> &ControlSession {
        &self.session
    }

    /// One pipeline pass. Never fails: acquisition errors skip the cycle.
    pub fn tick<S: PoseSource + ?Sized>(&mut self, source: &mut S) -> Tick {
        let frame = match source.next_pose() {
            Ok(frame) => frame,
            Err(AcquisitionError::EndOfStream) => return Tick::Finished,
            Err(e) => {
                self.stats.acquisition_failures += 1;
                return Tick::Skipped(e);
            }
        };

        let output = self.session.process(&frame);
        self.stats.actuator_failures += self.actuators.apply(&output) as u64;
        self.stats.frames += 1;

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.add_frame(&output);
        }
        self.publisher.send_replace(Some(output.clone()));
        Tick::Processed(output)
    }

    /// Run until the source ends, `max_frames` is reached or `shutdown`
    /// resolves. Hands back the recorder for export.
    pub async fn run<S, F>(
        mut self,
        source: &mut S,
        shutdown: F,
    ) -> (DriverStats, Option<SessionRecorder>)
    where
        S: PoseSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut interval = time::interval(self.config.frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            session = %self.session.id(),
            interval_ms = self.config.frame_interval.as_millis() as u64,
            "frame driver started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                _ = interval.tick() => {}
            }

            match self.tick(source) {
                Tick::Processed(_) => {
                    if self.config.max_frames.map_or(false, |max| self.stats.frames >= max) {
                        debug!(frames = self.stats.frames, "frame limit reached");
                        break;
                    }
                }
                Tick::Skipped(e) => {
                    warn!(failures = self.stats.acquisition_failures, "no frame: {}", e);
                    tokio::select! {
                        _ = &mut shutdown => {
                            info!("shutdown requested");
                            break;
                        }
                        _ = time::sleep(self.config.retry_interval) => {}
                    }
                    interval.reset();
                }
                Tick::Finished => {
                    info!("source exhausted");
                    break;
                }
            }
        }

        info!(
            frames = self.stats.frames,
            acquisition_failures = self.stats.acquisition_failures,
            actuator_failures = self.stats.actuator_failures,
            "frame driver stopped"
        );
        (self.stats, self.recorder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Handedness, Point, PoseFrame};
    use crate::source::{synthetic_hand, SyntheticSource};
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Result<PoseFrame, AcquisitionError>>);

    impl PoseSource for Scripted {
        fn next_pose(&mut self) -> Result<PoseFrame, AcquisitionError> {
            self.0.pop_front().unwrap_or(Err(AcquisitionError::EndOfStream))
        }
    }

    fn open_left(x: f64) -> Result<PoseFrame, AcquisitionError> {
        Ok(PoseFrame::new(640, 480).with_hand(synthetic_hand(
            Handedness::Left,
            Point::new(x, 300.0),
            0,
            None,
        )))
    }

    fn driver() -> FrameDriver {
        let config = DriverConfig {
            frame_interval: Duration::from_millis(5),
            retry_interval: Duration::from_millis(10),
            max_frames: None,
        };
        FrameDriver::new(config, ControlSession::new(&Config::default()), Actuators::logging())
    }

    #[test]
    fn test_tick_skips_and_holds_on_acquisition_failure() {
        let mut driver = driver();
        let mut source = Scripted(VecDeque::from(vec![
            open_left(590.0),
            Err(AcquisitionError::Capture("camera busy".into())),
            open_left(50.0),
        ]));

        assert!(matches!(driver.tick(&mut source), Tick::Processed(_)));
        assert!(matches!(driver.tick(&mut source), Tick::Skipped(_)));
        assert_eq!(
            driver.session().state(crate::session::Channel::Brightness).current_value,
            100
        );
        match driver.tick(&mut source) {
            Tick::Processed(out) => assert_eq!(out.brightness.state.current_value, 0),
            other => panic!("unexpected tick {:?}", other),
        }
        assert!(matches!(driver.tick(&mut source), Tick::Finished));
        assert_eq!(
            driver.stats(),
            DriverStats { frames: 2, acquisition_failures: 1, actuator_failures: 0 }
        );
    }

    #[test]
    fn test_tick_publishes_latest_output() {
        let mut driver = driver();
        let rx = driver.subscribe();
        assert!(rx.borrow().is_none());
        let mut source = Scripted(VecDeque::from(vec![open_left(320.0)]));
        driver.tick(&mut source);
        assert_eq!(rx.borrow().clone().map(|o| o.frame), Some(1));
    }

    #[tokio::test]
    async fn test_run_until_end_of_stream_with_retry() {
        let dir = std::env::temp_dir();
        let driver = driver().with_recorder(SessionRecorder::new(&dir, Some("unused".into())));
        let mut source = Scripted(VecDeque::from(vec![
            open_left(100.0),
            Err(AcquisitionError::Unavailable("unplugged".into())),
            open_left(200.0),
            open_left(300.0),
        ]));

        let (stats, recorder) = driver.run(&mut source, std::future::pending()).await;
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.acquisition_failures, 1);
        assert_eq!(recorder.map(|r| r.len()), Some(3));
    }

    #[tokio::test]
    async fn test_run_stops_at_frame_limit() {
        let mut driver = driver();
        driver.config.max_frames = Some(7);
        let mut source = SyntheticSource::new(640, 480);
        let (stats, recorder) = driver.run(&mut source, std::future::pending()).await;
        assert_eq!(stats.frames, 7);
        assert!(recorder.is_none());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let driver = driver();
        let rx = driver.subscribe();
        let mut source = SyntheticSource::new(640, 480);
        let (stats, _) = driver
            .run(&mut source, time::sleep(Duration::from_millis(40)))
            .await;
        assert!(stats.frames >= 1);
        assert!(rx.borrow().is_some());
    }
}
