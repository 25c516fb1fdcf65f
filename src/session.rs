// src/session.rs
//! Per-frame orchestration: hands are bound to channels, then each channel
//! runs extract → classify → lock → map-if-unlocked.
//!
//! [`ControlSession`] is the only owner of the two [`ChannelState`]s. The
//! lock updates `locked`, the mapper updates `current_value`, and nothing
//! else touches either.

use serde::Serialize;
use tracing::{debug, debug_span, info, trace};
use uuid::Uuid;

use crate::config::Config;
use crate::features::{ControlFeature, FeatureExtractor};
use crate::gesture::{classify, GestureEvent, GestureThresholds};
use crate::landmarks::{HandObservation, Handedness, PoseFrame};
use crate::lock::ChannelLock;
use crate::mapper::{map_distance, ChannelMapping, Span};
use crate::strategy::Strategy;

/// Level a channel starts at before the first mapped frame.
pub const INITIAL_LEVEL: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Brightness,
    Volume,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Brightness, Channel::Volume];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Volume => "volume",
        }
    }

    fn slot(&self) -> usize {
        match self {
            Self::Brightness => 0,
            Self::Volume => 1,
        }
    }

    fn for_hand(handedness: Handedness, index: usize) -> Self {
        match handedness {
            Handedness::Left => Self::Brightness,
            Handedness::Right => Self::Volume,
            Handedness::Unknown if index == 0 => Self::Brightness,
            Handedness::Unknown => Self::Volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelState {
    pub locked: bool,
    pub current_value: u8,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            locked: false,
            current_value: INITIAL_LEVEL,
        }
    }
}

/// What happened to one channel during one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelReport {
    pub state: ChannelState,
    pub gesture: GestureEvent,
    /// A hand was assigned to this channel this frame.
    pub observed: bool,
    /// `current_value` moved.
    pub value_changed: bool,
    pub lock_changed: bool,
    pub feature: Option<ControlFeature>,
}

/// Per-frame result handed to actuators and the display layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlOutput {
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    pub brightness: ChannelReport,
    pub volume: ChannelReport,
}

impl ControlOutput {
    pub fn channel(&self, channel: Channel) -> &ChannelReport {
        match channel {
            Channel::Brightness => &self.brightness,
            Channel::Volume => &self.volume,
        }
    }

    pub fn values(&self) -> (u8, u8) {
        (
            self.brightness.state.current_value,
            self.volume.state.current_value,
        )
    }

    pub fn lock_flags(&self) -> (bool, bool) {
        (self.brightness.state.locked, self.volume.state.locked)
    }

    /// `"Brightness Locked, Volume Locked"`, one of the halves, or `"Ready"`.
    pub fn status(&self) -> String {
        let mut parts = Vec::new();
        if self.brightness.state.locked {
            parts.push("Brightness Locked");
        }
        if self.volume.state.locked {
            parts.push("Volume Locked");
        }
        if parts.is_empty() {
            "Ready".to_string()
        } else {
            parts.join(", ")
        }
    }
}

struct ChannelSlot {
    channel: Channel,
    mapping: ChannelMapping,
    state: ChannelState,
    lock: ChannelLock,
}

pub struct ControlSession {
    id: Uuid,
    strategy: Strategy,
    extractor: Box<dyn FeatureExtractor + Send>,
    thresholds: GestureThresholds,
    pinch_domain: Span,
    slots: [ChannelSlot; 2],
    frame_seq: u64,
}

impl ControlSession {
    pub fn new(config: &Config) -> Self {
        let strategy = config.strategy;
        let slot = |channel, mapping| ChannelSlot {
            channel,
            mapping,
            state: ChannelState::default(),
            lock: ChannelLock::new(strategy.lock_policy()),
        };

        let session = Self {
            id: Uuid::new_v4(),
            strategy,
            extractor: strategy.extractor(config.motion.min_area),
            thresholds: config.thresholds,
            pinch_domain: config.pinch_domain,
            slots: [
                slot(Channel::Brightness, config.brightness_mapping()),
                slot(Channel::Volume, config.volume_mapping()),
            ],
            frame_seq: 0,
        };
        info!(session = %session.id, strategy = %strategy, "control session started");
        session
    }

    /// Start a channel from a level read back from the device.
    pub fn with_initial_value(mut self, channel: Channel, value: u8) -> Self {
        self.slots[channel.slot()].state.current_value = value.min(100);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_seq
    }

    pub fn state(&self, channel: Channel) -> ChannelState {
        self.slots[channel.slot()].state
    }

    /// Run the pipeline for one frame. Frames must arrive in capture order.
    pub fn process(&mut self, frame: &PoseFrame) -> ControlOutput {
        self.frame_seq += 1;
        let seq = self.frame_seq;
        let span = debug_span!("frame", session = %self.id, seq);
        let _enter = span.enter();

        let assigned = self.assign(frame);
        let [brightness, volume] = [0, 1].map(|slot| {
            self.run_channel(slot, assigned[slot], frame.width, frame.height)
        });

        trace!(
            brightness = brightness.state.current_value,
            volume = volume.state.current_value,
            brightness_locked = brightness.state.locked,
            volume_locked = volume.state.locked,
            "frame processed"
        );

        ControlOutput {
            frame: seq,
            width: frame.width,
            height: frame.height,
            brightness,
            volume,
        }
    }

    fn assign<'a>(&self, frame: &'a PoseFrame) -> [Option<&'a HandObservation>; 2] {
        if self.strategy.shares_observation() {
            let hand = frame.hands.first();
            if frame.hands.len() > 1 {
                debug!(hands = frame.hands.len(), "extra motion regions ignored");
            }
            return [hand, hand];
        }

        let mut assigned = [None, None];
        for (index, hand) in frame.hands.iter().enumerate() {
            let channel = Channel::for_hand(hand.handedness, index);
            let slot = &mut assigned[channel.slot()];
            if slot.is_none() {
                *slot = Some(hand);
            } else {
                debug!(
                    index,
                    handedness = hand.handedness.as_str(),
                    channel = channel.as_str(),
                    "channel already claimed, hand dropped"
                );
            }
        }
        assigned
    }

    fn run_channel(
        &mut self,
        slot: usize,
        hand: Option<&HandObservation>,
        width: u32,
        height: u32,
    ) -> ChannelReport {
        let seq = self.frame_seq;
        let Some(hand) = hand else {
            return ChannelReport {
                state: self.slots[slot].state,
                ..ChannelReport::default()
            };
        };

        let feature = match self.extractor.extract(hand) {
            Ok(feature) => Some(feature),
            Err(e) => {
                debug!(channel = self.slots[slot].channel.as_str(), "{}", e);
                None
            }
        };
        let gesture = classify(feature.as_ref(), &self.thresholds);

        let pinch_domain = self.pinch_domain;
        let strategy = self.strategy;
        let ch = &mut self.slots[slot];

        let lock_changed = ch.lock.apply(seq, gesture);
        ch.state.locked = ch.lock.is_locked();
        if lock_changed {
            info!(
                channel = ch.channel.as_str(),
                locked = ch.state.locked,
                gesture = gesture.as_str(),
                "lock changed"
            );
        }

        let mut value_changed = false;
        if let (false, Some(f)) = (ch.state.locked, feature.as_ref()) {
            let value = match strategy {
                Strategy::Pinch => map_distance(f.value.scalar(), pinch_domain, ch.mapping.range),
                Strategy::Flexion | Strategy::Contour => {
                    ch.mapping.map_position(f.anchor, width, height)
                }
            };
            value_changed = value != ch.state.current_value;
            ch.state.current_value = value;
        }

        ChannelReport {
            state: ch.state,
            gesture,
            observed: true,
            value_changed,
            lock_changed,
            feature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{BoundingBox, Point, RegionShape};
    use crate::mapper::Axis;
    use crate::source::synthetic_hand;

    fn flexion_config() -> Config {
        Config::for_strategy(Strategy::Flexion)
    }

    fn frame(hands: Vec<HandObservation>) -> PoseFrame {
        PoseFrame {
            width: 640,
            height: 480,
            hands,
        }
    }

    fn hand(handedness: Handedness, x: f64, y: f64, folded: u8) -> HandObservation {
        synthetic_hand(handedness, Point::new(x, y), folded, None)
    }

    fn pinch_hand(handedness: Handedness, gap: f64) -> HandObservation {
        synthetic_hand(handedness, Point::new(320.0, 400.0), 0, Some(gap))
    }

    #[test]
    fn test_initial_state() {
        let session = ControlSession::new(&flexion_config());
        for c in Channel::ALL {
            assert_eq!(session.state(c), ChannelState { locked: false, current_value: 50 });
        }
    }

    #[test]
    fn test_end_to_end_volume_scenario_on_x_axis() {
        let mut config = flexion_config();
        config.volume = Some(ChannelMapping::horizontal());
        let mut session = ControlSession::new(&config);
        let sized = |hands| PoseFrame { width: 500, height: 400, hands };

        // open hand at x = 0.9 W
        let out = session.process(&sized(vec![hand(Handedness::Right, 450.0, 200.0, 0)]));
        assert_eq!(out.volume.state, ChannelState { locked: false, current_value: 100 });
        assert_eq!(out.volume.gesture, GestureEvent::Open);

        // fist, same spot
        let out = session.process(&sized(vec![hand(Handedness::Right, 450.0, 200.0, 5)]));
        assert_eq!(out.volume.state, ChannelState { locked: true, current_value: 100 });
        assert!(out.volume.lock_changed);

        // hand gone
        let out = session.process(&sized(vec![]));
        assert_eq!(out.volume.state, ChannelState { locked: true, current_value: 100 });
        assert!(!out.volume.observed);

        // open hand at x = 0.1 W
        let out = session.process(&sized(vec![hand(Handedness::Right, 50.0, 200.0, 0)]));
        assert_eq!(out.volume.state, ChannelState { locked: false, current_value: 0 });
        assert!(out.volume.value_changed);

        // brightness never saw a hand
        assert_eq!(out.brightness.state, ChannelState::default());
        assert_eq!(session.frames_processed(), 4);
    }

    #[test]
    fn test_end_to_end_volume_scenario_default_config() {
        // volume follows the wrist height, top of frame = loud
        let mut session = ControlSession::new(&Config::default());
        let sized = |hands| PoseFrame { width: 500, height: 400, hands };

        let out = session.process(&sized(vec![hand(Handedness::Right, 450.0, 50.0, 0)]));
        assert_eq!(out.volume.state, ChannelState { locked: false, current_value: 100 });

        let out = session.process(&sized(vec![hand(Handedness::Right, 450.0, 50.0, 5)]));
        assert_eq!(out.volume.state, ChannelState { locked: true, current_value: 100 });

        let out = session.process(&sized(vec![]));
        assert_eq!(out.volume.state, ChannelState { locked: true, current_value: 100 });

        let out = session.process(&sized(vec![hand(Handedness::Right, 450.0, 360.0, 0)]));
        assert_eq!(out.volume.state, ChannelState { locked: false, current_value: 0 });

        // horizontal motion alone leaves volume where it is
        let out = session.process(&sized(vec![hand(Handedness::Right, 50.0, 360.0, 0)]));
        assert_eq!(out.volume.state.current_value, 0);
        assert!(!out.volume.value_changed);
        assert_eq!(out.brightness.state, ChannelState::default());
    }

    #[test]
    fn test_fist_freezes_value_despite_motion() {
        let mut session = ControlSession::new(&flexion_config());
        let out = session.process(&frame(vec![hand(Handedness::Left, 200.0, 240.0, 0)]));
        let before = out.brightness.state.current_value;

        for x in [60.0, 150.0, 300.0, 450.0, 600.0] {
            let out = session.process(&frame(vec![hand(Handedness::Left, x, 240.0, 4)]));
            assert!(out.brightness.state.locked);
            assert_eq!(out.brightness.state.current_value, before);
            assert!(!out.brightness.value_changed);
        }
    }

    #[test]
    fn test_missing_hand_leaves_state_untouched() {
        let mut session = ControlSession::new(&flexion_config());
        session.process(&frame(vec![
            hand(Handedness::Left, 500.0, 240.0, 0),
            hand(Handedness::Right, 100.0, 100.0, 5),
        ]));
        let b = session.state(Channel::Brightness);
        let v = session.state(Channel::Volume);

        let out = session.process(&frame(vec![]));
        assert_eq!(out.brightness.state, b);
        assert_eq!(out.volume.state, v);
        assert_eq!(out.brightness.gesture, GestureEvent::None);
        assert_eq!(session.state(Channel::Brightness), b);
    }

    #[test]
    fn test_handedness_routes_channels_regardless_of_order() {
        let mut session = ControlSession::new(&flexion_config());
        let out = session.process(&frame(vec![
            hand(Handedness::Right, 320.0, 60.0, 0),
            hand(Handedness::Left, 590.0, 240.0, 0),
        ]));
        assert_eq!(out.brightness.state.current_value, 100);
        // volume is vertical, inverted: near the top is loud
        assert_eq!(out.volume.state.current_value, 97);
    }

    #[test]
    fn test_unknown_handedness_falls_back_to_index() {
        let mut session = ControlSession::new(&flexion_config());
        let out = session.process(&frame(vec![
            hand(Handedness::Unknown, 50.0, 240.0, 0),
            hand(Handedness::Unknown, 320.0, 430.0, 0),
        ]));
        assert_eq!(out.brightness.state.current_value, 0);
        assert_eq!(out.volume.state.current_value, 0);
        assert!(out.brightness.observed && out.volume.observed);
    }

    #[test]
    fn test_collision_first_claim_wins() {
        let mut session = ControlSession::new(&flexion_config());
        let out = session.process(&frame(vec![
            hand(Handedness::Left, 590.0, 240.0, 0),
            hand(Handedness::Left, 50.0, 240.0, 5),
        ]));
        assert_eq!(out.brightness.state, ChannelState { locked: false, current_value: 100 });
        assert!(!out.volume.observed);
    }

    #[test]
    fn test_insufficient_data_is_none_and_holds() {
        let mut session = ControlSession::new(&flexion_config());
        session.process(&frame(vec![hand(Handedness::Left, 590.0, 240.0, 5)]));
        assert!(session.state(Channel::Brightness).locked);

        let partial =
            HandObservation::from_landmarks(Handedness::Left, vec![Point::new(1.0, 1.0); 5]);
        let out = session.process(&frame(vec![partial]));
        assert_eq!(out.brightness.gesture, GestureEvent::None);
        assert!(out.brightness.observed);
        assert!(out.brightness.state.locked);
        assert!(out.brightness.feature.is_none());
    }

    #[test]
    fn test_pinch_toggles_and_maps_distance() {
        let mut session = ControlSession::new(&Config::for_strategy(Strategy::Pinch));

        let out = session.process(&frame(vec![pinch_hand(Handedness::Left, 135.0)]));
        assert_eq!(out.brightness.gesture, GestureEvent::None);
        assert_eq!(out.brightness.state.current_value, 50);
        let out = session.process(&frame(vec![pinch_hand(Handedness::Left, 220.0)]));
        assert_eq!(out.brightness.state.current_value, 100);

        let out = session.process(&frame(vec![pinch_hand(Handedness::Left, 10.0)]));
        assert_eq!(out.brightness.gesture, GestureEvent::Pinch);
        assert!(out.brightness.state.locked);
        assert_eq!(out.brightness.state.current_value, 100);

        let out = session.process(&frame(vec![pinch_hand(Handedness::Left, 180.0)]));
        assert!(out.brightness.state.locked);
        assert_eq!(out.brightness.state.current_value, 100);

        // second, separate pinch unlocks; the pinch distance itself then maps to 0
        let out = session.process(&frame(vec![pinch_hand(Handedness::Left, 10.0)]));
        assert!(!out.brightness.state.locked);
        assert_eq!(out.brightness.state.current_value, 0);
        assert_eq!(out.status(), "Ready");
    }

    #[test]
    fn test_held_pinch_toggles_each_frame() {
        let mut session = ControlSession::new(&Config::for_strategy(Strategy::Pinch));
        let locked: Vec<bool> = (0..4)
            .map(|_| {
                session
                    .process(&frame(vec![pinch_hand(Handedness::Right, 5.0)]))
                    .volume
                    .state
                    .locked
            })
            .collect();
        assert_eq!(locked, vec![true, false, true, false]);
    }

    fn region(x: u32, y: u32, area: f64, hull_area: f64) -> HandObservation {
        HandObservation::from_region(RegionShape {
            area,
            hull_area,
            bounds: BoundingBox { x, y, width: 40, height: 60 },
        })
    }

    #[test]
    fn test_contour_drives_both_channels() {
        let mut session = ControlSession::new(&Config::for_strategy(Strategy::Contour));

        // center (30, 40): far left, near the top
        let out = session.process(&frame(vec![region(10, 10, 2000.0, 2100.0)]));
        assert_eq!(out.brightness.gesture, GestureEvent::Open);
        assert_eq!(out.brightness.state.current_value, 10);
        assert_eq!(out.volume.state.current_value, 100);

        let out = session.process(&frame(vec![region(300, 400, 2000.0, 2500.0)]));
        assert_eq!(out.brightness.gesture, GestureEvent::Fist);
        assert_eq!(out.volume.gesture, GestureEvent::Fist);
        assert_eq!(out.lock_flags(), (true, true));
        assert_eq!(out.values(), (10, 100));
        assert_eq!(out.status(), "Brightness Locked, Volume Locked");
    }

    #[test]
    fn test_contour_small_region_holds() {
        let mut session = ControlSession::new(&Config::for_strategy(Strategy::Contour));
        let out = session.process(&frame(vec![region(300, 200, 500.0, 600.0)]));
        assert_eq!(out.brightness.gesture, GestureEvent::None);
        assert_eq!(out.values(), (50, 50));
    }

    #[test]
    fn test_status_line() {
        let mut out = ControlOutput::default();
        assert_eq!(out.status(), "Ready");
        out.volume.state.locked = true;
        assert_eq!(out.status(), "Volume Locked");
        out.brightness.state.locked = true;
        assert_eq!(out.status(), "Brightness Locked, Volume Locked");
    }

    #[test]
    fn test_initial_value_seed_and_axis() {
        let mut config = flexion_config();
        config.brightness = Some(ChannelMapping {
            axis: Axis::Y,
            ..ChannelMapping::default()
        });
        let session = ControlSession::new(&config)
            .with_initial_value(Channel::Brightness, 72)
            .with_initial_value(Channel::Volume, 250);
        assert_eq!(session.state(Channel::Brightness).current_value, 72);
        assert_eq!(session.state(Channel::Volume).current_value, 100);
        assert_eq!(session.strategy(), Strategy::Flexion);
    }
}
