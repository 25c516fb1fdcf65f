// src/lock.rs
//! Per-channel lock driven by gesture events.
//!
//! Two policies coexist because the recognisers disagree on what a lock
//! gesture means:
//!
//! * [`LockPolicy::Toggle`] (pinch): every frame that reports a pinch flips
//!   the lock. A pinch held across frames keeps flipping at the frame rate.
//! * [`LockPolicy::Level`] (fist): the lock follows the gesture. Fist locks,
//!   open hand unlocks, a held fist stays locked.
//!
//! Either way a channel is evaluated at most once per frame.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gesture::GestureEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    #[default]
    Unlocked,
    Locked,
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Unlocked => Self::Locked,
            Self::Locked => Self::Unlocked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPolicy {
    /// Edge-triggered: `pinch` flips the state.
    Toggle,
    /// Level-triggered: `fist` forces locked, `open` forces unlocked.
    Level,
}

#[derive(Debug, Clone)]
pub struct ChannelLock {
    state: LockState,
    policy: LockPolicy,
    last_frame: Option<u64>,
}

impl ChannelLock {
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            state: LockState::Unlocked,
            policy,
            last_frame: None,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    /// Feed this frame's gesture. Returns `true` when the state changed.
    ///
    /// Repeated calls with the same `frame` are ignored, so an event can't
    /// be counted twice within one evaluation.
    pub fn apply(&mut self, frame: u64, event: GestureEvent) -> bool {
        if self.last_frame == Some(frame) {
            debug!(frame, ?event, "lock already evaluated this frame");
            return false;
        }
        self.last_frame = Some(frame);

        let next = match (self.policy, event) {
            (LockPolicy::Toggle, GestureEvent::Pinch) => self.state.toggled(),
            (LockPolicy::Level, GestureEvent::Fist) => LockState::Locked,
            (LockPolicy::Level, GestureEvent::Open) => LockState::Unlocked,
            _ => self.state,
        };

        let changed = next != self.state;
        self.state = next;
        changed
    }

    pub fn reset(&mut self) {
        self.state = LockState::Unlocked;
        self.last_frame = None;
    }
}
