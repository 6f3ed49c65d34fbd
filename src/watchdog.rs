//! Black-frame watchdog.
//!
//! A capped lens or a dead light source produces frames whose summed
//! brightness falls under a floor. Once that has lasted long enough the
//! actuator is sent home, once per dark episode.

use std::time::{Duration, Instant};

use crate::config::WatchdogSettings;
use crate::tracking::ActuatorState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Normal frame.
    Bright,
    /// First normal frame after a dark episode.
    Recovered,
    /// Dark frame, no action.
    Dark,
    /// Dark for long enough: move to the home position.
    Home,
}

pub struct BlackFrameWatchdog {
    brightness_floor: u64,
    black_duration: Duration,
}

impl BlackFrameWatchdog {
    pub fn new(settings: &WatchdogSettings) -> Self {
        Self {
            brightness_floor: settings.brightness_floor,
            black_duration: settings.black_duration,
        }
    }

    pub fn is_dark(&self, brightness: u64) -> bool {
        brightness < self.brightness_floor
    }

    pub fn observe(
        &self,
        state: &mut ActuatorState,
        brightness: u64,
        now: Instant,
    ) -> WatchdogVerdict {
        if !self.is_dark(brightness) {
            let was_dark = state.black_since.is_some();
            state.black_since = None;
            state.black_duration = Duration::ZERO;
            state.is_zeroed = false;
            return if was_dark {
                WatchdogVerdict::Recovered
            } else {
                WatchdogVerdict::Bright
            };
        }

        match state.black_since {
            None => {
                state.black_since = Some(now);
                state.black_duration = Duration::ZERO;
                return WatchdogVerdict::Dark;
            }
            Some(since) => state.black_duration = now.saturating_duration_since(since),
        }

        if state.black_duration >= self.black_duration && !state.is_zeroed {
            state.is_zeroed = true;
            WatchdogVerdict::Home
        } else {
            WatchdogVerdict::Dark
        }
    }
}
