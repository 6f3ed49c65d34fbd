//! Hobby servo driven by pigpio servo pulses.

use anyhow::{anyhow, Result};
use std::thread;
use std::time::Duration;

use super::{Actuator, MoveOutcome};
use crate::config::ServoSettings;
use crate::hardware::PulseHardware;

pub struct ServoActuator {
    hardware: Box<dyn PulseHardware>,
    pin: u32,
    sweep_delay: Duration,
    pulse_us_per_unit: u32,
}

impl ServoActuator {
    pub fn new(hardware: Box<dyn PulseHardware>, settings: &ServoSettings) -> Result<Self> {
        if settings.pulse_us_per_unit == 0 {
            return Err(anyhow!("servo pulse_us_per_unit must be >= 1"));
        }
        log::info!(
            "ServoActuator: pin {} on {} hardware, {}us per unit",
            settings.pin,
            hardware.name(),
            settings.pulse_us_per_unit
        );
        Ok(Self {
            hardware,
            pin: settings.pin,
            sweep_delay: settings.sweep_delay,
            pulse_us_per_unit: settings.pulse_us_per_unit,
        })
    }

    fn pulse_for(&self, position: i32) -> Result<u32> {
        u32::try_from(position)
            .ok()
            .and_then(|units| units.checked_mul(self.pulse_us_per_unit))
            .ok_or_else(|| anyhow!("servo position {} has no valid pulse width", position))
    }

    fn write(&mut self, position: i32) -> Result<()> {
        let pulse = self.pulse_for(position)?;
        self.hardware.set_servo_pulsewidth(self.pin, pulse)
    }
}

impl Actuator for ServoActuator {
    fn name(&self) -> &'static str {
        "servo"
    }

    fn initialize(&mut self, position: i32) -> Result<()> {
        self.write(position)
    }

    /// Sweeps one unit at a time so the horn does not slam to the target.
    fn move_to(&mut self, from: i32, to: i32) -> Result<MoveOutcome> {
        let step = (to - from).signum();
        let mut position = from;
        while position != to {
            position += step;
            self.write(position)?;
            if !self.sweep_delay.is_zero() {
                thread::sleep(self.sweep_delay);
            }
        }
        Ok(MoveOutcome::Completed)
    }

    fn release(&mut self) -> Result<()> {
        self.hardware.set_servo_pulsewidth(self.pin, 0)
    }
}
