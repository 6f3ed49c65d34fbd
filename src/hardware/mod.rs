//! Pulse-generation hardware.
//!
//! This module provides the single hardware seam used by the actuators:
//! - `PigpiodClient`: the pigpio daemon socket interface (real GPIO)
//! - `SimulatedHardware`: in-process recorder for `stub://` addresses and tests
//!
//! A `PulseHardware` value is owned by exactly one actuator. Nothing else in the
//! process writes GPIO, and the connection is released when the owner drops it.

pub mod pigpiod;
pub mod simulated;

use anyhow::Result;

pub use pigpiod::PigpiodClient;
pub use simulated::{HardwareLog, HardwareOp, SimulatedHardware};

/// GPIO direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

impl PinMode {
    pub(crate) fn code(self) -> u32 {
        match self {
            PinMode::Input => 0,
            PinMode::Output => 1,
        }
    }
}

/// One entry of a generic waveform: raise `gpio_on`, lower `gpio_off`
/// (both bit masks over GPIO 0-31), then hold for `delay_us`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pulse {
    pub gpio_on: u32,
    pub gpio_off: u32,
    pub delay_us: u32,
}

/// Hardware interface required by the servo and stepper actuators.
///
/// Waveforms are authored once (`wave_add_generic` + `wave_create`) and then
/// referenced by id from a chain script, which the hardware replays with
/// microsecond timing regardless of what the tracking thread is doing.
pub trait PulseHardware: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    fn set_pin_mode(&mut self, pin: u32, mode: PinMode) -> Result<()>;

    fn write_pin(&mut self, pin: u32, high: bool) -> Result<()>;

    /// Delete every waveform created so far.
    fn wave_clear(&mut self) -> Result<()>;

    /// Append pulses to the waveform under construction.
    fn wave_add_generic(&mut self, pulses: &[Pulse]) -> Result<()>;

    /// Turn the waveform under construction into a wave and return its id.
    fn wave_create(&mut self) -> Result<u32>;

    /// Transmit a chain script. Returns as soon as transmission has started.
    fn wave_chain(&mut self, chain: &[u8]) -> Result<()>;

    /// True while a wave or chain is still being transmitted.
    fn wave_tx_busy(&mut self) -> Result<bool>;

    /// Abort the current transmission.
    fn wave_tx_stop(&mut self) -> Result<()>;

    /// Servo pulse width in microseconds (0 switches pulses off).
    fn set_servo_pulsewidth(&mut self, pin: u32, pulse_us: u32) -> Result<()>;
}

/// Open the hardware named by `address`: `stub://...` selects the simulator,
/// anything else is treated as a pigpio daemon `host:port`.
pub fn connect(address: &str) -> Result<Box<dyn PulseHardware>> {
    if address.starts_with("stub://") {
        log::info!("hardware: using simulated pulse hardware ({})", address);
        Ok(Box::new(SimulatedHardware::new()))
    } else {
        Ok(Box::new(PigpiodClient::connect(address)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_address_selects_simulator() -> Result<()> {
        let hardware = connect("stub://bench")?;
        assert_eq!(hardware.name(), "simulated");
        Ok(())
    }

    #[test]
    fn unreachable_daemon_is_an_error() {
        // Port 1 on loopback is never a pigpio daemon.
        assert!(connect("127.0.0.1:1").is_err());
    }
}
