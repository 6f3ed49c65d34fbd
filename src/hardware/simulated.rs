//! Simulated pulse hardware for `stub://` addresses and tests.
//!
//! Every call is appended to a shared `HardwareLog`, so a test can keep a handle
//! to the log after the simulator has been moved into an actuator.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{PinMode, Pulse, PulseHardware};

/// A recorded hardware call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HardwareOp {
    SetPinMode { pin: u32, mode: PinMode },
    WritePin { pin: u32, high: bool },
    WaveClear,
    WaveAddGeneric(Vec<Pulse>),
    WaveCreate(u32),
    WaveChain(Vec<u8>),
    WaveTxStop,
    ServoPulse { pin: u32, pulse_us: u32 },
}

/// Shared, cloneable record of hardware calls.
#[derive(Clone, Debug, Default)]
pub struct HardwareLog {
    ops: Arc<Mutex<Vec<HardwareOp>>>,
}

impl HardwareLog {
    fn lock(&self) -> MutexGuard<'_, Vec<HardwareOp>> {
        self.ops.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, op: HardwareOp) {
        self.lock().push(op);
    }

    pub fn ops(&self) -> Vec<HardwareOp> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Every chain script transmitted so far.
    pub fn chains(&self) -> Vec<Vec<u8>> {
        self.lock()
            .iter()
            .filter_map(|op| match op {
                HardwareOp::WaveChain(chain) => Some(chain.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every servo pulse width written so far.
    pub fn servo_pulses(&self) -> Vec<u32> {
        self.lock()
            .iter()
            .filter_map(|op| match op {
                HardwareOp::ServoPulse { pulse_us, .. } => Some(*pulse_us),
                _ => None,
            })
            .collect()
    }
}

/// In-process stand-in for the pigpio daemon.
pub struct SimulatedHardware {
    log: HardwareLog,
    pending_pulses: usize,
    next_wave: u32,
    busy_polls: u32,
    busy_remaining: u32,
}

impl SimulatedHardware {
    pub fn new() -> Self {
        Self {
            log: HardwareLog::default(),
            pending_pulses: 0,
            next_wave: 0,
            busy_polls: 0,
            busy_remaining: 0,
        }
    }

    /// Report "busy" for the next `polls` calls to `wave_tx_busy` after each chain.
    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    pub fn log(&self) -> HardwareLog {
        self.log.clone()
    }
}

impl Default for SimulatedHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseHardware for SimulatedHardware {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn set_pin_mode(&mut self, pin: u32, mode: PinMode) -> Result<()> {
        self.log.push(HardwareOp::SetPinMode { pin, mode });
        Ok(())
    }

    fn write_pin(&mut self, pin: u32, high: bool) -> Result<()> {
        self.log.push(HardwareOp::WritePin { pin, high });
        Ok(())
    }

    fn wave_clear(&mut self) -> Result<()> {
        self.pending_pulses = 0;
        self.next_wave = 0;
        self.log.push(HardwareOp::WaveClear);
        Ok(())
    }

    fn wave_add_generic(&mut self, pulses: &[Pulse]) -> Result<()> {
        self.pending_pulses += pulses.len();
        self.log.push(HardwareOp::WaveAddGeneric(pulses.to_vec()));
        Ok(())
    }

    fn wave_create(&mut self) -> Result<u32> {
        if self.pending_pulses == 0 {
            return Err(anyhow!("simulated hardware: wave_create with no pulses"));
        }
        let id = self.next_wave;
        self.next_wave += 1;
        self.pending_pulses = 0;
        self.log.push(HardwareOp::WaveCreate(id));
        Ok(id)
    }

    fn wave_chain(&mut self, chain: &[u8]) -> Result<()> {
        self.busy_remaining = self.busy_polls;
        self.log.push(HardwareOp::WaveChain(chain.to_vec()));
        Ok(())
    }

    fn wave_tx_busy(&mut self) -> Result<bool> {
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn wave_tx_stop(&mut self) -> Result<()> {
        self.busy_remaining = 0;
        self.log.push(HardwareOp::WaveTxStop);
        Ok(())
    }

    fn set_servo_pulsewidth(&mut self, pin: u32, pulse_us: u32) -> Result<()> {
        self.log.push(HardwareOp::ServoPulse { pin, pulse_us });
        Ok(())
    }
}
