//! Stepper motor drive through hardware-timed pulse chains.
//!
//! `RampGenerator` turns a step count into a `RampPlan`, authors one waveform
//! per distinct frequency and hands the hardware a chain script that replays
//! them. The tracking thread never times individual pulses.

use anyhow::{anyhow, Context, Result};
use std::thread;
use std::time::{Duration, Instant};

use super::ramp::{RampPlan, RampTable};
use super::{Actuator, MoveOutcome};
use crate::config::StepperSettings;
use crate::hardware::{PinMode, Pulse, PulseHardware};

const IDLE_POLL: Duration = Duration::from_millis(10);

/// Largest repeat count a chain loop can carry.
const MAX_LOOP_REPEAT: u32 = 0xFFFF;

/// Waveform pulse masks only cover GPIO 0-31.
const MAX_STEP_PIN: u32 = 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RampState {
    Idle,
    Building,
    Transmitting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards larger positions (direction pin high).
    Forward,
    Reverse,
}

/// Encode `(wave_id, repeats)` pairs as a pigpio chain script.
///
/// Each entry becomes `loop start, wave, loop end x repeats`; repeat counts
/// above 65535 are split over consecutive loops of the same wave.
pub fn encode_chain(entries: &[(u32, u32)]) -> Result<Vec<u8>> {
    let mut chain = Vec::new();
    for &(wave_id, repeats) in entries {
        let wave = u8::try_from(wave_id)
            .map_err(|_| anyhow!("wave id {} does not fit a chain script", wave_id))?;
        let mut left = repeats;
        while left > 0 {
            let count = left.min(MAX_LOOP_REPEAT);
            chain.extend_from_slice(&[
                255,
                0,
                wave,
                255,
                1,
                (count & 0xFF) as u8,
                (count >> 8) as u8,
            ]);
            left -= count;
        }
    }
    Ok(chain)
}

/// Owns the pulse hardware and the direction/step pins.
pub struct RampGenerator {
    hardware: Box<dyn PulseHardware>,
    dir_pin: u32,
    step_pin: u32,
    table: RampTable,
    state: RampState,
    released: bool,
}

impl RampGenerator {
    pub fn new(
        mut hardware: Box<dyn PulseHardware>,
        dir_pin: u32,
        step_pin: u32,
        table: RampTable,
    ) -> Result<Self> {
        if step_pin > MAX_STEP_PIN {
            return Err(anyhow!(
                "step pin {} cannot carry waveforms (GPIO 0-{} only)",
                step_pin,
                MAX_STEP_PIN
            ));
        }
        hardware
            .set_pin_mode(dir_pin, PinMode::Output)
            .with_context(|| format!("configure direction pin {}", dir_pin))?;
        hardware
            .set_pin_mode(step_pin, PinMode::Output)
            .with_context(|| format!("configure step pin {}", step_pin))?;
        log::info!(
            "RampGenerator: dir pin {}, step pin {} on {} hardware",
            dir_pin,
            step_pin,
            hardware.name()
        );
        Ok(Self {
            hardware,
            dir_pin,
            step_pin,
            table,
            state: RampState::Idle,
            released: false,
        })
    }

    pub fn state(&self) -> RampState {
        self.state
    }

    /// Refresh the state from the hardware's transmit flag.
    pub fn poll(&mut self) -> Result<RampState> {
        if self.state == RampState::Transmitting && !self.hardware.wave_tx_busy()? {
            self.state = RampState::Idle;
        }
        Ok(self.state)
    }

    /// Start a move of `steps` pulses. Returns `Busy` without touching the
    /// hardware while the previous chain is still transmitting.
    pub fn execute(&mut self, steps: u32, direction: Direction) -> Result<MoveOutcome> {
        if self.poll()? == RampState::Transmitting {
            return Ok(MoveOutcome::Busy);
        }
        if steps == 0 {
            return Ok(MoveOutcome::Completed);
        }
        self.state = RampState::Building;
        match self.transmit(steps, direction) {
            Ok(plan) => {
                self.state = RampState::Transmitting;
                self.released = false;
                log::debug!(
                    "RampGenerator: {} steps {:?}, peak {} Hz, ~{} ms",
                    steps,
                    direction,
                    plan.peak_frequency().unwrap_or(0),
                    plan.duration().as_millis()
                );
                Ok(MoveOutcome::Started)
            }
            Err(err) => {
                self.state = RampState::Idle;
                Err(err)
            }
        }
    }

    fn transmit(&mut self, steps: u32, direction: Direction) -> Result<RampPlan> {
        self.hardware
            .write_pin(self.dir_pin, direction == Direction::Forward)?;

        let plan = RampPlan::build(&self.table, steps);
        self.hardware.wave_clear()?;

        let mask = 1u32 << self.step_pin;
        let mut waves: Vec<(u32, u32)> = Vec::new();
        let mut entries = Vec::new();
        for segment in plan.segments() {
            let known = waves
                .iter()
                .find(|(frequency, _)| *frequency == segment.frequency_hz)
                .map(|&(_, id)| id);
            let wave_id = match known {
                Some(id) => id,
                None => {
                    let half = segment.half_period_us();
                    self.hardware.wave_add_generic(&[
                        Pulse {
                            gpio_on: mask,
                            gpio_off: 0,
                            delay_us: half,
                        },
                        Pulse {
                            gpio_on: 0,
                            gpio_off: mask,
                            delay_us: half,
                        },
                    ])?;
                    let id = self
                        .hardware
                        .wave_create()
                        .with_context(|| format!("create {} Hz wave", segment.frequency_hz))?;
                    waves.push((segment.frequency_hz, id));
                    id
                }
            };
            entries.push((wave_id, segment.steps));
        }

        let chain = encode_chain(&entries)?;
        self.hardware.wave_chain(&chain).context("start pulse chain")?;
        Ok(plan)
    }

    /// Poll until the current chain finishes. Returns false on timeout.
    pub fn wait_idle(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.poll()? != RampState::Transmitting {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(IDLE_POLL);
        }
    }

    /// Abort any transmission and leave the step pin low.
    pub fn halt(&mut self) -> Result<()> {
        self.state = RampState::Idle;
        self.released = true;
        self.hardware.wave_tx_stop()?;
        self.hardware.write_pin(self.step_pin, false)?;
        Ok(())
    }
}

impl Drop for RampGenerator {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.halt() {
            log::warn!("RampGenerator: halt on drop failed: {}", e);
        }
    }
}

// ----------------------------------------------------------------------------
// Actuator
// ----------------------------------------------------------------------------

pub struct StepperActuator {
    generator: RampGenerator,
    steps_per_unit: u32,
}

impl StepperActuator {
    pub fn new(hardware: Box<dyn PulseHardware>, settings: &StepperSettings) -> Result<Self> {
        let generator = RampGenerator::new(
            hardware,
            settings.dir_pin,
            settings.step_pin,
            settings.ramp.clone(),
        )?;
        Ok(Self {
            generator,
            steps_per_unit: settings.steps_per_unit,
        })
    }

    pub fn generator(&self) -> &RampGenerator {
        &self.generator
    }
}

impl Actuator for StepperActuator {
    fn name(&self) -> &'static str {
        "stepper"
    }

    /// The motor has no absolute encoder: the starting position is simply
    /// taken as given.
    fn initialize(&mut self, position: i32) -> Result<()> {
        log::info!("StepperActuator: assuming start position {}", position);
        Ok(())
    }

    fn move_to(&mut self, from: i32, to: i32) -> Result<MoveOutcome> {
        let delta = i64::from(to) - i64::from(from);
        if delta == 0 {
            return Ok(MoveOutcome::Completed);
        }
        let steps = u32::try_from(delta.unsigned_abs())
            .ok()
            .and_then(|units| units.checked_mul(self.steps_per_unit))
            .ok_or_else(|| anyhow!("move {} -> {} needs too many steps", from, to))?;
        let direction = if delta > 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        self.generator.execute(steps, direction)
    }

    fn wait_idle(&mut self, timeout: Duration) -> Result<bool> {
        self.generator.wait_idle(timeout)
    }

    fn release(&mut self) -> Result<()> {
        self.generator.halt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{HardwareLog, HardwareOp, SimulatedHardware};

    fn generator(busy_polls: u32) -> Result<(RampGenerator, HardwareLog)> {
        let hw = SimulatedHardware::new().with_busy_polls(busy_polls);
        let log = hw.log();
        let generator = RampGenerator::new(Box::new(hw), 17, 27, RampTable::default())?;
        Ok((generator, log))
    }

    #[test]
    fn chain_entries_use_loop_syntax() -> Result<()> {
        assert_eq!(
            encode_chain(&[(3, 300)])?,
            vec![255, 0, 3, 255, 1, 44, 1]
        );
        Ok(())
    }

    #[test]
    fn long_segments_are_split_into_16_bit_loops() -> Result<()> {
        let chain = encode_chain(&[(0, 70_000)])?;
        assert_eq!(chain.len(), 14);
        assert_eq!(&chain[0..7], &[255, 0, 0, 255, 1, 0xFF, 0xFF]);
        let rest = 70_000 - 65_535;
        assert_eq!(
            &chain[7..14],
            &[255, 0, 0, 255, 1, (rest & 0xFF) as u8, (rest >> 8) as u8]
        );
        assert!(encode_chain(&[(256, 1)]).is_err());
        Ok(())
    }

    #[test]
    fn execute_authors_one_wave_per_frequency() -> Result<()> {
        let (mut generator, log) = generator(0)?;
        log.clear();
        assert_eq!(generator.execute(2000, Direction::Forward)?, MoveOutcome::Started);
        assert_eq!(generator.state(), RampState::Transmitting);

        let ops = log.ops();
        assert_eq!(ops[0], HardwareOp::WritePin { pin: 17, high: true });
        assert_eq!(ops[1], HardwareOp::WaveClear);
        let waves = ops
            .iter()
            .filter(|op| matches!(op, HardwareOp::WaveCreate(_)))
            .count();
        assert_eq!(waves, 6);

        let chains = log.chains();
        assert_eq!(chains.len(), 1);
        // 6 acceleration + 6 deceleration loops, no cruise.
        assert_eq!(chains[0].len(), 12 * 7);
        // Deceleration replays the acceleration waves in reverse.
        assert_eq!(chains[0][2], 0);
        assert_eq!(chains[0][chains[0].len() - 5], 0);
        Ok(())
    }

    #[test]
    fn first_pulse_drives_the_step_pin() -> Result<()> {
        let (mut generator, log) = generator(0)?;
        generator.execute(10, Direction::Reverse)?;
        let pulses = log
            .ops()
            .into_iter()
            .find_map(|op| match op {
                HardwareOp::WaveAddGeneric(pulses) => Some(pulses),
                _ => None,
            })
            .ok_or_else(|| anyhow!("no waveform authored"))?;
        assert_eq!(pulses[0].gpio_on, 1 << 27);
        assert_eq!(pulses[1].gpio_off, 1 << 27);
        assert_eq!(pulses[0].delay_us, 2000);
        assert!(log.ops().contains(&HardwareOp::WritePin { pin: 17, high: false }));
        Ok(())
    }

    #[test]
    fn busy_hardware_rejects_overlapping_moves() -> Result<()> {
        let (mut generator, log) = generator(3)?;
        assert_eq!(generator.execute(100, Direction::Forward)?, MoveOutcome::Started);
        assert_eq!(generator.execute(100, Direction::Forward)?, MoveOutcome::Busy);
        assert_eq!(log.chains().len(), 1);

        assert!(generator.wait_idle(Duration::from_secs(1))?);
        assert_eq!(generator.state(), RampState::Idle);
        assert_eq!(generator.execute(100, Direction::Reverse)?, MoveOutcome::Started);
        assert_eq!(log.chains().len(), 2);
        Ok(())
    }

    #[test]
    fn wait_idle_times_out_while_transmitting() -> Result<()> {
        let (mut generator, _log) = generator(u32::MAX)?;
        generator.execute(100, Direction::Forward)?;
        assert!(!generator.wait_idle(Duration::from_millis(30))?);
        Ok(())
    }

    #[test]
    fn high_step_pins_are_rejected() {
        let hw = Box::new(SimulatedHardware::new());
        assert!(RampGenerator::new(hw, 17, 40, RampTable::default()).is_err());
    }

    #[test]
    fn stepper_converts_units_to_steps() -> Result<()> {
        let hw = SimulatedHardware::new();
        let log = hw.log();
        let settings = StepperSettings {
            steps_per_unit: 10,
            ..StepperSettings::default()
        };
        let mut stepper = StepperActuator::new(Box::new(hw), &settings)?;
        assert_eq!(stepper.move_to(150, 150)?, MoveOutcome::Completed);
        assert!(log.chains().is_empty());

        assert_eq!(stepper.move_to(150, 140)?, MoveOutcome::Started);
        // 100 steps: 50 up at 250 Hz, 50 down at 250 Hz.
        assert_eq!(
            log.chains()[0],
            vec![255, 0, 0, 255, 1, 50, 0, 255, 0, 0, 255, 1, 50, 0]
        );
        assert!(log.ops().contains(&HardwareOp::WritePin { pin: 17, high: false }));
        Ok(())
    }

    #[test]
    fn release_stops_transmission_and_lowers_step_pin() -> Result<()> {
        let hw = SimulatedHardware::new().with_busy_polls(5);
        let log = hw.log();
        let mut stepper = StepperActuator::new(Box::new(hw), &StepperSettings::default())?;
        stepper.move_to(145, 150)?;
        stepper.release()?;
        assert_eq!(stepper.generator().state(), RampState::Idle);
        let ops = log.ops();
        let n = ops.len();
        assert_eq!(ops[n - 2], HardwareOp::WaveTxStop);
        assert_eq!(ops[n - 1], HardwareOp::WritePin { pin: 27, high: false });

        drop(stepper);
        assert_eq!(log.ops().len(), n);
        Ok(())
    }

    #[test]
    fn drop_halts_an_unreleased_generator() -> Result<()> {
        let (mut generator, log) = generator(5)?;
        generator.execute(100, Direction::Forward)?;
        drop(generator);
        assert!(log.ops().contains(&HardwareOp::WaveTxStop));
        Ok(())
    }
}
