//! Pan actuators.
//!
//! This module is responsible for:
//! - The `Actuator` seam the tracking loop drives (positions in abstract units)
//! - Servo sweeps (`servo`) and stepper ramps (`stepper`, `ramp`)
//! - Choosing the implementation from `ActuatorSettings`
//!
//! Each actuator owns its `PulseHardware`. Positions are committed by the
//! caller only when a move is accepted.

pub mod ramp;
pub mod servo;
pub mod stepper;

use anyhow::Result;
use std::time::Duration;

use crate::config::{ActuatorKind, ActuatorSettings};
use crate::hardware::PulseHardware;

pub use ramp::{RampPlan, RampSegment, RampTable};
pub use servo::ServoActuator;
pub use stepper::{Direction, RampGenerator, RampState, StepperActuator};

/// Result of a move request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The actuator reached the target before returning.
    Completed,
    /// Hardware is carrying out the move in the background.
    Started,
    /// A previous move is still running; nothing was sent.
    Busy,
}

impl MoveOutcome {
    pub fn accepted(self) -> bool {
        !matches!(self, MoveOutcome::Busy)
    }
}

pub trait Actuator: Send {
    fn name(&self) -> &'static str;

    /// Put the actuator at `position` before tracking starts.
    fn initialize(&mut self, position: i32) -> Result<()>;

    fn move_to(&mut self, from: i32, to: i32) -> Result<MoveOutcome>;

    /// Block until background motion has finished. Returns false on timeout.
    fn wait_idle(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }

    /// Stop driving the hardware.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn build(
    settings: &ActuatorSettings,
    hardware: Box<dyn PulseHardware>,
) -> Result<Box<dyn Actuator>> {
    let actuator: Box<dyn Actuator> = match settings.kind {
        ActuatorKind::Servo => Box::new(ServoActuator::new(hardware, &settings.servo)?),
        ActuatorKind::Stepper => Box::new(StepperActuator::new(hardware, &settings.stepper)?),
    };
    Ok(actuator)
}
