//! stepper_check - exercise the stepper ramp without a camera
//!
//! Runs one ramped move forward, waits for the chain to finish, then runs the
//! same move back. Useful for tuning the ramp table on the bench.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use pan_tracker::actuator::{Direction, MoveOutcome, RampGenerator, RampPlan};
use pan_tracker::config::TrackerConfig;
use pan_tracker::hardware;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML configuration file (for pins and the ramp table).
    #[arg(long, env = "PAN_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Steps per move.
    #[arg(long, default_value_t = 2000)]
    steps: u32,

    /// Pulse hardware: `stub://` or a pigpio daemon address (host:port).
    #[arg(long)]
    hardware: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = TrackerConfig::load_from(args.config.as_deref())?;
    let stepper = &config.actuator.stepper;
    let address = args
        .hardware
        .unwrap_or_else(|| config.actuator.hardware.clone());

    let plan = RampPlan::build(&stepper.ramp, args.steps);
    for segment in plan.segments() {
        log::info!(
            "stepper_check: {} steps at {} Hz ({} us half period)",
            segment.steps,
            segment.frequency_hz,
            segment.half_period_us()
        );
    }
    log::info!(
        "stepper_check: {} steps, nominal {:?} per move",
        plan.total_steps(),
        plan.duration()
    );

    let pulse_hardware = hardware::connect(&address)?;
    let mut generator = RampGenerator::new(
        pulse_hardware,
        stepper.dir_pin,
        stepper.step_pin,
        stepper.ramp.clone(),
    )?;

    let timeout = config.actuator.idle_timeout.max(plan.duration() * 2);
    for direction in [Direction::Forward, Direction::Reverse] {
        let started = Instant::now();
        match generator.execute(args.steps, direction)? {
            MoveOutcome::Busy => {
                return Err(anyhow!("hardware still transmitting a previous chain"));
            }
            MoveOutcome::Started | MoveOutcome::Completed => {}
        }
        if !generator.wait_idle(timeout)? {
            generator.halt()?;
            return Err(anyhow!("{:?} move did not finish within {:?}", direction, timeout));
        }
        log::info!(
            "stepper_check: {:?} move finished in {:?}",
            direction,
            started.elapsed()
        );
    }
    generator.halt()?;
    Ok(())
}
