//! pan_trackd - motion tracking daemon
//!
//! This daemon:
//! 1. Loads the tracker configuration (TOML file + environment overrides)
//! 2. Connects to the pulse hardware (pigpio daemon, or the simulator)
//! 3. Opens the camera and follows the largest moving region
//! 4. Parks the actuator while the lens is dark
//! 5. Releases the hardware on Ctrl-C

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pan_tracker::config::{ActuatorKind, CameraKind, TrackerConfig};
use pan_tracker::{actuator, hardware, tracking};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "PAN_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Camera device (`stub://scene`, `stub://dark`, `stub://static`, or /dev/videoN).
    #[arg(long)]
    camera: Option<String>,

    /// Camera kind: usb or module. Picks the default warm-up.
    #[arg(long, value_parser = CameraKind::parse)]
    camera_kind: Option<CameraKind>,

    /// Pulse hardware: `stub://` or a pigpio daemon address (host:port).
    #[arg(long)]
    hardware: Option<String>,

    /// Actuator kind: servo or stepper.
    #[arg(long, value_parser = ActuatorKind::parse)]
    actuator: Option<ActuatorKind>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = TrackerConfig::load_from(args.config.as_deref())?;
    if let Some(camera) = args.camera {
        config.camera.device = camera;
    }
    if let Some(kind) = args.camera_kind {
        config.camera.set_kind(kind);
    }
    if let Some(hardware) = args.hardware {
        config.actuator.hardware = hardware;
    }
    if let Some(kind) = args.actuator {
        config.actuator.kind = kind;
    }
    config.validate()?;

    log::info!(
        "pan_trackd {} starting: camera {} ({}x{} @ {} fps), {:?} actuator on {}",
        env!("CARGO_PKG_VERSION"),
        config.camera.device,
        config.camera.width,
        config.camera.height,
        config.camera.framerate,
        config.actuator.kind,
        config.actuator.hardware
    );

    let pulse_hardware = hardware::connect(&config.actuator.hardware)?;
    let actuator = actuator::build(&config.actuator, pulse_hardware)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = cancel.clone();
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    tracking::run(&config, actuator, cancel)?;
    log::info!("pan_trackd: shutdown complete");
    Ok(())
}
