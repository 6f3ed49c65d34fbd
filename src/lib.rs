//! Pan Tracker
//!
//! This crate points a single-axis pan actuator at whatever moves in front of
//! a camera.
//!
//! # Architecture
//!
//! One frame flows through the pipeline per iteration:
//!
//! 1. **Acquire**: a background thread keeps only the newest camera frame.
//! 2. **Watch**: a black-frame watchdog parks the actuator when the lens stays dark.
//! 3. **Detect**: frame differencing finds the largest moving region.
//! 4. **Map**: the region's horizontal centre becomes an actuator position,
//!    subject to a deadband.
//! 5. **Act**: a servo sweep, or a stepper ramp replayed by hardware-timed pulse chains.
//!
//! # Module Structure
//!
//! - `frame`: Frame model and capture orientation
//! - `ingest`: Cameras and the threaded `FrameSource`
//! - `detect`: Motion mask, external regions, `MotionDetector`
//! - `watchdog`: `BlackFrameWatchdog`
//! - `mapper`: `PositionMapper`
//! - `actuator`: `Actuator` seam, servo and stepper implementations, ramp planning
//! - `hardware`: `PulseHardware` seam, pigpio daemon client, simulator
//! - `tracking`: `Tracker` and the session supervisor
//! - `config`: `TrackerConfig` (TOML file + environment overrides)

pub mod actuator;
pub mod config;
pub mod detect;
pub mod frame;
pub mod hardware;
pub mod ingest;
pub mod mapper;
pub mod tracking;
pub mod watchdog;

pub use actuator::{Actuator, MoveOutcome, RampPlan, RampTable};
pub use config::TrackerConfig;
pub use detect::{MotionDetector, MotionEvent};
pub use frame::{Frame, Orientation};
pub use hardware::PulseHardware;
pub use ingest::{CaptureError, FrameSource};
pub use mapper::{MapDecision, PositionMapper};
pub use tracking::{ActuatorState, StepOutcome, Tracker};
pub use watchdog::{BlackFrameWatchdog, WatchdogVerdict};
