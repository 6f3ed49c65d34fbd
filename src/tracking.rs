//! Tracking loop.
//!
//! This module is responsible for:
//! - Running one frame through watchdog, detector, mapper and actuator
//! - Committing the actuator position only for accepted moves
//! - Supervising camera sessions: warm-up, restart after capture failures,
//!   and orderly shutdown on cancellation
//!
//! Everything here runs on the caller's thread. The only other thread is the
//! acquisition thread owned by `FrameSource`.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::actuator::Actuator;
use crate::config::{CameraSettings, TrackerConfig};
use crate::detect::MotionDetector;
use crate::frame::Frame;
use crate::ingest::{CaptureError, FrameSource};
use crate::mapper::{MapDecision, PositionMapper, RejectReason};
use crate::watchdog::{BlackFrameWatchdog, WatchdogVerdict};

const CANCEL_POLL: Duration = Duration::from_millis(50);
const REPEAT_FRAME_BACKOFF: Duration = Duration::from_millis(1);

/// Where the actuator is and how long the lens has been dark.
///
/// Lives for the whole process, across camera sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActuatorState {
    pub current_position: i32,
    /// Set once the actuator has been homed during the current dark episode.
    pub is_zeroed: bool,
    pub black_duration: Duration,
    pub black_since: Option<Instant>,
}

impl ActuatorState {
    pub fn new(position: i32) -> Self {
        Self {
            current_position: position,
            is_zeroed: false,
            black_duration: Duration::ZERO,
            black_since: None,
        }
    }
}

/// What one call to `Tracker::step` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Dark frame, ignored.
    Dark,
    /// Dark long enough: moved home.
    Homed { from: i32, to: i32 },
    /// Light came back: detector baseline replaced, no detection.
    Rebaselined,
    NoMotion,
    Rejected { target: i32, reason: RejectReason },
    Moved { from: i32, to: i32 },
    /// The actuator was still busy; position unchanged.
    Busy { target: i32 },
}

#[derive(Debug)]
pub enum TrackError {
    Capture(CaptureError),
    Actuator(anyhow::Error),
}

impl std::fmt::Display for TrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackError::Capture(err) => write!(f, "{}", err),
            TrackError::Actuator(err) => write!(f, "actuator error: {:#}", err),
        }
    }
}

impl std::error::Error for TrackError {}

impl From<CaptureError> for TrackError {
    fn from(err: CaptureError) -> Self {
        TrackError::Capture(err)
    }
}

/// How a camera session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Cancelled,
    CaptureFailed(CaptureError),
}

// ----------------------------------------------------------------------------
// FPS reporting
// ----------------------------------------------------------------------------

/// Counts processed frames and yields the rate every `every` frames.
pub struct FpsCounter {
    every: u64,
    count: u64,
    window_start: Instant,
}

impl FpsCounter {
    pub fn new(every: u64) -> Self {
        Self {
            every,
            count: 0,
            window_start: Instant::now(),
        }
    }

    pub fn restart(&mut self) {
        self.count = 0;
        self.window_start = Instant::now();
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        if self.every == 0 {
            return None;
        }
        self.count += 1;
        if self.count < self.every {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.count as f64 / elapsed
        } else {
            f64::INFINITY
        };
        self.count = 0;
        self.window_start = now;
        Some(rate)
    }
}

// ----------------------------------------------------------------------------
// Tracker
// ----------------------------------------------------------------------------

pub struct Tracker {
    detector: MotionDetector,
    watchdog: BlackFrameWatchdog,
    mapper: PositionMapper,
    actuator: Box<dyn Actuator>,
    state: ActuatorState,
    home_position: i32,
    idle_timeout: Duration,
    fps: FpsCounter,
}

impl Tracker {
    /// The actuator is assumed to sit at the home position.
    pub fn new(config: &TrackerConfig, actuator: Box<dyn Actuator>) -> Self {
        let home_position = config.actuator.home_position;
        Self {
            detector: MotionDetector::new(&config.detection),
            watchdog: BlackFrameWatchdog::new(&config.watchdog),
            mapper: PositionMapper::new(&config.mapper, &config.actuator),
            actuator,
            state: ActuatorState::new(home_position),
            home_position,
            idle_timeout: config.actuator.idle_timeout,
            fps: FpsCounter::new(config.fps_report_frames),
        }
    }

    pub fn state(&self) -> &ActuatorState {
        &self.state
    }

    /// Drive the actuator to the home position it is assumed to occupy.
    pub fn initialize(&mut self) -> Result<()> {
        log::info!(
            "Tracker: {} actuator starting at position {}",
            self.actuator.name(),
            self.home_position
        );
        self.actuator
            .initialize(self.home_position)
            .context("initialize actuator")
    }

    pub fn release(&mut self) -> Result<()> {
        self.actuator.release().context("release actuator")
    }

    /// Process one frame.
    pub fn step(&mut self, frame: &Frame, now: Instant) -> Result<StepOutcome, TrackError> {
        if frame.is_empty() {
            return Err(CaptureError::Failed("camera returned an empty frame".to_string()).into());
        }

        match self
            .watchdog
            .observe(&mut self.state, frame.brightness(), now)
        {
            WatchdogVerdict::Dark => return Ok(StepOutcome::Dark),
            WatchdogVerdict::Home => return self.go_home(),
            WatchdogVerdict::Recovered => {
                log::info!("Tracker: light restored, resetting motion baseline");
                self.detector.rebaseline(frame.to_gray());
                return Ok(StepOutcome::Rebaselined);
            }
            WatchdogVerdict::Bright => {}
        }

        let Some(event) = self.detector.detect(frame.to_gray())? else {
            return Ok(StepOutcome::NoMotion);
        };
        log::debug!(
            "cxy({},{}) contours:{} largest:{}x{}={}",
            event.centroid.x,
            event.centroid.y,
            event.contour_count,
            event.bbox.width,
            event.bbox.height,
            event.area
        );

        let current = self.state.current_position;
        match self.mapper.evaluate(event.centroid.x, frame.width(), current) {
            MapDecision::Rejected {
                target,
                difference,
                reason,
            } => {
                log::debug!(
                    "Tracker: {:?} move to {} rejected (difference {})",
                    reason,
                    target,
                    difference
                );
                Ok(StepOutcome::Rejected { target, reason })
            }
            MapDecision::Move { target } => {
                let outcome = self
                    .actuator
                    .move_to(current, target)
                    .map_err(TrackError::Actuator)?;
                if !outcome.accepted() {
                    log::debug!("Tracker: actuator busy, dropping move to {}", target);
                    return Ok(StepOutcome::Busy { target });
                }
                self.state.current_position = target;
                Ok(StepOutcome::Moved {
                    from: current,
                    to: target,
                })
            }
        }
    }

    fn go_home(&mut self) -> Result<StepOutcome, TrackError> {
        let from = self.state.current_position;
        let home = self.home_position;
        log::info!(
            "Tracker: lens dark for {:?}, returning {} -> {}",
            self.state.black_duration,
            from,
            home
        );
        let idle = self
            .actuator
            .wait_idle(self.idle_timeout)
            .map_err(TrackError::Actuator)?;
        if !idle {
            log::warn!(
                "Tracker: previous move still running after {:?}",
                self.idle_timeout
            );
        }
        let outcome = self
            .actuator
            .move_to(from, home)
            .map_err(TrackError::Actuator)?;
        if !outcome.accepted() {
            // Try again on the next dark frame.
            self.state.is_zeroed = false;
            log::warn!("Tracker: actuator busy, homing deferred");
            return Ok(StepOutcome::Busy { target: home });
        }
        self.state.current_position = home;
        Ok(StepOutcome::Homed { from, to: home })
    }

    /// Read and process frames until cancelled or the camera fails.
    ///
    /// Actuator failures are returned as errors; capture failures end the
    /// session normally so the caller can restart the camera.
    pub fn run_session(&mut self, source: &FrameSource, cancel: &AtomicBool) -> Result<SessionEnd> {
        self.detector.reset();
        self.fps.restart();
        let mut last_sequence = None;

        while !cancel.load(Ordering::SeqCst) {
            let frame = match source.read() {
                Ok(frame) => frame,
                Err(err) => return Ok(SessionEnd::CaptureFailed(err)),
            };
            if last_sequence == Some(frame.sequence) {
                thread::sleep(REPEAT_FRAME_BACKOFF);
                continue;
            }
            last_sequence = Some(frame.sequence);

            match self.step(&frame, frame.captured_at) {
                Ok(_) => {}
                Err(TrackError::Capture(err)) => return Ok(SessionEnd::CaptureFailed(err)),
                Err(TrackError::Actuator(err)) => return Err(err.context("actuator move failed")),
            }

            if let Some(rate) = self.fps.tick() {
                log::info!("Tracker: processing {:.1} frames/s", rate);
            }
        }
        Ok(SessionEnd::Cancelled)
    }
}

// ----------------------------------------------------------------------------
// Supervisor
// ----------------------------------------------------------------------------

/// Sleep for `duration` unless cancelled first. Returns false if cancelled.
pub fn sleep_interruptible(duration: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(CANCEL_POLL.min(deadline - now));
    }
}

/// Track until `cancel` is set.
///
/// A camera that cannot be opened the first time is fatal. After that,
/// capture failures and failed re-opens are retried after the restart delay.
pub fn run(
    config: &TrackerConfig,
    actuator: Box<dyn Actuator>,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    run_with(config, actuator, cancel, FrameSource::start)
}

/// Like [`run`], but every camera (re)open goes through `open`.
pub fn run_with<F>(
    config: &TrackerConfig,
    actuator: Box<dyn Actuator>,
    cancel: Arc<AtomicBool>,
    open: F,
) -> Result<()>
where
    F: FnMut(&CameraSettings) -> Result<FrameSource, CaptureError>,
{
    let mut tracker = Tracker::new(config, actuator);
    tracker.initialize()?;
    let result = supervise(&mut tracker, &config.camera, &cancel, open);
    if let Err(err) = tracker.release() {
        log::warn!("Tracker: {:#}", err);
    }
    log::info!(
        "Tracker: stopped at position {}",
        tracker.state().current_position
    );
    result
}

fn supervise<F>(
    tracker: &mut Tracker,
    camera: &CameraSettings,
    cancel: &AtomicBool,
    mut open: F,
) -> Result<()>
where
    F: FnMut(&CameraSettings) -> Result<FrameSource, CaptureError>,
{
    let mut opened_once = false;

    while !cancel.load(Ordering::SeqCst) {
        let mut source = match open(camera) {
            Ok(source) => source,
            Err(err) if !opened_once => {
                let context = format!("open camera {}", camera.device);
                return Err(anyhow::Error::new(err).context(context));
            }
            Err(err) => {
                log::warn!(
                    "Tracker: reopening {} failed: {}; retrying in {:?}",
                    camera.device,
                    err,
                    camera.restart_delay
                );
                sleep_interruptible(camera.restart_delay, cancel);
                continue;
            }
        };
        opened_once = true;

        log::info!(
            "Tracker: warming up {} for {:?}",
            source.describe(),
            camera.warmup
        );
        if !sleep_interruptible(camera.warmup, cancel) {
            source.stop();
            break;
        }

        let end = tracker.run_session(&source, cancel);
        source.stop();
        match end? {
            SessionEnd::Cancelled => break,
            SessionEnd::CaptureFailed(err) => {
                log::error!(
                    "Tracker: {}; restarting camera in {:?}",
                    err,
                    camera.restart_delay
                );
                sleep_interruptible(camera.restart_delay, cancel);
            }
        }
    }
    Ok(())
}
