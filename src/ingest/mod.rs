//! Frame acquisition.
//!
//! This module provides the cameras and the threaded source that feeds the
//! tracking loop:
//! - Synthetic cameras for `stub://scene`, `stub://dark` and `stub://static`
//! - Local V4L2 devices (feature: camera-v4l2)
//! - `FrameSource`: a background thread that keeps only the newest frame
//!
//! The acquisition thread is responsible for:
//! - Pulling frames from the camera as fast as it delivers them
//! - Applying the configured orientation once, at capture time
//! - Publishing each frame into a single slot, replacing the previous one
//!
//! Frames the tracking loop does not read in time are dropped silently.

mod normalize;
pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub mod v4l2;

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::CameraSettings;
use crate::frame::{Frame, Orientation};

pub use synthetic::{SyntheticCamera, SyntheticScene};
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

const DEFAULT_FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture problems the tracking loop must branch on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureError {
    /// The camera cannot be opened at all.
    Unavailable(String),
    /// The camera was open but stopped delivering usable frames.
    Failed(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Unavailable(message) => write!(f, "camera unavailable: {}", message),
            CaptureError::Failed(message) => write!(f, "capture failed: {}", message),
        }
    }
}

impl std::error::Error for CaptureError {}

/// A camera that delivers frames on demand.
pub trait CameraDevice: Send {
    /// Human-readable identifier for logs.
    fn describe(&self) -> String;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the device. Called once, from the acquisition thread.
    fn close(&mut self) {}
}

/// Open the camera named by `settings.device`.
pub fn open_camera(settings: &CameraSettings) -> Result<Box<dyn CameraDevice>, CaptureError> {
    if let Some(scene) = settings.device.strip_prefix("stub://") {
        let scene =
            SyntheticScene::parse(scene).map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        return Ok(Box::new(SyntheticCamera::new(
            scene,
            settings.width,
            settings.height,
            settings.framerate,
        )));
    }
    open_device(settings)
}

#[cfg(feature = "camera-v4l2")]
fn open_device(settings: &CameraSettings) -> Result<Box<dyn CameraDevice>, CaptureError> {
    let camera = V4l2Camera::open(settings)
        .map_err(|e| CaptureError::Unavailable(format!("{:#}", e)))?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "camera-v4l2"))]
fn open_device(settings: &CameraSettings) -> Result<Box<dyn CameraDevice>, CaptureError> {
    Err(CaptureError::Unavailable(format!(
        "{} is a device path; rebuild with the camera-v4l2 feature",
        settings.device
    )))
}

// ----------------------------------------------------------------------------
// FrameSource
// ----------------------------------------------------------------------------

#[derive(Default)]
struct Slot {
    latest: Option<Arc<Frame>>,
    failure: Option<String>,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, frame: Frame) {
        self.lock().latest = Some(Arc::new(frame));
        self.ready.notify_all();
    }

    fn fail(&self, message: String) {
        self.lock().failure = Some(message);
        self.ready.notify_all();
    }
}

/// Threaded camera reader exposing only the most recent frame.
pub struct FrameSource {
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    description: String,
    first_frame_timeout: Duration,
}

impl FrameSource {
    /// Open the configured camera and start acquiring.
    pub fn start(settings: &CameraSettings) -> Result<Self, CaptureError> {
        let camera = open_camera(settings)?;
        Ok(Self::with_camera(camera, settings.orientation)
            .with_first_frame_timeout(settings.first_frame_timeout))
    }

    /// Start acquiring from an already-open camera.
    pub fn with_camera(camera: Box<dyn CameraDevice>, orientation: Orientation) -> Self {
        let shared = Arc::new(Shared::default());
        let stop = Arc::new(AtomicBool::new(false));
        let description = camera.describe();
        log::info!(
            "FrameSource: acquiring from {} (rotation {}, hflip {}, vflip {})",
            description,
            orientation.rotation.degrees(),
            orientation.hflip,
            orientation.vflip
        );

        let shared_thread = shared.clone();
        let stop_thread = stop.clone();
        let join = std::thread::spawn(move || {
            acquire(camera, orientation, &shared_thread, &stop_thread);
        });

        Self {
            shared,
            stop,
            join: Some(join),
            description,
            first_frame_timeout: DEFAULT_FIRST_FRAME_TIMEOUT,
        }
    }

    pub fn with_first_frame_timeout(mut self, timeout: Duration) -> Self {
        self.first_frame_timeout = timeout;
        self
    }

    pub fn describe(&self) -> &str {
        &self.description
    }

    /// Latest frame. Waits up to the first-frame timeout while nothing has
    /// arrived yet; never blocks afterwards.
    pub fn read(&self) -> Result<Arc<Frame>, CaptureError> {
        let mut slot = self.shared.lock();
        if slot.latest.is_none() && slot.failure.is_none() {
            let (guard, _) = self
                .shared
                .ready
                .wait_timeout_while(slot, self.first_frame_timeout, |slot| {
                    slot.latest.is_none() && slot.failure.is_none()
                })
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot = guard;
        }
        if let Some(message) = &slot.failure {
            return Err(CaptureError::Failed(message.clone()));
        }
        slot.latest.clone().ok_or_else(|| {
            CaptureError::Failed(format!(
                "no frame from {} within {:?}",
                self.description, self.first_frame_timeout
            ))
        })
    }

    /// Stop the acquisition thread and wait for it to close the camera.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("FrameSource: acquisition thread for {} panicked", self.description);
            } else {
                log::debug!("FrameSource: stopped {}", self.description);
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.join.is_none()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn acquire(
    mut camera: Box<dyn CameraDevice>,
    orientation: Orientation,
    shared: &Shared,
    stop: &AtomicBool,
) {
    let mut sequence = 0u64;
    while !stop.load(Ordering::SeqCst) {
        match camera.next_frame() {
            Ok(frame) => {
                sequence += 1;
                let mut frame = frame.oriented(&orientation);
                frame.sequence = sequence;
                shared.publish(frame);
            }
            Err(err) => {
                log::error!("FrameSource: capture from {} failed: {:#}", camera.describe(), err);
                shared.fail(format!("{:#}", err));
                break;
            }
        }
    }
    camera.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use image::{GrayImage, Luma};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    /// Plays back a fixed list of frames, then fails.
    struct ScriptedCamera {
        frames: Vec<GrayImage>,
        delay: Duration,
        closed: Arc<AtomicUsize>,
    }

    impl CameraDevice for ScriptedCamera {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        fn next_frame(&mut self) -> Result<Frame> {
            thread::sleep(self.delay);
            if self.frames.is_empty() {
                return Err(anyhow!("script exhausted"));
            }
            Ok(Frame::gray(self.frames.remove(0), 0))
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn scripted(count: u8, delay: Duration) -> (Box<dyn CameraDevice>, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let frames = (0..count)
            .map(|i| GrayImage::from_pixel(4, 4, Luma([i])))
            .collect();
        let camera = ScriptedCamera {
            frames,
            delay,
            closed: closed.clone(),
        };
        (Box::new(camera), closed)
    }

    #[test]
    fn read_returns_the_newest_frame() -> Result<()> {
        let (camera, _closed) = scripted(200, Duration::from_millis(1));
        let mut source = FrameSource::with_camera(camera, Orientation::default());
        let first = source.read()?;
        thread::sleep(Duration::from_millis(50));
        let later = source.read()?;
        assert!(later.sequence > first.sequence);
        source.stop();
        Ok(())
    }

    #[test]
    fn capture_failure_is_reported_to_readers() {
        let (camera, closed) = scripted(2, Duration::ZERO);
        let source = FrameSource::with_camera(camera, Orientation::default());
        thread::sleep(Duration::from_millis(50));
        assert!(matches!(source.read(), Err(CaptureError::Failed(_))));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_read_times_out_without_frames() {
        let (camera, _closed) = scripted(1, Duration::from_secs(1));
        let source = FrameSource::with_camera(camera, Orientation::default())
            .with_first_frame_timeout(Duration::from_millis(20));
        let err = source.read().unwrap_err();
        assert!(err.to_string().contains("no frame"));
    }

    #[test]
    fn stop_is_idempotent_and_closes_once() {
        let (camera, closed) = scripted(100, Duration::from_millis(1));
        let mut source = FrameSource::with_camera(camera, Orientation::default());
        source.stop();
        source.stop();
        assert!(source.is_stopped());
        drop(source);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn orientation_is_applied_before_publishing() -> Result<()> {
        let closed = Arc::new(AtomicUsize::new(0));
        let camera = ScriptedCamera {
            frames: vec![GrayImage::new(8, 2); 50],
            delay: Duration::from_millis(1),
            closed,
        };
        let orientation = Orientation {
            rotation: crate::frame::Rotation::Quarter,
            ..Orientation::default()
        };
        let source = FrameSource::with_camera(Box::new(camera), orientation);
        let frame = source.read()?;
        assert_eq!((frame.width(), frame.height()), (2, 8));
        assert!(frame.sequence >= 1);
        Ok(())
    }

    #[test]
    fn stub_devices_open_and_paths_need_the_feature() {
        let settings = CameraSettings::default();
        assert!(open_camera(&settings).is_ok());

        let unknown = CameraSettings {
            device: "stub://fireworks".to_string(),
            ..CameraSettings::default()
        };
        assert!(matches!(
            open_camera(&unknown).map(|_| ()),
            Err(CaptureError::Unavailable(_))
        ));

        #[cfg(not(feature = "camera-v4l2"))]
        {
            let device = CameraSettings {
                device: "/dev/video0".to_string(),
                ..CameraSettings::default()
            };
            assert!(matches!(
                open_camera(&device).map(|_| ()),
                Err(CaptureError::Unavailable(_))
            ));
        }
    }
}
