//! V4L2 camera.
//!
//! `V4l2Camera` captures from a local device node (e.g. /dev/video0), USB
//! webcams and CSI camera modules alike. It asks for RGB3 at the configured
//! size and frame rate and accepts YUYV when the driver insists on it.
//! Buffers are converted to RGB in memory and never written anywhere.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::CameraDevice;
use crate::config::CameraSettings;
use crate::frame::Frame;

const BUFFER_COUNT: u32 = 4;

pub struct V4l2Camera {
    device_path: String,
    state: Option<V4l2State>,
    format: PixelFormat,
    width: u32,
    height: u32,
    frame_count: u64,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = &settings.device;
        let mut device =
            v4l::Device::with_path(path).with_context(|| format!("open v4l2 device {}", path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Camera: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "{} delivers unsupported pixel format {} (RGB3 or YUYV required)",
                path,
                format.fourcc
            )
        })?;

        if settings.framerate > 0 {
            let params = v4l::video::capture::Parameters::with_fps(settings.framerate);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Camera: failed to set fps on {}: {}", path, err);
            }
        }

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Camera: connected to {} ({}x{} {:?}, {:?} camera)",
            path,
            format.width,
            format.height,
            pixel_format,
            settings.kind
        );
        Ok(Self {
            device_path: path.clone(),
            state: Some(state),
            format: pixel_format,
            width: format.width,
            height: format.height,
            frame_count: 0,
        })
    }
}

impl CameraDevice for V4l2Camera {
    fn describe(&self) -> String {
        format!("v4l2 {} ({}x{})", self.device_path, self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device closed")?;
        let (width, height, format) = (self.width, self.height, self.format);
        let image = state.with_mut(|fields| -> Result<_> {
            let (buf, _meta) = fields
                .stream
                .next()
                .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;
            normalize_to_rgb(buf, width, height, format)
        })?;
        self.frame_count += 1;
        Ok(Frame::rgb(image, self.frame_count))
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Camera: closed {}", self.device_path);
        }
    }
}
