//! Frame model shared by the acquisition thread and the tracking loop.
//!
//! - `Frame`: one captured image plus its arrival order and capture instant.
//! - `Pixels`: RGB or single-channel gray storage backed by `image` buffers.
//! - `Orientation`: rotation and mirroring applied once, at capture time.
//!
//! A frame is immutable once published. The acquisition thread hands it to the
//! tracking loop behind an `Arc`, so a reader never observes a half-written image.

use anyhow::{anyhow, Result};
use image::{imageops, GrayImage, ImageBuffer, Pixel, RgbImage};
use std::time::Instant;

/// Pixel storage for a captured frame.
#[derive(Clone, Debug)]
pub enum Pixels {
    Rgb(RgbImage),
    Gray(GrayImage),
}

/// A single captured frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Pixels,
    /// Arrival order within a camera session, starting at 1.
    pub sequence: u64,
    /// Monotonic capture instant.
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(pixels: Pixels, sequence: u64) -> Self {
        Self {
            pixels,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn rgb(image: RgbImage, sequence: u64) -> Self {
        Self::new(Pixels::Rgb(image), sequence)
    }

    pub fn gray(image: GrayImage, sequence: u64) -> Self {
        Self::new(Pixels::Gray(image), sequence)
    }

    pub fn width(&self) -> u32 {
        match &self.pixels {
            Pixels::Rgb(image) => image.width(),
            Pixels::Gray(image) => image.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match &self.pixels {
            Pixels::Rgb(image) => image.height(),
            Pixels::Gray(image) => image.height(),
        }
    }

    /// A frame without pixels is what a failed capture looks like.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Sum of every channel value in the frame.
    ///
    /// Not normalised for resolution or channel count: a floor compared against
    /// this value only holds for the frame geometry it was tuned for.
    pub fn brightness(&self) -> u64 {
        let raw: &[u8] = match &self.pixels {
            Pixels::Rgb(image) => image.as_raw(),
            Pixels::Gray(image) => image.as_raw(),
        };
        raw.iter().map(|&v| u64::from(v)).sum()
    }

    /// Luma conversion used for frame differencing.
    pub fn to_gray(&self) -> GrayImage {
        match &self.pixels {
            Pixels::Rgb(image) => imageops::grayscale(image),
            Pixels::Gray(image) => image.clone(),
        }
    }

    /// Apply `orientation`, consuming the frame.
    pub fn oriented(self, orientation: &Orientation) -> Self {
        if orientation.is_identity() {
            return self;
        }
        let pixels = match self.pixels {
            Pixels::Rgb(image) => Pixels::Rgb(orient(image, orientation)),
            Pixels::Gray(image) => Pixels::Gray(orient(image, orientation)),
        };
        Self { pixels, ..self }
    }
}

// ----------------------------------------------------------------------------
// Orientation
// ----------------------------------------------------------------------------

/// Clockwise rotation applied to captured frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Result<Self> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Quarter),
            180 => Ok(Rotation::Half),
            270 => Ok(Rotation::ThreeQuarter),
            other => Err(anyhow!(
                "rotation must be one of 0, 90, 180, 270 (got {})",
                other
            )),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }
}

/// Camera mounting correction: rotate first, then mirror.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Orientation {
    pub rotation: Rotation,
    pub hflip: bool,
    pub vflip: bool,
}

impl Orientation {
    pub fn is_identity(&self) -> bool {
        self.rotation == Rotation::None && !self.hflip && !self.vflip
    }

    /// Frame dimensions after orientation for a `width` x `height` capture.
    pub fn output_dims(&self, width: u32, height: u32) -> (u32, u32) {
        match self.rotation {
            Rotation::Quarter | Rotation::ThreeQuarter => (height, width),
            Rotation::None | Rotation::Half => (width, height),
        }
    }
}

fn orient<P>(image: ImageBuffer<P, Vec<u8>>, orientation: &Orientation) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let mut image = match orientation.rotation {
        Rotation::None => image,
        Rotation::Quarter => imageops::rotate90(&image),
        Rotation::Half => imageops::rotate180(&image),
        Rotation::ThreeQuarter => imageops::rotate270(&image),
    };
    if orientation.hflip {
        imageops::flip_horizontal_in_place(&mut image);
    }
    if orientation.vflip {
        imageops::flip_vertical_in_place(&mut image);
    }
    image
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
