//! Synthetic cameras for `stub://` devices.
//!
//! - `stub://scene` (or `stub://`): a bright square sweeping back and forth
//!   across a dim background
//! - `stub://dark`: a lens-capped camera, every pixel black
//! - `stub://static`: the background alone
//!
//! Lit scenes carry low-amplitude sensor noise that stays well under the
//! motion threshold. Frames are paced at the configured frame rate.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::thread;
use std::time::{Duration, Instant};

use super::CameraDevice;
use crate::frame::Frame;

const BACKGROUND_LEVEL: u8 = 80;
const TARGET_LEVEL: u8 = 230;
const NOISE_SPAN: u8 = 5;
const TARGET_SIZE: u32 = 24;
const TARGET_SPEED_PX: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntheticScene {
    Scene,
    Dark,
    Static,
}

impl SyntheticScene {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "" | "scene" => Ok(SyntheticScene::Scene),
            "dark" => Ok(SyntheticScene::Dark),
            "static" => Ok(SyntheticScene::Static),
            other => Err(anyhow!(
                "unknown synthetic scene 'stub://{}' (scene|dark|static)",
                other
            )),
        }
    }
}

pub struct SyntheticCamera {
    scene: SyntheticScene,
    width: u32,
    height: u32,
    frame_interval: Duration,
    next_due: Option<Instant>,
    frame_count: u64,
    rng: StdRng,
}

impl SyntheticCamera {
    pub fn new(scene: SyntheticScene, width: u32, height: u32, framerate: u32) -> Self {
        Self::with_rng(scene, width, height, framerate, StdRng::from_entropy())
    }

    fn with_rng(
        scene: SyntheticScene,
        width: u32,
        height: u32,
        framerate: u32,
        rng: StdRng,
    ) -> Self {
        let frame_interval = if framerate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / framerate
        };
        Self {
            scene,
            width,
            height,
            frame_interval,
            next_due: None,
            frame_count: 0,
            rng,
        }
    }

    /// Left edge of the target for a given frame: a triangle wave over the
    /// free horizontal travel.
    pub fn target_x(&self, frame_count: u64) -> u32 {
        let travel = u64::from(self.width.saturating_sub(TARGET_SIZE));
        if travel == 0 {
            return 0;
        }
        let phase = (frame_count * u64::from(TARGET_SPEED_PX)) % (2 * travel);
        let x = if phase < travel { phase } else { 2 * travel - phase };
        x as u32
    }

    fn pace(&mut self) {
        if let Some(due) = self.next_due {
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + self.frame_interval);
    }

    fn render(&mut self) -> RgbImage {
        if self.scene == SyntheticScene::Dark {
            return RgbImage::new(self.width, self.height);
        }
        let mut noise = vec![0u8; (self.width * self.height) as usize];
        self.rng.fill_bytes(&mut noise);
        let mut image = RgbImage::new(self.width, self.height);
        for (i, pixel) in image.pixels_mut().enumerate() {
            let level = BACKGROUND_LEVEL + noise[i] % NOISE_SPAN;
            *pixel = Rgb([level, level, level]);
        }

        if self.scene == SyntheticScene::Scene {
            let x0 = self.target_x(self.frame_count);
            let y0 = self.height.saturating_sub(TARGET_SIZE) / 2;
            for y in y0..(y0 + TARGET_SIZE).min(self.height) {
                for x in x0..(x0 + TARGET_SIZE).min(self.width) {
                    image.put_pixel(x, y, Rgb([TARGET_LEVEL, TARGET_LEVEL, TARGET_LEVEL]));
                }
            }
        }
        image
    }
}

impl CameraDevice for SyntheticCamera {
    fn describe(&self) -> String {
        format!(
            "synthetic {:?} camera ({}x{})",
            self.scene, self.width, self.height
        )
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.pace();
        let image = self.render();
        self.frame_count += 1;
        Ok(Frame::rgb(image, self.frame_count))
    }
}
