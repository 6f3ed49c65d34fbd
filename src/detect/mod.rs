//! Motion detection by frame differencing.
//!
//! This module is responsible for:
//! - Building the motion mask (`mask`): difference, blur, threshold, dilate
//! - Finding external regions in the mask (`regions`)
//! - Reporting the single largest moving region per frame (`motion`)
//!
//! Pixels never leave the process. Only the `MotionEvent` summary is passed
//! on to the tracking loop.

pub mod mask;
pub mod motion;
pub mod regions;

pub use motion::{largest_region, MotionDetector, MotionEvent};
pub use regions::{external_regions, BoundingBox, Point, Region};
