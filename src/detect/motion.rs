use image::GrayImage;

use super::mask;
use super::regions::{self, BoundingBox, Point, Region};
use crate::config::DetectionSettings;
use crate::ingest::CaptureError;

/// The largest moving region found in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionEvent {
    pub centroid: Point,
    pub bbox: BoundingBox,
    pub area: u32,
    /// External regions seen in the mask, winner included.
    pub contour_count: usize,
}

/// Frame-differencing detector. Keeps exactly one image: the previous
/// grayscale frame.
pub struct MotionDetector {
    min_area: u32,
    threshold: u8,
    blur_size: u32,
    dilate_iterations: u32,
    baseline: Option<GrayImage>,
}

impl MotionDetector {
    pub fn new(settings: &DetectionSettings) -> Self {
        Self {
            min_area: settings.min_area,
            threshold: settings.threshold_sensitivity,
            blur_size: settings.blur_size,
            dilate_iterations: settings.dilate_iterations,
            baseline: None,
        }
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Compare `gray` with the previous frame, then make it the new baseline.
    ///
    /// The first frame after construction or `reset` only sets the baseline.
    /// An empty frame, or one whose size differs from the baseline, is a
    /// capture failure.
    pub fn detect(&mut self, gray: GrayImage) -> Result<Option<MotionEvent>, CaptureError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(CaptureError::Failed("empty frame".to_string()));
        }
        let Some(previous) = self.baseline.take() else {
            self.baseline = Some(gray);
            return Ok(None);
        };
        if previous.dimensions() != gray.dimensions() {
            return Err(CaptureError::Failed(format!(
                "frame size changed from {}x{} to {}x{}",
                previous.width(),
                previous.height(),
                gray.width(),
                gray.height()
            )));
        }
        let event = self.compare(&previous, &gray);
        self.baseline = Some(gray);
        Ok(event)
    }

    /// Replace the baseline without looking for motion.
    pub fn rebaseline(&mut self, gray: GrayImage) {
        self.baseline = Some(gray);
    }

    pub fn reset(&mut self) {
        self.baseline = None;
    }

    fn compare(&self, previous: &GrayImage, current: &GrayImage) -> Option<MotionEvent> {
        let diff = mask::abs_diff(previous, current);
        let blurred = mask::box_blur(&diff, self.blur_size);
        let binary = mask::threshold(&blurred, self.threshold);
        let dilated = mask::dilate(&binary, self.dilate_iterations);
        let regions = regions::external_regions(&dilated);
        largest_region(&regions, self.min_area).map(|region| MotionEvent {
            centroid: region.bbox.centroid(),
            bbox: region.bbox,
            area: region.area,
            contour_count: regions.len(),
        })
    }
}

/// Largest region strictly above `min_area`; the earliest wins a tie.
pub fn largest_region(regions: &[Region], min_area: u32) -> Option<&Region> {
    let mut best = None;
    let mut largest = min_area;
    for region in regions {
        if region.area > largest {
            largest = region.area;
            best = Some(region);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn settings(min_area: u32) -> DetectionSettings {
        DetectionSettings {
            min_area,
            ..DetectionSettings::default()
        }
    }

    fn square_frame(x: u32, y: u32, size: u32) -> GrayImage {
        let mut image = GrayImage::new(320, 240);
        for yy in y..y + size {
            for xx in x..x + size {
                image.put_pixel(xx, yy, Luma([255]));
            }
        }
        image
    }

    fn region(x: u32, area: u32) -> Region {
        Region {
            bbox: BoundingBox {
                x,
                y: 0,
                width: 1,
                height: 1,
            },
            area,
        }
    }

    #[test]
    fn square_appearing_on_black_is_one_event_near_its_centre() -> Result<(), CaptureError> {
        let mut detector = MotionDetector::new(&settings(100));
        assert_eq!(detector.detect(GrayImage::new(320, 240))?, None);

        let event = detector
            .detect(square_frame(150, 150, 20))?
            .ok_or_else(|| CaptureError::Failed("no motion reported".to_string()))?;
        assert_eq!(event.contour_count, 1);
        assert!(event.centroid.x.abs_diff(160) <= 2, "{:?}", event);
        assert!(event.centroid.y.abs_diff(160) <= 2, "{:?}", event);
        assert!((400..1200).contains(&event.area), "{:?}", event);
        assert!(event.bbox.contains(event.centroid));
        Ok(())
    }

    #[test]
    fn regions_at_or_below_min_area_are_ignored() -> Result<(), CaptureError> {
        let mut detector = MotionDetector::new(&settings(5_000));
        detector.detect(GrayImage::new(320, 240))?;
        assert_eq!(detector.detect(square_frame(150, 150, 20))?, None);

        let regions = [region(0, 200), region(5, 200)];
        assert!(largest_region(&regions, 200).is_none());
        assert_eq!(largest_region(&regions, 199).map(|r| r.bbox.x), Some(0));
        Ok(())
    }

    #[test]
    fn largest_region_wins() {
        let regions = [region(0, 300), region(1, 900), region(2, 900), region(3, 500)];
        assert_eq!(largest_region(&regions, 200).map(|r| r.bbox.x), Some(1));
    }

    #[test]
    fn identical_frames_show_no_motion() -> Result<(), CaptureError> {
        let mut detector = MotionDetector::new(&settings(200));
        detector.detect(square_frame(10, 10, 30))?;
        assert_eq!(detector.detect(square_frame(10, 10, 30))?, None);
        Ok(())
    }

    #[test]
    fn baseline_moves_forward_each_frame() -> Result<(), CaptureError> {
        let mut detector = MotionDetector::new(&settings(100));
        detector.detect(GrayImage::new(320, 240))?;
        assert!(detector.detect(square_frame(150, 150, 20))?.is_some());
        // Same scene again: compared against the square, not the black frame.
        assert_eq!(detector.detect(square_frame(150, 150, 20))?, None);
        Ok(())
    }

    #[test]
    fn rebaseline_suppresses_the_next_difference() -> Result<(), CaptureError> {
        let mut detector = MotionDetector::new(&settings(100));
        detector.detect(GrayImage::new(320, 240))?;
        detector.rebaseline(square_frame(150, 150, 20));
        assert_eq!(detector.detect(square_frame(150, 150, 20))?, None);

        detector.reset();
        assert!(!detector.has_baseline());
        assert_eq!(detector.detect(square_frame(0, 0, 50))?, None);
        Ok(())
    }

    #[test]
    fn empty_or_resized_frames_are_capture_failures() -> Result<(), CaptureError> {
        let mut detector = MotionDetector::new(&settings(100));
        assert!(detector.detect(GrayImage::new(0, 0)).is_err());
        detector.detect(GrayImage::new(320, 240))?;
        assert!(matches!(
            detector.detect(GrayImage::new(160, 120)),
            Err(CaptureError::Failed(_))
        ));
        Ok(())
    }
}
