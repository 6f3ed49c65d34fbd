//! Horizontal centroid to actuator position.
//!
//! The frame width spans `field_of_view` units starting at `base_offset`.
//! Moves that are too small (jitter) or too large (a jump across the scene
//! is more likely noise than a target) are rejected.

use crate::config::{ActuatorSettings, MapperSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    TooSmall,
    TooLarge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapDecision {
    Move {
        target: i32,
    },
    Rejected {
        target: i32,
        difference: i32,
        reason: RejectReason,
    },
}

#[derive(Clone, Debug)]
pub struct PositionMapper {
    base_offset: i32,
    field_of_view: f64,
    min_deadband_pct: f64,
    max_deadband_pct: f64,
    min_position: i32,
    max_position: i32,
}

impl PositionMapper {
    pub fn new(mapper: &MapperSettings, actuator: &ActuatorSettings) -> Self {
        Self {
            base_offset: mapper.base_offset,
            field_of_view: mapper.field_of_view,
            min_deadband_pct: mapper.min_deadband_pct,
            max_deadband_pct: mapper.max_deadband_pct,
            min_position: actuator.min_position,
            max_position: actuator.max_position,
        }
    }

    /// Position for a centroid at column `x`, truncated towards zero and
    /// clamped to the actuator range.
    pub fn target_for(&self, x: u32, frame_width: u32) -> i32 {
        let raw = if frame_width == 0 {
            f64::from(self.base_offset)
        } else {
            f64::from(self.base_offset)
                + self.field_of_view * f64::from(x) / f64::from(frame_width)
        };
        (raw.trunc() as i32).clamp(self.min_position, self.max_position)
    }

    pub fn evaluate(&self, x: u32, frame_width: u32, current: i32) -> MapDecision {
        let target = self.target_for(x, frame_width);
        let difference = (target - current).abs();
        let width = f64::from(frame_width);
        let reason = if f64::from(difference) < self.min_deadband_pct * width {
            Some(RejectReason::TooSmall)
        } else if f64::from(difference) > self.max_deadband_pct * width {
            Some(RejectReason::TooLarge)
        } else {
            None
        };
        match reason {
            Some(reason) => MapDecision::Rejected {
                target,
                difference,
                reason,
            },
            None => MapDecision::Move { target },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> PositionMapper {
        PositionMapper::new(&MapperSettings::default(), &ActuatorSettings::default())
    }

    #[test]
    fn maps_across_the_field_of_view() {
        let mapper = mapper();
        assert_eq!(mapper.target_for(0, 320), 105);
        assert_eq!(mapper.target_for(160, 320), 150);
        assert_eq!(mapper.target_for(319, 320), 194);
        // 105 + 90 * 7 / 320 = 106.97 truncates to 106.
        assert_eq!(mapper.target_for(7, 320), 106);
    }

    #[test]
    fn targets_are_clamped_to_the_actuator_range() {
        let mapper = PositionMapper::new(
            &MapperSettings {
                base_offset: 50,
                field_of_view: 300.0,
                ..MapperSettings::default()
            },
            &ActuatorSettings::default(),
        );
        assert_eq!(mapper.target_for(0, 320), 105);
        assert_eq!(mapper.target_for(319, 320), 195);
    }

    #[test]
    fn small_differences_are_rejected_repeatedly() {
        let mapper = mapper();
        // 2% of 320 = 6.4 units.
        for _ in 0..3 {
            assert_eq!(
                mapper.evaluate(160, 320, 150),
                MapDecision::Rejected {
                    target: 150,
                    difference: 0,
                    reason: RejectReason::TooSmall
                }
            );
        }
        assert!(matches!(
            mapper.evaluate(160, 320, 144),
            MapDecision::Rejected {
                reason: RejectReason::TooSmall,
                ..
            }
        ));
        assert_eq!(mapper.evaluate(160, 320, 143), MapDecision::Move { target: 150 });
    }

    #[test]
    fn large_jumps_are_rejected() {
        let mapper = PositionMapper::new(
            &MapperSettings {
                max_deadband_pct: 0.1,
                ..MapperSettings::default()
            },
            &ActuatorSettings::default(),
        );
        // 10% of 320 = 32 units.
        assert!(matches!(
            mapper.evaluate(319, 320, 145),
            MapDecision::Rejected {
                reason: RejectReason::TooLarge,
                difference: 49,
                ..
            }
        ));
        assert_eq!(mapper.evaluate(250, 320, 145), MapDecision::Move { target: 175 });
    }
}
