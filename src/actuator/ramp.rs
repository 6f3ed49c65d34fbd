//! Trapezoidal step-rate profiles.
//!
//! A `RampTable` lists the frequencies a stepper climbs through and how many
//! steps it spends at each. `RampPlan::build` fits that table into a move of
//! N steps: accelerate through the table over the first half, hold the peak
//! for whatever is left, then decelerate as an exact mirror of the climb.

use anyhow::{anyhow, Result};
use std::time::Duration;

/// Highest frequency a single-pin waveform can express with 1 us resolution.
const MAX_FREQUENCY_HZ: u32 = 500_000;

const DEFAULT_RAMP: [RampSegment; 8] = [
    RampSegment::new(250, 50),
    RampSegment::new(320, 100),
    RampSegment::new(400, 150),
    RampSegment::new(500, 200),
    RampSegment::new(800, 300),
    RampSegment::new(1000, 400),
    RampSegment::new(1600, 600),
    RampSegment::new(2000, 1000),
];

/// A run of `steps` pulses at `frequency_hz`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RampSegment {
    pub frequency_hz: u32,
    pub steps: u32,
}

impl RampSegment {
    pub const fn new(frequency_hz: u32, steps: u32) -> Self {
        Self {
            frequency_hz,
            steps,
        }
    }

    /// Time the step pin spends high (and then low) for one pulse.
    pub fn half_period_us(&self) -> u32 {
        MAX_FREQUENCY_HZ / self.frequency_hz
    }

    pub fn duration(&self) -> Duration {
        Duration::from_micros(u64::from(self.half_period_us()) * 2 * u64::from(self.steps))
    }
}

// ----------------------------------------------------------------------------
// Table
// ----------------------------------------------------------------------------

/// Validated acceleration table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RampTable {
    entries: Vec<RampSegment>,
}

impl RampTable {
    pub fn new(entries: Vec<RampSegment>) -> Result<Self> {
        if entries.is_empty() {
            return Err(anyhow!("ramp table must have at least one entry"));
        }
        for entry in &entries {
            if entry.frequency_hz == 0 || entry.frequency_hz > MAX_FREQUENCY_HZ {
                return Err(anyhow!(
                    "ramp frequency must be within 1..={} Hz (got {})",
                    MAX_FREQUENCY_HZ,
                    entry.frequency_hz
                ));
            }
            if entry.steps == 0 {
                return Err(anyhow!(
                    "ramp entry at {} Hz has zero steps",
                    entry.frequency_hz
                ));
            }
        }
        if entries
            .windows(2)
            .any(|pair| pair[1].frequency_hz <= pair[0].frequency_hz)
        {
            return Err(anyhow!("ramp frequencies must be strictly ascending"));
        }
        Ok(Self { entries })
    }

    pub fn steps(&self) -> &[RampSegment] {
        &self.entries
    }

    pub fn first_frequency(&self) -> u32 {
        self.entries.first().map_or(1, |entry| entry.frequency_hz)
    }

    pub fn top_frequency(&self) -> u32 {
        self.entries.last().map_or(1, |entry| entry.frequency_hz)
    }

    /// Steps needed to climb the whole table.
    pub fn climb_steps(&self) -> u64 {
        self.entries.iter().map(|entry| u64::from(entry.steps)).sum()
    }
}

impl Default for RampTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_RAMP.to_vec(),
        }
    }
}

// ----------------------------------------------------------------------------
// Plan
// ----------------------------------------------------------------------------

/// Segment layout for one move.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RampPlan {
    pub acceleration: Vec<RampSegment>,
    pub cruise: Option<RampSegment>,
    pub deceleration: Vec<RampSegment>,
}

impl RampPlan {
    pub fn build(table: &RampTable, total_steps: u32) -> Self {
        let mut remaining = total_steps / 2;
        let mut acceleration = Vec::new();
        for entry in table.steps() {
            if remaining == 0 {
                break;
            }
            if entry.steps > remaining {
                acceleration.push(RampSegment::new(entry.frequency_hz, remaining));
                remaining = 0;
                break;
            }
            acceleration.push(*entry);
            remaining -= entry.steps;
        }

        // remaining > 0 here only when the whole table was climbed.
        let peak = acceleration
            .last()
            .map_or_else(|| table.first_frequency(), |segment| segment.frequency_hz);
        let cruise_steps = remaining * 2 + total_steps % 2;
        let cruise = (cruise_steps > 0).then(|| RampSegment::new(peak, cruise_steps));
        let deceleration = acceleration.iter().rev().copied().collect();

        Self {
            acceleration,
            cruise,
            deceleration,
        }
    }

    /// Acceleration, cruise and deceleration in transmission order.
    pub fn segments(&self) -> impl Iterator<Item = &RampSegment> {
        self.acceleration
            .iter()
            .chain(self.cruise.iter())
            .chain(self.deceleration.iter())
    }

    pub fn total_steps(&self) -> u64 {
        self.segments().map(|segment| u64::from(segment.steps)).sum()
    }

    pub fn peak_frequency(&self) -> Option<u32> {
        self.segments().map(|segment| segment.frequency_hz).max()
    }

    /// Nominal transmission time, ignoring pigpio's inter-wave gaps.
    pub fn duration(&self) -> Duration {
        self.segments().map(RampSegment::duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(frequency_hz: u32, steps: u32) -> RampSegment {
        RampSegment::new(frequency_hz, steps)
    }

    #[test]
    fn two_thousand_steps_climb_part_of_the_default_table() {
        let plan = RampPlan::build(&RampTable::default(), 2000);
        assert_eq!(
            plan.acceleration,
            vec![
                seg(250, 50),
                seg(320, 100),
                seg(400, 150),
                seg(500, 200),
                seg(800, 300),
                seg(1000, 200),
            ]
        );
        assert_eq!(plan.cruise, None);
        assert_eq!(plan.total_steps(), 2000);
    }

    #[test]
    fn long_move_cruises_at_the_top_frequency() {
        let table = RampTable::default();
        assert_eq!(table.climb_steps(), 2800);

        let plan = RampPlan::build(&table, 8000);
        assert_eq!(plan.acceleration, table.steps().to_vec());
        assert_eq!(plan.cruise, Some(seg(2000, 2400)));
        assert_eq!(plan.total_steps(), 8000);
        assert_eq!(plan.peak_frequency(), Some(2000));
    }

    #[test]
    fn odd_step_counts_put_the_extra_step_in_the_middle() {
        let plan = RampPlan::build(&RampTable::default(), 2001);
        assert_eq!(plan.cruise, Some(seg(1000, 1)));
        assert_eq!(plan.total_steps(), 2001);
    }

    #[test]
    fn tiny_moves() {
        let table = RampTable::default();

        let empty = RampPlan::build(&table, 0);
        assert_eq!(empty.segments().count(), 0);

        let single = RampPlan::build(&table, 1);
        assert!(single.acceleration.is_empty());
        assert_eq!(single.cruise, Some(seg(250, 1)));
        assert!(single.deceleration.is_empty());
    }

    #[test]
    fn plans_are_exact_and_symmetric() {
        let table = RampTable::default();
        for total in (0..12_000).step_by(37) {
            let plan = RampPlan::build(&table, total);
            assert_eq!(plan.total_steps(), u64::from(total), "total {}", total);
            let mirrored: Vec<_> = plan.acceleration.iter().rev().copied().collect();
            assert_eq!(plan.deceleration, mirrored, "total {}", total);
            assert!(plan
                .acceleration
                .windows(2)
                .all(|pair| pair[0].frequency_hz <= pair[1].frequency_hz));
            assert!(plan.segments().all(|segment| segment.steps > 0));
        }
    }

    #[test]
    fn half_period_matches_frequency() {
        assert_eq!(seg(250, 1).half_period_us(), 2000);
        assert_eq!(seg(2000, 1).half_period_us(), 250);
        assert_eq!(seg(250, 50).duration(), Duration::from_millis(200));
    }

    #[test]
    fn table_validation() {
        assert!(RampTable::new(Vec::new()).is_err());
        assert!(RampTable::new(vec![seg(0, 10)]).is_err());
        assert!(RampTable::new(vec![seg(100, 0)]).is_err());
        assert!(RampTable::new(vec![seg(200, 10), seg(200, 10)]).is_err());
        assert!(RampTable::new(vec![seg(300, 10), seg(200, 10)]).is_err());
        assert!(RampTable::new(vec![seg(100, 10), seg(200, 20)]).is_ok());
    }
}
