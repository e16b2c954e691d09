//! # Synthetic Readings
//!
//! When the sensor cannot be reached (wrong network, timeout, bad response)
//! the display keeps changing anyway: the loop shows values from two local
//! counters that start at zero and grow by a fixed step every time they are
//! used. Walking upward through the thresholds makes every mood appear
//! eventually, which doubles as a cheap end-to-end check of the panel.
//!
//! Readings produced here are marked [`ReadingOrigin::Synthetic`] so the
//! overlay can say so.

use crate::{Reading, ReadingOrigin};

/// Monotonically increasing fallback counters.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticReadings {
    moisture: f64,
    light: f64,
    step: f64,
}

impl SyntheticReadings {
    pub fn new(step: f64) -> Self {
        Self {
            moisture: 0.0,
            light: 0.0,
            step,
        }
    }

    /// Current values without advancing.
    pub fn peek(&self) -> Reading {
        Reading {
            moisture: self.moisture,
            light: self.light,
            origin: ReadingOrigin::Synthetic,
        }
    }

    /// Return the current values, then advance both counters by one step.
    pub fn next_reading(&mut self) -> Reading {
        let reading = self.peek();
        self.moisture += self.step;
        self.light += self.step;
        reading
    }
}
