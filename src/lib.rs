//! # Plant Mood Core Library
//!
//! This library provides everything the plant-mood poller needs between the
//! sensor on the pot and the e-paper panel on the wall: configuration,
//! mood classification, message selection, text layout and frame rendering.
//! The binary in `main.rs` only wires these pieces to a panel and a runtime.
//!
//! ## Data Flow
//!
//! Every poll cycle follows the same path:
//! 1. **Gate**: read the current WiFi network name and only talk to the sensor
//!    when it starts with the configured prefix
//! 2. **Fetch**: `GET /sensor/moisture` and `GET /sensor/light`, 2 second timeout each
//! 3. **Fallback**: on any fetch failure, use synthetic incrementing values
//! 4. **Classify**: map `(moisture, light)` to one of six [`mood::StateKey`]s
//! 5. **Select**: pick a random configured message for that state
//! 6. **Layout**: shrink-to-fit the message into the configured text box
//! 7. **Render**: compose the 1-bit frame and push it to the panel
//!
//! ## Core Types
//!
//! - [`Reading`]: one `(moisture, light)` pair for one poll cycle
//! - [`ReadingOrigin`]: whether the pair came from the sensor or the counters

use serde::{Deserialize, Serialize};

pub mod config;
pub mod epd;
pub mod fallback;
pub mod fonts;
pub mod frame;
pub mod layout;
pub mod messages;
pub mod mood;
pub mod network;
pub mod panel;
pub mod render_loop;
pub mod renderer;
pub mod sensor;

/// A single `(moisture, light)` value pair for one poll cycle.
///
/// Readings are recomputed every cycle and never persisted. The raw values
/// are whatever the sensor endpoint reports; classification thresholds live
/// in [`mood::Thresholds`].
///
/// # Example
/// ```
/// use plant_mood_lib::{Reading, ReadingOrigin};
///
/// let reading = Reading { moisture: 1.0, light: 2.0, origin: ReadingOrigin::Sensor };
/// assert!(reading.is_live());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Soil moisture as reported by `/sensor/moisture`
    pub moisture: f64,
    /// Ambient light as reported by `/sensor/light`
    pub light: f64,
    /// Where the values came from
    pub origin: ReadingOrigin,
}

/// Source of a [`Reading`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingOrigin {
    /// Both values were fetched from the sensor endpoint
    Sensor,
    /// Values were generated locally because the sensor was unreachable
    Synthetic,
}

impl Reading {
    /// True when the values came from the real sensor.
    pub fn is_live(&self) -> bool {
        self.origin == ReadingOrigin::Sensor
    }
}

impl ReadingOrigin {
    /// Short label used by the diagnostic overlay.
    pub fn label(self) -> &'static str {
        match self {
            ReadingOrigin::Sensor => "sensor",
            ReadingOrigin::Synthetic => "synthetic",
        }
    }
}
