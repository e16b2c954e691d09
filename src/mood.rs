//! # Plant Mood Classification
//!
//! Maps a raw `(moisture, light)` pair onto one of six discrete states by
//! two independent threshold comparisons. The result depends on nothing but
//! the two values and the threshold set.
//!
//! | moisture                          | bin      |
//! |-----------------------------------|----------|
//! | `x < moisture_low`                | `dry`    |
//! | `moisture_low <= x < moisture_high` | `normal` |
//! | `x >= moisture_high`              | `wet`    |
//!
//! Light is `dark` below `light_bright` and `bright` otherwise. The state key
//! joins both bins: `dry_dark`, `normal_bright`, ...

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Thresholds used by [`classify`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Below this the soil counts as dry
    pub moisture_low: f64,
    /// At or above this the soil counts as wet
    pub moisture_high: f64,
    /// At or above this the plant counts as sitting in bright light
    pub light_bright: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            moisture_low: 1.2,
            moisture_high: 2.5,
            light_bright: 1.5,
        }
    }
}

/// Moisture bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Moisture {
    Dry,
    Normal,
    Wet,
}

/// Light bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Light {
    Dark,
    Bright,
}

/// Discrete plant state, one per moisture/light bin combination.
///
/// Serialized as `"{moisture}_{light}"`, e.g. `"dry_dark"`, which is also the
/// key used in the configuration's `messages` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    DryDark,
    DryBright,
    NormalDark,
    NormalBright,
    WetDark,
    WetBright,
}

impl StateKey {
    /// Every state, in table order.
    pub const ALL: [StateKey; 6] = [
        StateKey::DryDark,
        StateKey::DryBright,
        StateKey::NormalDark,
        StateKey::NormalBright,
        StateKey::WetDark,
        StateKey::WetBright,
    ];

    pub fn from_bins(moisture: Moisture, light: Light) -> Self {
        match (moisture, light) {
            (Moisture::Dry, Light::Dark) => StateKey::DryDark,
            (Moisture::Dry, Light::Bright) => StateKey::DryBright,
            (Moisture::Normal, Light::Dark) => StateKey::NormalDark,
            (Moisture::Normal, Light::Bright) => StateKey::NormalBright,
            (Moisture::Wet, Light::Dark) => StateKey::WetDark,
            (Moisture::Wet, Light::Bright) => StateKey::WetBright,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::DryDark => "dry_dark",
            StateKey::DryBright => "dry_bright",
            StateKey::NormalDark => "normal_dark",
            StateKey::NormalBright => "normal_bright",
            StateKey::WetDark => "wet_dark",
            StateKey::WetBright => "wet_bright",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the six state keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown state key: {0}")]
pub struct UnknownStateKey(pub String);

impl FromStr for StateKey {
    type Err = UnknownStateKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownStateKey(s.to_string()))
    }
}

/// Bin a moisture value. `low <= x < high` is normal.
pub fn moisture_bin(moisture: f64, thresholds: &Thresholds) -> Moisture {
    if moisture < thresholds.moisture_low {
        Moisture::Dry
    } else if moisture < thresholds.moisture_high {
        Moisture::Normal
    } else {
        Moisture::Wet
    }
}

/// Bin a light value.
pub fn light_bin(light: f64, thresholds: &Thresholds) -> Light {
    if light < thresholds.light_bright {
        Light::Dark
    } else {
        Light::Bright
    }
}

/// Classify a reading into a [`StateKey`].
///
/// # Example
/// ```
/// use plant_mood_lib::mood::{classify, StateKey, Thresholds};
///
/// let t = Thresholds { moisture_low: 1.2, moisture_high: 2.5, light_bright: 1.5 };
/// assert_eq!(classify(1.0, 1.0, &t), StateKey::DryDark);
/// assert_eq!(classify(2.0, 2.0, &t), StateKey::NormalBright);
/// ```
pub fn classify(moisture: f64, light: f64, thresholds: &Thresholds) -> StateKey {
    StateKey::from_bins(
        moisture_bin(moisture, thresholds),
        light_bin(light, thresholds),
    )
}
