//! # Configuration Management
//!
//! This module loads the JSON configuration file once at startup. It covers
//! the sensor address, the WiFi gate, poll timing, the text box on the panel,
//! the mood thresholds, the message table and the panel's wiring.
//!
//! Message entries may be written either as bare strings or as
//! `{"text": ..., "font_id": ...}` objects. Both forms are normalized into
//! [`Message`] here, so nothing downstream ever sees the difference.

use crate::fonts;
use crate::mood::{StateKey, Thresholds};
use log::{info, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "plant-mood.json";

/// Errors raised while loading configuration. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read (usually: it does not exist)
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or has wrongly typed keys
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The file parsed but describes an unusable setup
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A message ready for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub font_id: u32,
}

/// A message entry as written in the configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MessageEntry {
    /// `"Water me!"`, uses the default font
    PlainText(String),
    /// `{"text": "Water me!", "font_id": 2}`
    Styled {
        text: String,
        #[serde(default)]
        font_id: Option<u32>,
    },
}

impl MessageEntry {
    /// Normalize into a [`Message`], resolving the font id against `fonts`.
    ///
    /// Unknown font ids fall back to `default_font_id`.
    pub fn normalize(self, default_font_id: u32, fonts: &BTreeMap<u32, PathBuf>) -> Message {
        match self {
            MessageEntry::PlainText(text) => Message {
                text,
                font_id: default_font_id,
            },
            MessageEntry::Styled { text, font_id } => {
                let font_id = match font_id {
                    Some(id) if fonts.contains_key(&id) => id,
                    Some(id) => {
                        warn!("Unknown font_id {} for message {:?}, using default", id, text);
                        default_font_id
                    }
                    None => default_font_id,
                };
                Message { text, font_id }
            }
        }
    }
}

/// GPIO and SPI wiring for the e-paper panel
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Kernel SPI device node
    pub spi_device: String,
    /// GPIO character device
    pub gpio_chip: String,
    /// Data/command select line
    pub dc_pin: u32,
    /// Reset line
    pub rst_pin: u32,
    /// Busy line (input)
    pub busy_pin: u32,
    /// Chip select driven from GPIO; `None` lets the kernel drive CE0
    pub cs_pin: Option<u32>,
    /// Panel width in pixels
    pub width: u32,
    /// Panel height in pixels
    pub height: u32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        HardwareConfig {
            spi_device: "/dev/spidev0.0".to_string(),
            gpio_chip: "/dev/gpiochip0".to_string(),
            dc_pin: 25,
            rst_pin: 17,
            busy_pin: 24,
            cs_pin: None,
            width: 1360, // Waveshare 10.85"
            height: 480,
        }
    }
}

/// The file as written on disk, before normalization.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    sensor_ip: String,
    target_ssid_prefix: String,
    update_interval: u64,
    display_x_offset: i32,
    display_y_offset: i32,
    display_width: Option<u32>,
    display_height: Option<u32>,
    show_log_messages: bool,
    thresholds: Thresholds,
    default_font_id: u32,
    messages: HashMap<String, Vec<MessageEntry>>,
    grid_preview: bool,
    grid_preview_secs: u64,
    synthetic_step: f64,
    fonts: BTreeMap<u32, PathBuf>,
    hardware: HardwareConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        let config = Config::default();
        RawConfig {
            sensor_ip: config.sensor_ip,
            target_ssid_prefix: config.target_ssid_prefix,
            update_interval: config.update_interval,
            display_x_offset: config.display_x_offset,
            display_y_offset: config.display_y_offset,
            display_width: config.display_width,
            display_height: config.display_height,
            show_log_messages: config.show_log_messages,
            thresholds: config.thresholds,
            default_font_id: config.default_font_id,
            messages: HashMap::new(),
            grid_preview: config.grid_preview,
            grid_preview_secs: config.grid_preview_secs,
            synthetic_step: config.synthetic_step,
            fonts: BTreeMap::new(),
            hardware: config.hardware,
        }
    }
}

/// Application configuration, immutable after loading
#[derive(Clone, Debug)]
pub struct Config {
    /// Sensor host, e.g. "192.168.4.1"
    pub sensor_ip: String,
    /// Only poll the sensor when the WiFi network name starts with this
    pub target_ssid_prefix: String,
    /// Seconds between poll cycles
    pub update_interval: u64,
    /// Text box origin on the panel
    pub display_x_offset: i32,
    pub display_y_offset: i32,
    /// Text box size; `None` extends the box to the panel edge
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    /// Draw raw values and network name in the top-left corner
    pub show_log_messages: bool,
    pub thresholds: Thresholds,
    pub default_font_id: u32,
    /// Normalized message table
    pub messages: HashMap<StateKey, Vec<Message>>,
    /// Show the calibration grid once at startup
    pub grid_preview: bool,
    pub grid_preview_secs: u64,
    /// Increment applied to the synthetic counters after each use
    pub synthetic_step: f64,
    /// Font id to font file, static table merged with the file's `fonts`
    pub fonts: BTreeMap<u32, PathBuf>,
    pub hardware: HardwareConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sensor_ip: "192.168.4.1".to_string(),
            target_ssid_prefix: "PlantPot".to_string(),
            update_interval: 60,
            display_x_offset: 0,
            display_y_offset: 0,
            display_width: None,
            display_height: None,
            show_log_messages: true,
            thresholds: Thresholds::default(),
            default_font_id: fonts::DEFAULT_FONT_ID,
            messages: HashMap::new(),
            grid_preview: true,
            grid_preview_secs: 3,
            synthetic_step: 0.1,
            fonts: fonts::default_font_table(),
            hardware: HardwareConfig::default(),
        }
    }
}

/// Rectangle on the panel that holds the mood message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Config {
    /// Load configuration from the given JSON file.
    ///
    /// A missing or malformed file is an error; there is no silent default.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&contents)?;
        info!(
            "Loaded configuration: sensor {} every {}s ({} states with messages)",
            config.sensor_ip,
            config.update_interval,
            config.messages.len()
        );
        Ok(config)
    }

    /// Parse and normalize configuration from a JSON string.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(contents)?;
        Self::try_from(raw)
    }

    /// Resolve the text box against the panel size.
    pub fn text_box(&self, panel_width: u32, panel_height: u32) -> TextBox {
        let x = self.display_x_offset.max(0);
        let y = self.display_y_offset.max(0);
        let room_w = panel_width.saturating_sub(x as u32);
        let room_h = panel_height.saturating_sub(y as u32);
        TextBox {
            x,
            y,
            width: self.display_width.unwrap_or(room_w).min(room_w),
            height: self.display_height.unwrap_or(room_h).min(room_h),
        }
    }

    /// Base URL of the sensor endpoint.
    pub fn sensor_base_url(&self) -> String {
        format!("http://{}", self.sensor_ip)
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        if raw.update_interval == 0 {
            return Err(ConfigError::Invalid(
                "update_interval must be at least 1 second".to_string(),
            ));
        }
        let t = &raw.thresholds;
        if t.moisture_low > t.moisture_high {
            return Err(ConfigError::Invalid(format!(
                "thresholds.moisture_low ({}) is above moisture_high ({})",
                t.moisture_low, t.moisture_high
            )));
        }
        if raw.sensor_ip.trim().is_empty() {
            return Err(ConfigError::Invalid("sensor_ip is empty".to_string()));
        }
        if !(raw.synthetic_step.is_finite() && raw.synthetic_step > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "synthetic_step must be a positive number, got {}",
                raw.synthetic_step
            )));
        }
        if raw.hardware.width == 0 || raw.hardware.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "hardware panel size {}x{} has a zero dimension",
                raw.hardware.width, raw.hardware.height
            )));
        }

        let mut font_table = fonts::default_font_table();
        font_table.extend(raw.fonts);
        if !font_table.contains_key(&raw.default_font_id) {
            return Err(ConfigError::Invalid(format!(
                "default_font_id {} is not in the font table",
                raw.default_font_id
            )));
        }

        let mut messages = HashMap::new();
        for (key, entries) in raw.messages {
            let state: StateKey = match key.parse() {
                Ok(state) => state,
                Err(e) => {
                    warn!("Ignoring messages: {}", e);
                    continue;
                }
            };
            let normalized: Vec<Message> = entries
                .into_iter()
                .map(|entry| entry.normalize(raw.default_font_id, &font_table))
                .collect();
            messages.insert(state, normalized);
        }

        Ok(Config {
            sensor_ip: raw.sensor_ip,
            target_ssid_prefix: raw.target_ssid_prefix,
            update_interval: raw.update_interval,
            display_x_offset: raw.display_x_offset,
            display_y_offset: raw.display_y_offset,
            display_width: raw.display_width,
            display_height: raw.display_height,
            show_log_messages: raw.show_log_messages,
            thresholds: raw.thresholds,
            default_font_id: raw.default_font_id,
            messages,
            grid_preview: raw.grid_preview,
            grid_preview_secs: raw.grid_preview_secs,
            synthetic_step: raw.synthetic_step,
            fonts: font_table,
            hardware: raw.hardware,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "sensor_ip": "10.0.0.7",
        "target_ssid_prefix": "Greenhouse",
        "update_interval": 30,
        "display_x_offset": 20,
        "display_y_offset": 40,
        "display_width": 600,
        "display_height": 200,
        "show_log_messages": false,
        "thresholds": {"moisture_low": 1.0, "moisture_high": 3.0, "light_bright": 2.0},
        "default_font_id": 1,
        "messages": {
            "dry_dark": ["Water, please", {"text": "So thirsty", "font_id": 3}],
            "wet_bright": [{"text": "Too much!"}],
            "soggy": ["ignored"]
        }
    }"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.update_interval, 60);
        assert_eq!(config.thresholds, Thresholds::default());
        assert!(config.fonts.contains_key(&config.default_font_id));
        assert!(config.messages.is_empty());
    }

    #[test]
    fn test_parse_sample() {
        let config = Config::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.sensor_ip, "10.0.0.7");
        assert_eq!(config.target_ssid_prefix, "Greenhouse");
        assert_eq!(config.update_interval, 30);
        assert!(!config.show_log_messages);
        assert_eq!(config.thresholds.moisture_high, 3.0);
        assert_eq!(config.sensor_base_url(), "http://10.0.0.7");
    }

    #[test]
    fn test_message_forms_normalize_to_same_shape() {
        let config = Config::from_json_str(SAMPLE).unwrap();
        let dry = &config.messages[&StateKey::DryDark];
        assert_eq!(
            dry[0],
            Message {
                text: "Water, please".to_string(),
                font_id: 1
            }
        );
        assert_eq!(dry[1].font_id, 3);
        let wet = &config.messages[&StateKey::WetBright];
        assert_eq!(wet[0].font_id, config.default_font_id);
        // "soggy" is not a state key
        assert_eq!(config.messages.len(), 2);
    }

    #[test]
    fn test_unknown_font_id_falls_back_to_default() {
        let json = r#"{"messages": {"normal_dark": [{"text": "hm", "font_id": 999}]}}"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(
            config.messages[&StateKey::NormalDark][0].font_id,
            config.default_font_id
        );
    }

    #[test]
    fn test_custom_fonts_extend_table() {
        let json = r#"{"fonts": {"42": "/opt/fonts/Leafy.ttf"},
                       "messages": {"dry_bright": [{"text": "sun!", "font_id": 42}]}}"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.fonts[&42], PathBuf::from("/opt/fonts/Leafy.ttf"));
        assert_eq!(config.messages[&StateKey::DryBright][0].font_id, 42);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.sensor_ip, Config::default().sensor_ip);
        assert_eq!(config.thresholds, Thresholds::default());
        let partial = Config::from_json_str(r#"{"thresholds": {"light_bright": 9.0}}"#).unwrap();
        assert_eq!(partial.thresholds.light_bright, 9.0);
        assert_eq!(partial.thresholds.moisture_low, 1.2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_json_str(r#"{"update_interval": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json_str(
                r#"{"thresholds": {"moisture_low": 5.0, "moisture_high": 1.0}}"#
            ),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json_str(r#"{"default_font_id": 77}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let err = Config::load("/nonexistent/plant-mood.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.update_interval, 30);
    }

    #[test]
    fn test_text_box_resolution() {
        let config = Config::from_json_str(SAMPLE).unwrap();
        let tb = config.text_box(1360, 480);
        assert_eq!(
            tb,
            TextBox {
                x: 20,
                y: 40,
                width: 600,
                height: 200
            }
        );

        // Unset size fills the rest of the panel; oversize is clamped
        let config = Config::from_json_str(r#"{"display_x_offset": 60, "display_height": 9000}"#)
            .unwrap();
        let tb = config.text_box(400, 300);
        assert_eq!(tb.width, 340);
        assert_eq!(tb.height, 300);
    }

    #[test]
    fn test_shipped_example_config() {
        let config = Config::from_json_str(include_str!("../plant-mood.example.json")).unwrap();
        assert_eq!(config.messages.len(), 6);
        assert_eq!(config.messages[&StateKey::DryBright][1].font_id, 3);
        assert_eq!(config.hardware.width, 1360);
    }

    #[test]
    fn test_rejects_bad_synthetic_step() {
        for step in ["0", "-0.1"] {
            let json = format!(r#"{{"synthetic_step": {step}}}"#);
            assert!(
                matches!(Config::from_json_str(&json), Err(ConfigError::Invalid(_))),
                "step {step}"
            );
        }
        assert!(Config::from_json_str(r#"{"synthetic_step": 0.5}"#).is_ok());
    }

    #[test]
    fn test_rejects_zero_panel_size() {
        for hw in [r#"{"width": 0}"#, r#"{"height": 0}"#] {
            let json = format!(r#"{{"hardware": {hw}}}"#);
            assert!(
                matches!(Config::from_json_str(&json), Err(ConfigError::Invalid(_))),
                "hardware {hw}"
            );
        }
    }
}
