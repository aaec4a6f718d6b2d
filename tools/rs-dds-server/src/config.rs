// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server configuration.
//!
//! ```toml
//! domain = 0
//! watcher_poll_ms = 500
//! auto_start = true
//!
//! [default_profile]
//! stream = "color"
//! format = "rgb8"
//! width = 1280
//! height = 720
//! fps = 30
//!
//! [[simulated_devices]]
//! name = "Intel RealSense D435"
//! serial = "000000000001"
//! product_line = "D400"
//!
//! [[simulated_devices.sensors]]
//! name = "RGB Camera"
//! kind = "color"
//! profiles = [{ stream = "color", format = "rgb8", fps = 30, width = 1280, height = 720, default = true }]
//! ```

use crate::selector::ProfileSelector;
use realdds::topics::{Format, StreamType};
use realdds::MAX_DOMAIN_ID;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// DDS domain (0-232).
    #[serde(default)]
    pub domain: u32,

    #[serde(default = "default_participant_name")]
    pub participant_name: String,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Hardware polling period of the device watcher (milliseconds).
    #[serde(default = "default_watcher_poll_ms")]
    pub watcher_poll_ms: u64,

    /// Start the default profile as soon as a device is bridged.
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Profile started when `auto_start` is set.
    #[serde(default)]
    pub default_profile: ProfileSelector,

    /// Devices exposed by the simulated hardware backend.
    #[serde(default = "default_simulated_devices")]
    pub simulated_devices: Vec<SimDeviceConfig>,
}

fn default_participant_name() -> String {
    "rs-dds-server".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_watcher_poll_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_simulated_devices() -> Vec<SimDeviceConfig> {
    vec![SimDeviceConfig::d435("000000000001")]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            domain: 0,
            participant_name: default_participant_name(),
            log_level: default_log_level(),
            watcher_poll_ms: default_watcher_poll_ms(),
            auto_start: true,
            default_profile: ProfileSelector::default(),
            simulated_devices: default_simulated_devices(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain > MAX_DOMAIN_ID {
            return Err(ConfigError::Invalid(format!(
                "Invalid domain value {}, enter a value in the range [0, {}]",
                self.domain, MAX_DOMAIN_ID
            )));
        }
        if self.watcher_poll_ms == 0 {
            return Err(ConfigError::Invalid("watcher_poll_ms must be > 0".into()));
        }

        for device in &self.simulated_devices {
            if device.serial.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "Simulated device '{}' has an empty serial",
                    device.name
                )));
            }
            for sensor in &device.sensors {
                for profile in &sensor.profiles {
                    if profile.width.is_some() != profile.height.is_some() {
                        return Err(ConfigError::Invalid(format!(
                            "Profile {:?} of sensor '{}' needs both width and height",
                            profile.stream, sensor.name
                        )));
                    }
                    if profile.fps <= 0 {
                        return Err(ConfigError::Invalid(format!(
                            "Profile {:?} of sensor '{}' has fps {}",
                            profile.stream, sensor.name, profile.fps
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// One simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimDeviceConfig {
    pub name: String,
    pub serial: String,

    #[serde(default)]
    pub product_line: String,

    #[serde(default = "default_true")]
    pub locked: bool,

    #[serde(default)]
    pub sensors: Vec<SimSensorConfig>,
}

/// One sensor of a simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimSensorConfig {
    pub name: String,

    /// "color", "depth", "motion" or anything else (unsupported).
    pub kind: String,

    #[serde(default)]
    pub profiles: Vec<SimProfileConfig>,
}

/// One stream profile of a simulated sensor. Video profiles set width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimProfileConfig {
    pub stream: StreamType,

    #[serde(default)]
    pub index: i32,

    pub format: Format,
    pub fps: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default)]
    pub default: bool,
}

impl SimProfileConfig {
    pub fn video(stream: StreamType, format: Format, width: u32, height: u32, fps: i32) -> Self {
        Self {
            stream,
            index: 0,
            format,
            fps,
            width: Some(width),
            height: Some(height),
            default: false,
        }
    }

    pub fn motion(stream: StreamType, format: Format, fps: i32) -> Self {
        Self {
            stream,
            index: 0,
            format,
            fps,
            width: None,
            height: None,
            default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

impl SimDeviceConfig {
    /// A D435-like device: one depth sensor and one color sensor.
    pub fn d435(serial: &str) -> Self {
        Self {
            name: "Intel RealSense D435".to_string(),
            serial: serial.to_string(),
            product_line: "D400".to_string(),
            locked: true,
            sensors: vec![
                SimSensorConfig {
                    name: "Stereo Module".to_string(),
                    kind: "depth".to_string(),
                    profiles: vec![
                        SimProfileConfig::video(StreamType::Depth, Format::Z16, 848, 480, 30)
                            .as_default(),
                        SimProfileConfig::video(StreamType::Depth, Format::Z16, 640, 480, 15),
                    ],
                },
                SimSensorConfig {
                    name: "RGB Camera".to_string(),
                    kind: "color".to_string(),
                    profiles: vec![
                        SimProfileConfig::video(StreamType::Color, Format::Rgb8, 1280, 720, 30)
                            .as_default(),
                        SimProfileConfig::video(StreamType::Color, Format::Rgb8, 640, 480, 30),
                        SimProfileConfig::video(StreamType::Color, Format::Yuyv, 640, 480, 60),
                    ],
                },
            ],
        }
    }
}
