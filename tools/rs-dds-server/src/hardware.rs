// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hardware collaborator contract.
//!
//! The bridge only consumes these traits; enumeration and streaming belong
//! to the backend (a camera SDK binding, or [`crate::sim`]).
//!
//! ```text
//! Context
//! +-- Device          (stable DeviceId while attached)
//!     +-- Sensor      (kind, stream profiles, start / stop)
//!         +-- StreamProfile
//! ```

use crate::Result;
use realdds::topics::{Format, StreamType};
use std::fmt;
use std::sync::Arc;

/// Opaque handle of an attached device, stable until it detaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity metadata reported by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub name: String,
    pub serial: String,
    pub product_line: String,
    pub locked: bool,
}

/// Sensor category, which decides the profile message it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorKind {
    Color,
    Depth,
    Motion,
    Other(String),
}

impl SensorKind {
    /// Parse a config label; anything unknown is kept as [`SensorKind::Other`].
    pub fn from_label(label: &str) -> Self {
        match label {
            "color" => Self::Color,
            "depth" => Self::Depth,
            "motion" => Self::Motion,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Color | Self::Depth)
    }
}

/// Video profiles carry a resolution, motion profiles do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Video { width: u32, height: u32 },
    Motion,
}

/// A stream profile as reported by the hardware.
///
/// Fields are wider than their wire counterparts; narrowing is checked when
/// profiles are converted to messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProfile {
    pub stream_name: String,
    pub stream_index: i32,
    pub unique_id: i32,
    pub fps: i32,
    pub format: Format,
    pub stream_type: StreamType,
    pub kind: ProfileKind,
    pub is_default: bool,
}

/// One captured frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub stream_name: String,
    pub unique_id: i32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Frame sink invoked from a hardware thread.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

pub trait Sensor: Send + Sync {
    fn name(&self) -> String;

    fn kind(&self) -> SensorKind;

    fn stream_profiles(&self) -> Vec<StreamProfile>;

    /// Start streaming `profiles`, delivering every frame to `callback`.
    fn start(&self, profiles: &[StreamProfile], callback: FrameCallback) -> Result<()>;

    /// Stop streaming. Returns once no callback is running anymore.
    fn stop(&self) -> Result<()>;
}

pub trait Device: Send + Sync {
    fn id(&self) -> DeviceId;

    fn info(&self) -> CameraInfo;

    fn sensors(&self) -> Vec<Arc<dyn Sensor>>;
}

pub trait Context: Send + Sync {
    /// Devices currently attached.
    fn query_devices(&self) -> Vec<Arc<dyn Device>>;
}

/// Stream name derived the way librealsense does: type name, plus index when non-zero.
pub fn stream_name(stream_type: StreamType, index: i32) -> String {
    let base = match stream_type {
        StreamType::Any => "Any",
        StreamType::Depth => "Depth",
        StreamType::Color => "Color",
        StreamType::Infrared => "Infrared",
        StreamType::Fisheye => "Fisheye",
        StreamType::Gyro => "Gyro",
        StreamType::Accel => "Accel",
        StreamType::Gpio => "GPIO",
        StreamType::Pose => "Pose",
        StreamType::Confidence => "Confidence",
    };
    if index == 0 {
        base.to_string()
    } else {
        format!("{} {}", base, index)
    }
}
