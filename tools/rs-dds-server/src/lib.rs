// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RealSense DDS Server
//!
//! Bridges locally attached RealSense-class cameras onto DDS: every device is
//! announced on the discovery topic, described by initialization messages
//! and streamed under its own topic root.
//!
//! # Features
//!
//! - **Hot-plug**: devices are bridged on attach and retracted on detach
//! - **Default stream**: a configurable profile starts as soon as a device is bridged
//! - **Subscriber requests**: remote devices open and close streams over the control topic
//! - **Simulated hardware**: config-described devices for running without a camera
//!
//! # Quick Start
//!
//! ```bash
//! # Bridge on domain 0
//! rs-dds-server
//!
//! # Domain 42, verbose
//! rs-dds-server -d 42 --debug
//!
//! # Using config file
//! rs-dds-server --config rs-dds-server.toml
//! ```

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod init_msgs;
pub mod registry;
pub mod selector;
pub mod sim;
pub mod watcher;

pub use bridge::{Bridge, StreamReport};
pub use config::{ConfigError, ServerConfig, SimDeviceConfig, SimProfileConfig, SimSensorConfig};
pub use controller::DeviceController;
pub use error::{BridgeError, Result};
pub use hardware::{
    CameraInfo, Context, Device, DeviceId, Frame, FrameCallback, ProfileKind, Sensor, SensorKind,
    StreamProfile,
};
pub use registry::{DeviceHandler, DeviceHandlerRegistry};
pub use selector::ProfileSelector;
pub use sim::{SimContext, SimDevice, SimSensor};
pub use watcher::{DeviceEvent, DeviceWatcher};
