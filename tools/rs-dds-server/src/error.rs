// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge errors.

use crate::config::ConfigError;
use crate::hardware::DeviceId;
use thiserror::Error;

/// Errors raised while bridging devices.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("DDS error: {0}")]
    Dds(#[from] realdds::Error),

    /// Sensor that is neither video (color / depth) nor motion.
    #[error("Sensor '{sensor}' of '{device}' is not supported (only video & motion sensors are)")]
    UnsupportedSensor { device: String, sensor: String },

    /// Profile of the wrong kind for its sensor, or not representable on the wire.
    #[error("Illegal profile uid {unique_id}: {reason}")]
    IllegalProfile { unique_id: i32, reason: String },

    #[error("Could not find required profile: {0}")]
    ProfileNotFound(String),

    #[error("Unknown device {0}")]
    UnknownDevice(DeviceId),

    #[error("Device {0} is already bridged")]
    DeviceAlreadyAttached(DeviceId),

    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Errors the control loop cannot recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Dds(realdds::Error::TopicRootCollision(_)))
    }
}

/// Convenient alias for bridge results.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_collision_is_fatal() {
        let collision = BridgeError::from(realdds::Error::TopicRootCollision("realsense/X/1".into()));
        assert!(collision.is_fatal());
        assert!(!BridgeError::ProfileNotFound("color".into()).is_fatal());
        assert!(!BridgeError::from(realdds::Error::StreamNotStarted("Color".into())).is_fatal());
    }
}
