// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device identity broadcast on the discovery topic.

use crate::Result;
use serde::{Deserialize, Serialize};

/// Vendor prefix removed from model names when building a topic root.
pub const DEVICE_NAME_PREFIX: &str = "Intel RealSense ";

/// Root of every device namespace.
pub const TOPIC_ROOT_PREFIX: &str = "realsense";

/// Derive the namespace of a device from its model name and serial.
///
/// The vendor prefix is stripped only on an exact, case-sensitive match at
/// offset 0 that leaves a non-empty model name.
///
/// ```rust
/// use realdds::topics::device_info::resolve_topic_root;
///
/// assert_eq!(resolve_topic_root("Intel RealSense D435", "11223344"), "realsense/D435/11223344");
/// assert_eq!(resolve_topic_root("Generic Cam", "99"), "realsense/Generic Cam/99");
/// ```
pub fn resolve_topic_root(model_name: &str, serial: &str) -> String {
    let model = match model_name.strip_prefix(DEVICE_NAME_PREFIX) {
        Some(rest) if !rest.is_empty() => rest,
        _ => model_name,
    };
    format!("{}/{}/{}", TOPIC_ROOT_PREFIX, model, serial)
}

/// Immutable snapshot of a device's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub serial: String,
    #[serde(rename = "product-line")]
    pub product_line: String,
    pub locked: bool,
    #[serde(rename = "topic-root")]
    pub topic_root: String,
}

impl DeviceInfo {
    /// Type name registered on the discovery topic.
    pub const TYPE_NAME: &'static str = "realdds::device_info";

    /// Build the info, deriving the topic root.
    pub fn new(name: &str, serial: &str, product_line: &str, locked: bool) -> Self {
        Self {
            name: name.to_string(),
            serial: serial.to_string(),
            product_line: product_line.to_string(),
            locked,
            topic_root: resolve_topic_root(name, serial),
        }
    }

    /// JSON payload published on the discovery topic.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a discovery payload.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_strips_vendor_prefix() {
        assert_eq!(
            resolve_topic_root("Intel RealSense D435", "11223344"),
            "realsense/D435/11223344"
        );
    }

    #[test]
    fn test_resolve_passthrough() {
        assert_eq!(resolve_topic_root("Generic Cam", "99"), "realsense/Generic Cam/99");
        // Case-sensitive, offset 0 only
        assert_eq!(
            resolve_topic_root("intel realsense D415", "1"),
            "realsense/intel realsense D415/1"
        );
        assert_eq!(
            resolve_topic_root("My Intel RealSense D415", "1"),
            "realsense/My Intel RealSense D415/1"
        );
        // Bare prefix is kept as-is
        assert_eq!(
            resolve_topic_root("Intel RealSense ", "1"),
            "realsense/Intel RealSense /1"
        );
    }

    #[test]
    fn test_resolve_degenerate_inputs() {
        assert_eq!(resolve_topic_root("", ""), "realsense//");
    }

    #[test]
    fn test_json_keys() {
        let info = DeviceInfo::new("Intel RealSense D455", "123", "D400", true);
        let json = String::from_utf8(info.to_json().expect("json")).expect("utf8");
        assert!(json.contains("\"product-line\":\"D400\""));
        assert!(json.contains("\"topic-root\":\"realsense/D455/123\""));
        assert_eq!(DeviceInfo::from_json(json.as_bytes()).expect("parse"), info);
    }
}
