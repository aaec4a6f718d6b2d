// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic names and message types.
//!
//! ```text
//! realsense/device-info                    DeviceInfo (JSON)
//! <topic_root>/notification                Notification
//! <topic_root>/control                     ControlMsg
//! <topic_root>/<stream_name>               ImageMsg
//! ```

pub mod control;
pub mod device_info;
pub mod image;
pub mod notification;
pub mod types;

pub use control::ControlMsg;
pub use device_info::{resolve_topic_root, DeviceInfo};
pub use image::{ImageHeader, ImageMsg};
pub use notification::{
    DeviceHeaderMsg, GroupName, MotionStreamProfile, MotionStreamProfilesMsg, MsgType,
    Notification, ProfileGroup, VideoStreamProfile, VideoStreamProfilesMsg,
};
pub use types::{Format, StreamType};

/// Well-known discovery topic.
pub const DEVICE_INFO_TOPIC_NAME: &str = "realsense/device-info";

pub fn notification_topic(topic_root: &str) -> String {
    format!("{}/notification", topic_root)
}

pub fn control_topic(topic_root: &str) -> String {
    format!("{}/control", topic_root)
}

pub fn stream_topic(topic_root: &str, stream_name: &str) -> String {
    format!("{}/{}", topic_root, stream_name)
}
