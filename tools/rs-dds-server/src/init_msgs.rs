// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Initialization messages derived from a hardware device.
//!
//! ```text
//! DEVICE_HEADER { num_of_streams = sum of profiles over all sensors }
//! VIDEO_STREAM_PROFILES  { group = "Stereo Module", ... }   color / depth sensor
//! VIDEO_STREAM_PROFILES  { group = "RGB Camera", ... }
//! MOTION_STREAM_PROFILES { group = "Motion Module", ... }   motion sensor
//! ```
//!
//! Sensors without profiles produce no group message.

use crate::hardware::{Device, ProfileKind, Sensor, SensorKind, StreamProfile};
use crate::{BridgeError, Result};
use realdds::topics::{
    DeviceHeaderMsg, GroupName, ImageHeader, MotionStreamProfile, MotionStreamProfilesMsg,
    Notification, VideoStreamProfile, VideoStreamProfilesMsg,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Unique stream names across every sensor, sorted.
pub fn supported_stream_names(device: &dyn Device) -> Vec<String> {
    device
        .sensors()
        .iter()
        .flat_map(|s| s.stream_profiles())
        .map(|p| p.stream_name)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Header announcing every profile of the device.
pub fn device_header(device: &dyn Device) -> Result<DeviceHeaderMsg> {
    let total: usize = device
        .sensors()
        .iter()
        .map(|s| s.stream_profiles().len())
        .sum();
    let num_of_streams = u32::try_from(total).map_err(|_| {
        BridgeError::Hardware(format!("device {} reports {} profiles", device.id(), total))
    })?;
    Ok(DeviceHeaderMsg { num_of_streams })
}

/// Profile message of one sensor, or `None` when it has no profiles.
///
/// The sensor kind is checked first: an unsupported sensor is an error
/// even when it reports no profiles.
pub fn profile_message(device_name: &str, sensor: &dyn Sensor) -> Result<Option<Notification>> {
    let video = match sensor.kind() {
        SensorKind::Color | SensorKind::Depth => true,
        SensorKind::Motion => false,
        SensorKind::Other(_) => {
            return Err(BridgeError::UnsupportedSensor {
                device: device_name.to_string(),
                sensor: sensor.name(),
            })
        }
    };

    let profiles = sensor.stream_profiles();
    if profiles.is_empty() {
        return Ok(None);
    }

    let group_name = GroupName::new(&sensor.name())?;
    let msg = if video {
        let mut group = VideoStreamProfilesMsg::new(group_name);
        for profile in &profiles {
            group.push(video_profile(profile)?)?;
        }
        Notification::VideoStreamProfiles(group)
    } else {
        let mut group = MotionStreamProfilesMsg::new(group_name);
        for profile in &profiles {
            group.push(motion_profile(profile)?)?;
        }
        Notification::MotionStreamProfiles(group)
    };
    Ok(Some(msg))
}

/// Full initialization sequence: header first, then one message per non-empty sensor.
pub fn init_messages(device: &Arc<dyn Device>) -> Result<Vec<Notification>> {
    let name = device.info().name;
    let mut msgs = vec![Notification::DeviceHeader(device_header(device.as_ref())?)];
    for sensor in device.sensors() {
        if let Some(msg) = profile_message(&name, sensor.as_ref())? {
            msgs.push(msg);
        }
    }
    Ok(msgs)
}

/// Image header published on the stream topic of `profile`.
pub fn image_header(profile: &StreamProfile) -> Result<ImageHeader> {
    match profile.kind {
        ProfileKind::Video { width, height } => Ok(ImageHeader::new(
            profile.format,
            narrow(profile, "width", width)?,
            narrow(profile, "height", height)?,
        )),
        ProfileKind::Motion => Ok(ImageHeader::new(profile.format, 0, 0)),
    }
}

fn narrow<T, U>(profile: &StreamProfile, field: &str, value: T) -> Result<U>
where
    T: Copy + std::fmt::Display,
    U: TryFrom<T>,
{
    U::try_from(value).map_err(|_| BridgeError::IllegalProfile {
        unique_id: profile.unique_id,
        reason: format!("{} {} does not fit the wire format", field, value),
    })
}

fn video_profile(profile: &StreamProfile) -> Result<VideoStreamProfile> {
    let ProfileKind::Video { width, height } = profile.kind else {
        return Err(BridgeError::IllegalProfile {
            unique_id: profile.unique_id,
            reason: "motion profile on a video sensor".into(),
        });
    };
    Ok(VideoStreamProfile {
        stream_index: narrow(profile, "stream index", profile.stream_index)?,
        unique_id: narrow(profile, "unique id", profile.unique_id)?,
        fps: narrow(profile, "fps", profile.fps)?,
        format: profile.format,
        stream_type: profile.stream_type,
        width: narrow(profile, "width", width)?,
        height: narrow(profile, "height", height)?,
        is_default: profile.is_default,
    })
}

fn motion_profile(profile: &StreamProfile) -> Result<MotionStreamProfile> {
    if profile.kind != ProfileKind::Motion {
        return Err(BridgeError::IllegalProfile {
            unique_id: profile.unique_id,
            reason: "video profile on a motion sensor".into(),
        });
    }
    Ok(MotionStreamProfile {
        stream_index: narrow(profile, "stream index", profile.stream_index)?,
        unique_id: narrow(profile, "unique id", profile.unique_id)?,
        fps: narrow(profile, "fps", profile.fps)?,
        format: profile.format,
        stream_type: profile.stream_type,
        is_default: profile.is_default,
    })
}
