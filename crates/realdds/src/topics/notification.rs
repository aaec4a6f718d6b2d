// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Initialization notifications replayed to every new subscriber.
//!
//! # Frame Layout
//!
//! ```text
//! +--------+---------+------------------+
//! | id u16 | len u32 | payload[len]     |
//! +--------+---------+------------------+
//!
//! DEVICE_HEADER           num_of_streams u32
//! VIDEO_STREAM_PROFILES   group_name[32] count u16 { i8 i16 i16 u8 u8 i16 i16 u8 } * count
//! MOTION_STREAM_PROFILES  group_name[32] count u16 { i8 i16 i16 u8 u8 u8 } * count
//! ```
//!
//! All integers little-endian.

use super::types::{Format, StreamType};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Size of the group-name field, NUL terminator included.
pub const GROUP_NAME_CAPACITY: usize = 32;

/// Maximum number of profiles carried by one group message.
pub const MAX_PROFILES_PER_GROUP: usize = 400;

/// Notification discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MsgType {
    DeviceHeader = 0,
    VideoStreamProfiles = 1,
    MotionStreamProfiles = 2,
}

impl TryFrom<u16> for MsgType {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::DeviceHeader),
            1 => Ok(Self::VideoStreamProfiles),
            2 => Ok(Self::MotionStreamProfiles),
            other => Err(Error::UnknownMessageId(other)),
        }
    }
}

/// Stream-group name bounded by [`GROUP_NAME_CAPACITY`].
///
/// Over-long names are rejected, never truncated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupName(String);

impl GroupName {
    /// Validate a group name.
    pub fn new(name: &str) -> Result<Self> {
        if name.len() >= GROUP_NAME_CAPACITY || name.contains('\0') {
            return Err(Error::GroupNameTooLong {
                name: name.to_string(),
                capacity: GROUP_NAME_CAPACITY - 1,
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut field = [0u8; GROUP_NAME_CAPACITY];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        w.write_all(&field)
    }

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut field = [0u8; GROUP_NAME_CAPACITY];
        r.read_exact(&mut field)?;
        let end = field.iter().position(|&b| b == 0).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "group name is not NUL terminated")
        })?;
        let name = std::str::from_utf8(&field[..end])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Self::new(name)
    }
}

impl std::fmt::Display for GroupName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// First message of every device: how many profiles follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHeaderMsg {
    pub num_of_streams: u32,
}

/// One video stream profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoStreamProfile {
    pub stream_index: i8,
    pub unique_id: i16,
    pub fps: i16,
    pub format: Format,
    pub stream_type: StreamType,
    pub width: i16,
    pub height: i16,
    pub is_default: bool,
}

impl VideoStreamProfile {
    pub const SIZE: usize = 12;

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_i8(self.stream_index)?;
        w.write_i16::<LittleEndian>(self.unique_id)?;
        w.write_i16::<LittleEndian>(self.fps)?;
        w.write_u8(self.format.as_u8())?;
        w.write_u8(self.stream_type.as_u8())?;
        w.write_i16::<LittleEndian>(self.width)?;
        w.write_i16::<LittleEndian>(self.height)?;
        w.write_u8(u8::from(self.is_default))?;
        Ok(())
    }

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            stream_index: r.read_i8()?,
            unique_id: r.read_i16::<LittleEndian>()?,
            fps: r.read_i16::<LittleEndian>()?,
            format: Format::try_from(r.read_u8()?)?,
            stream_type: StreamType::try_from(r.read_u8()?)?,
            width: r.read_i16::<LittleEndian>()?,
            height: r.read_i16::<LittleEndian>()?,
            is_default: r.read_u8()? != 0,
        })
    }
}

/// One motion stream profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionStreamProfile {
    pub stream_index: i8,
    pub unique_id: i16,
    pub fps: i16,
    pub format: Format,
    pub stream_type: StreamType,
    pub is_default: bool,
}

impl MotionStreamProfile {
    pub const SIZE: usize = 8;

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_i8(self.stream_index)?;
        w.write_i16::<LittleEndian>(self.unique_id)?;
        w.write_i16::<LittleEndian>(self.fps)?;
        w.write_u8(self.format.as_u8())?;
        w.write_u8(self.stream_type.as_u8())?;
        w.write_u8(u8::from(self.is_default))?;
        Ok(())
    }

    fn read<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            stream_index: r.read_i8()?,
            unique_id: r.read_i16::<LittleEndian>()?,
            fps: r.read_i16::<LittleEndian>()?,
            format: Format::try_from(r.read_u8()?)?,
            stream_type: StreamType::try_from(r.read_u8()?)?,
            is_default: r.read_u8()? != 0,
        })
    }
}

/// Ordered profiles of one sensor, bounded by [`MAX_PROFILES_PER_GROUP`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileGroup<P> {
    group_name: GroupName,
    profiles: Vec<P>,
}

impl<P> ProfileGroup<P> {
    /// Empty group.
    pub fn new(group_name: GroupName) -> Self {
        Self {
            group_name,
            profiles: Vec::new(),
        }
    }

    /// Append a profile, keeping insertion order.
    pub fn push(&mut self, profile: P) -> Result<()> {
        if self.profiles.len() >= MAX_PROFILES_PER_GROUP {
            return Err(Error::TooManyProfiles {
                count: self.profiles.len() + 1,
                capacity: MAX_PROFILES_PER_GROUP,
            });
        }
        self.profiles.push(profile);
        Ok(())
    }

    pub fn group_name(&self) -> &GroupName {
        &self.group_name
    }

    pub fn profiles(&self) -> &[P] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

pub type VideoStreamProfilesMsg = ProfileGroup<VideoStreamProfile>;
pub type MotionStreamProfilesMsg = ProfileGroup<MotionStreamProfile>;

/// A decoded initialization notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    DeviceHeader(DeviceHeaderMsg),
    VideoStreamProfiles(VideoStreamProfilesMsg),
    MotionStreamProfiles(MotionStreamProfilesMsg),
}

impl Notification {
    /// Type name registered on the notification topic.
    pub const TYPE_NAME: &'static str = "realdds::notification";

    /// Frame header size (id + len).
    pub const HEADER_SIZE: usize = 6;

    pub fn msg_type(&self) -> MsgType {
        match self {
            Self::DeviceHeader(_) => MsgType::DeviceHeader,
            Self::VideoStreamProfiles(_) => MsgType::VideoStreamProfiles,
            Self::MotionStreamProfiles(_) => MsgType::MotionStreamProfiles,
        }
    }

    /// Number of profiles announced (device header) or carried (groups).
    pub fn profile_count(&self) -> usize {
        match self {
            Self::DeviceHeader(h) => h.num_of_streams as usize,
            Self::VideoStreamProfiles(g) => g.len(),
            Self::MotionStreamProfiles(g) => g.len(),
        }
    }

    /// Serialize into a framed message.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        match self {
            Self::DeviceHeader(h) => {
                payload.write_u32::<LittleEndian>(h.num_of_streams)?;
            }
            Self::VideoStreamProfiles(g) => {
                g.group_name.write(&mut payload)?;
                payload.write_u16::<LittleEndian>(g.len() as u16)?;
                for p in &g.profiles {
                    p.write(&mut payload)?;
                }
            }
            Self::MotionStreamProfiles(g) => {
                g.group_name.write(&mut payload)?;
                payload.write_u16::<LittleEndian>(g.len() as u16)?;
                for p in &g.profiles {
                    p.write(&mut payload)?;
                }
            }
        }

        let mut frame = Vec::with_capacity(Self::HEADER_SIZE + payload.len());
        frame.write_u16::<LittleEndian>(self.msg_type() as u16)?;
        frame.write_u32::<LittleEndian>(payload.len() as u32)?;
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Parse a framed message.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let mut r = frame;
        let msg_type = MsgType::try_from(r.read_u16::<LittleEndian>()?)?;
        let len = r.read_u32::<LittleEndian>()? as usize;
        if r.len() != len {
            return Err(Error::Decode(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("payload length {} does not match header ({})", r.len(), len),
            )));
        }

        let msg = match msg_type {
            MsgType::DeviceHeader => Self::DeviceHeader(DeviceHeaderMsg {
                num_of_streams: r.read_u32::<LittleEndian>()?,
            }),
            MsgType::VideoStreamProfiles => {
                let mut group = ProfileGroup::new(GroupName::read(&mut r)?);
                let count = r.read_u16::<LittleEndian>()?;
                for _ in 0..count {
                    group.push(VideoStreamProfile::read(&mut r)?)?;
                }
                Self::VideoStreamProfiles(group)
            }
            MsgType::MotionStreamProfiles => {
                let mut group = ProfileGroup::new(GroupName::read(&mut r)?);
                let count = r.read_u16::<LittleEndian>()?;
                for _ in 0..count {
                    group.push(MotionStreamProfile::read(&mut r)?)?;
                }
                Self::MotionStreamProfiles(group)
            }
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_profile(uid: i16, is_default: bool) -> VideoStreamProfile {
        VideoStreamProfile {
            stream_index: 0,
            unique_id: uid,
            fps: 30,
            format: Format::Rgb8,
            stream_type: StreamType::Color,
            width: 1280,
            height: 720,
            is_default,
        }
    }

    #[test]
    fn test_group_name_bounds() {
        let name = "a".repeat(GROUP_NAME_CAPACITY - 1);
        assert!(GroupName::new(&name).is_ok());

        let name = "a".repeat(GROUP_NAME_CAPACITY);
        assert!(matches!(
            GroupName::new(&name),
            Err(Error::GroupNameTooLong { capacity: 31, .. })
        ));
    }

    #[test]
    fn test_device_header_layout() {
        let frame = Notification::DeviceHeader(DeviceHeaderMsg { num_of_streams: 3 })
            .encode()
            .expect("encode");
        assert_eq!(frame, vec![0, 0, 4, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_video_group_enumerates_in_order() {
        let mut group = VideoStreamProfilesMsg::new(GroupName::new("RGB Camera").expect("name"));
        let inputs: Vec<_> = (0..5).map(|uid| color_profile(uid, uid == 2)).collect();
        for p in &inputs {
            group.push(*p).expect("push");
        }

        let frame = Notification::VideoStreamProfiles(group).encode().expect("encode");
        assert_eq!(
            frame.len(),
            Notification::HEADER_SIZE + GROUP_NAME_CAPACITY + 2 + 5 * VideoStreamProfile::SIZE
        );

        match Notification::decode(&frame).expect("decode") {
            Notification::VideoStreamProfiles(g) => {
                assert_eq!(g.group_name().as_str(), "RGB Camera");
                assert_eq!(g.profiles(), inputs.as_slice());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_motion_group_layout() {
        let mut group = MotionStreamProfilesMsg::new(GroupName::new("Motion Module").expect("name"));
        group
            .push(MotionStreamProfile {
                stream_index: 0,
                unique_id: 7,
                fps: 200,
                format: Format::MotionXyz32f,
                stream_type: StreamType::Gyro,
                is_default: true,
            })
            .expect("push");
        let frame = Notification::MotionStreamProfiles(group.clone())
            .encode()
            .expect("encode");
        assert_eq!(u16::from_le_bytes([frame[0], frame[1]]), 2);
        assert_eq!(
            Notification::decode(&frame).expect("decode"),
            Notification::MotionStreamProfiles(group)
        );
    }

    #[test]
    fn test_profile_capacity() {
        let mut group = VideoStreamProfilesMsg::new(GroupName::new("g").expect("name"));
        for uid in 0..MAX_PROFILES_PER_GROUP {
            group.push(color_profile(uid as i16, false)).expect("push");
        }
        assert!(matches!(
            group.push(color_profile(0, false)),
            Err(Error::TooManyProfiles { count: 401, capacity: 400 })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Notification::decode(&[9, 0, 0, 0, 0, 0]),
            Err(Error::UnknownMessageId(9))
        ));
        assert!(matches!(Notification::decode(&[0, 0, 4]), Err(Error::Decode(_))));
        assert!(matches!(
            Notification::decode(&[0, 0, 8, 0, 0, 0, 1, 0, 0, 0]),
            Err(Error::Decode(_))
        ));
    }
}
