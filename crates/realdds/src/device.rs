// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote device as seen by a subscriber.
//!
//! [`DdsDevice::run`] waits for the initialization sequence of a discovered
//! device and rebuilds its stream groups from it.

use crate::device_server::control_qos;
use crate::notification_server::notification_qos;
use crate::participant::Participant;
use crate::topics::{
    control_topic, notification_topic, ControlMsg, DeviceInfo, MotionStreamProfile, Notification,
    VideoStreamProfile,
};
use crate::transport::{RawReader, RawWriter, SampleKind};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RUN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One stream group (one sensor) of a remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsStream {
    group_name: String,
    video_profiles: Vec<VideoStreamProfile>,
    motion_profiles: Vec<MotionStreamProfile>,
}

impl DdsStream {
    pub fn new(group_name: &str) -> Self {
        Self {
            group_name: group_name.to_string(),
            video_profiles: Vec::new(),
            motion_profiles: Vec::new(),
        }
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn add_video_profile(&mut self, mut profile: VideoStreamProfile, is_default: bool) {
        profile.is_default = is_default;
        self.video_profiles.push(profile);
    }

    pub fn add_motion_profile(&mut self, mut profile: MotionStreamProfile, is_default: bool) {
        profile.is_default = is_default;
        self.motion_profiles.push(profile);
    }

    /// Video profiles in insertion order.
    pub fn foreach_video_profile<F: FnMut(&VideoStreamProfile, bool)>(&self, mut f: F) {
        for p in &self.video_profiles {
            f(p, p.is_default);
        }
    }

    /// Motion profiles in insertion order.
    pub fn foreach_motion_profile<F: FnMut(&MotionStreamProfile, bool)>(&self, mut f: F) {
        for p in &self.motion_profiles {
            f(p, p.is_default);
        }
    }

    pub fn profile_count(&self) -> usize {
        self.video_profiles.len() + self.motion_profiles.len()
    }
}

/// A discovered device.
pub struct DdsDevice {
    participant: Arc<Participant>,
    info: DeviceInfo,
    notifications: Box<dyn RawReader>,
    control: Option<Box<dyn RawWriter>>,
    num_of_streams: Option<usize>,
    groups: Vec<DdsStream>,
}

impl DdsDevice {
    /// Subscribe to the device's notifications. Nothing is read until [`run`](Self::run).
    pub fn create(participant: Arc<Participant>, info: DeviceInfo) -> Result<Self> {
        let notifications = participant.create_reader(
            &notification_topic(&info.topic_root),
            Notification::TYPE_NAME,
            notification_qos(),
        )?;
        Ok(Self {
            participant,
            info,
            notifications,
            control: None,
            num_of_streams: None,
            groups: Vec::new(),
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn is_running(&self) -> bool {
        self.control.is_some()
    }

    /// Wait until the device header and every announced profile arrived.
    pub fn run(&mut self, timeout: Duration) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let deadline = Instant::now() + timeout;
        loop {
            self.process_notifications()?;
            if self.init_received() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "initialization of '{}'",
                    self.info.topic_root
                )));
            }
            std::thread::sleep(RUN_POLL_INTERVAL);
        }

        self.control = Some(self.participant.create_writer(
            &control_topic(&self.info.topic_root),
            ControlMsg::TYPE_NAME,
            control_qos(),
        )?);
        tracing::info!(
            "Device '{}' running: {} stream(s) in {} group(s)",
            self.info.topic_root,
            self.num_of_streams.unwrap_or(0),
            self.groups.len()
        );
        Ok(())
    }

    fn init_received(&self) -> bool {
        let received: usize = self.groups.iter().map(DdsStream::profile_count).sum();
        self.num_of_streams == Some(received)
    }

    fn process_notifications(&mut self) -> Result<()> {
        for sample in self.notifications.take()? {
            if sample.kind == SampleKind::WriterGone {
                tracing::debug!("Notification writer of '{}' left", self.info.topic_root);
                continue;
            }
            match Notification::decode(&sample.payload)? {
                Notification::DeviceHeader(h) => {
                    self.num_of_streams = Some(h.num_of_streams as usize);
                    self.groups.clear();
                }
                Notification::VideoStreamProfiles(g) => {
                    let mut stream = DdsStream::new(g.group_name().as_str());
                    for p in g.profiles() {
                        stream.add_video_profile(*p, p.is_default);
                    }
                    self.groups.push(stream);
                }
                Notification::MotionStreamProfiles(g) => {
                    let mut stream = DdsStream::new(g.group_name().as_str());
                    for p in g.profiles() {
                        stream.add_motion_profile(*p, p.is_default);
                    }
                    self.groups.push(stream);
                }
            }
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::NotRunning(self.info.topic_root.clone()))
        }
    }

    pub fn num_of_streams(&self) -> Result<usize> {
        self.ensure_running()?;
        Ok(self.num_of_streams.unwrap_or(0))
    }

    pub fn num_of_stream_groups(&self) -> Result<usize> {
        self.ensure_running()?;
        Ok(self.groups.len())
    }

    pub fn foreach_stream_group<F: FnMut(&DdsStream)>(&self, mut f: F) -> Result<()> {
        self.ensure_running()?;
        for group in &self.groups {
            f(group);
        }
        Ok(())
    }

    pub fn foreach_video_profile<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&VideoStreamProfile, bool),
    {
        self.ensure_running()?;
        for group in &self.groups {
            group.foreach_video_profile(&mut f);
        }
        Ok(())
    }

    pub fn foreach_motion_profile<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&MotionStreamProfile, bool),
    {
        self.ensure_running()?;
        for group in &self.groups {
            group.foreach_motion_profile(&mut f);
        }
        Ok(())
    }

    pub fn foreach_video_profile_in_group<F: FnMut(&VideoStreamProfile, bool)>(
        &self,
        group_name: &str,
        f: F,
    ) -> Result<()> {
        self.ensure_running()?;
        if let Some(group) = self.groups.iter().find(|g| g.group_name == group_name) {
            group.foreach_video_profile(f);
        }
        Ok(())
    }

    pub fn foreach_motion_profile_in_group<F: FnMut(&MotionStreamProfile, bool)>(
        &self,
        group_name: &str,
        f: F,
    ) -> Result<()> {
        self.ensure_running()?;
        if let Some(group) = self.groups.iter().find(|g| g.group_name == group_name) {
            group.foreach_motion_profile(f);
        }
        Ok(())
    }

    /// Ask the server to open the profiles with these unique ids.
    pub fn open(&self, unique_ids: &[i16]) -> Result<()> {
        self.send(ControlMsg::OpenStreams(unique_ids.to_vec()))
    }

    /// Ask the server to close the profiles with these unique ids.
    pub fn close(&self, unique_ids: &[i16]) -> Result<()> {
        self.send(ControlMsg::CloseStreams(unique_ids.to_vec()))
    }

    fn send(&self, msg: ControlMsg) -> Result<()> {
        let writer = self
            .control
            .as_ref()
            .ok_or_else(|| Error::NotRunning(self.info.topic_root.clone()))?;
        tracing::debug!("Sending {:?} to '{}'", msg, self.info.topic_root);
        writer.write(&msg.encode()?)
    }
}

impl std::fmt::Debug for DdsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdsDevice")
            .field("topic_root", &self.info.topic_root)
            .field("running", &self.is_running())
            .field("groups", &self.groups.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::{Format, StreamType};

    fn profile(uid: i16) -> VideoStreamProfile {
        VideoStreamProfile {
            stream_index: 0,
            unique_id: uid,
            fps: 15,
            format: Format::Z16,
            stream_type: StreamType::Depth,
            width: 640,
            height: 480,
            is_default: false,
        }
    }

    #[test]
    fn test_stream_insertion_order() {
        let mut stream = DdsStream::new("Stereo Module");
        stream.add_video_profile(profile(3), false);
        stream.add_video_profile(profile(1), true);

        let mut seen = Vec::new();
        stream.foreach_video_profile(|p, def| seen.push((p.unique_id, def)));
        assert_eq!(seen, vec![(3, false), (1, true)]);
        assert_eq!(stream.profile_count(), 2);
    }

    #[test]
    fn test_not_running() {
        let participant = Arc::new(
            Participant::builder("test")
                .domain_id(230)
                .build()
                .expect("participant"),
        );
        let device = DdsDevice::create(
            participant,
            DeviceInfo::new("Intel RealSense D435", "nobody", "D400", true),
        )
        .expect("device");
        assert!(matches!(device.num_of_streams(), Err(Error::NotRunning(_))));
        assert!(matches!(device.open(&[1]), Err(Error::NotRunning(_))));
    }

    #[test]
    fn test_run_times_out_without_server() {
        let participant = Arc::new(
            Participant::builder("test")
                .domain_id(230)
                .build()
                .expect("participant"),
        );
        let mut device = DdsDevice::create(
            participant,
            DeviceInfo::new("Intel RealSense D435", "nobody", "D400", true),
        )
        .expect("device");
        assert!(matches!(
            device.run(Duration::from_millis(20)),
            Err(Error::Timeout(_))
        ));
    }
}
