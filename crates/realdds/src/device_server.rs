// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device Server
//!
//! Publishing side of one bridged device:
//!
//! ```text
//! DeviceServer ("realsense/D435/11223344")
//! +-- notification   <root>/notification   init messages, replayed to late joiners
//! +-- control        <root>/control        stream requests from subscribers
//! +-- streams
//!     +-- "Color"    <root>/Color          Idle | Started{header, writer}
//!     +-- "Depth"    <root>/Depth
//! ```
//!
//! The stream set is fixed by [`DeviceServer::init`]; afterwards the server
//! is shared (`Arc`) with frame callbacks and every operation takes `&self`.

use crate::notification_server::NotificationServer;
use crate::participant::Participant;
use crate::qos::QoS;
use crate::stream_server::{StreamServer, StreamStatsSnapshot};
use crate::topics::{control_topic, stream_topic, ControlMsg, ImageHeader, ImageMsg, Notification};
use crate::transport::{RawReader, SampleKind};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// QoS of control writers and readers.
pub fn control_qos() -> QoS {
    QoS::reliable().volatile()
}

struct Endpoints {
    notification: Mutex<NotificationServer>,
    streams: BTreeMap<String, StreamServer>,
    control: Box<dyn RawReader>,
}

/// Publishing side of one device.
pub struct DeviceServer {
    participant: Arc<Participant>,
    topic_root: String,
    endpoints: Option<Endpoints>,
}

impl DeviceServer {
    /// Create an uninitialized server under `topic_root`.
    pub fn new(participant: Arc<Participant>, topic_root: &str) -> Self {
        Self {
            participant,
            topic_root: topic_root.to_string(),
            endpoints: None,
        }
    }

    pub fn topic_root(&self) -> &str {
        &self.topic_root
    }

    /// Declare the publishable streams. Must be called exactly once.
    pub fn init(&mut self, supported_stream_names: &[String]) -> Result<()> {
        if self.endpoints.is_some() {
            return Err(Error::AlreadyInitialized(self.topic_root.clone()));
        }

        let notification = NotificationServer::new(&self.participant, &self.topic_root)?;
        let control = self.participant.create_reader(
            &control_topic(&self.topic_root),
            ControlMsg::TYPE_NAME,
            control_qos(),
        )?;

        let mut streams = BTreeMap::new();
        for name in supported_stream_names {
            if streams.contains_key(name) {
                tracing::warn!("Stream '{}' declared twice on '{}'", name, self.topic_root);
                continue;
            }
            self.participant
                .register_topic(&stream_topic(&self.topic_root, name), ImageMsg::TYPE_NAME)?;
            streams.insert(name.clone(), StreamServer::new(&self.topic_root, name));
        }

        tracing::debug!(
            "Device server '{}' initialized with streams {:?}",
            self.topic_root,
            streams.keys().collect::<Vec<_>>()
        );
        self.endpoints = Some(Endpoints {
            notification: Mutex::new(notification),
            streams,
            control,
        });
        Ok(())
    }

    fn endpoints(&self) -> Result<&Endpoints> {
        self.endpoints
            .as_ref()
            .ok_or_else(|| Error::NotInitialized(self.topic_root.clone()))
    }

    fn stream(&self, stream_name: &str) -> Result<&StreamServer> {
        self.endpoints()?
            .streams
            .get(stream_name)
            .ok_or_else(|| Error::UnknownStream(stream_name.to_string()))
    }

    pub fn is_initialized(&self) -> bool {
        self.endpoints.is_some()
    }

    /// Append one initialization message to the replay sequence.
    pub fn add_init_msg(&self, msg: Notification) -> Result<()> {
        self.endpoints()?.notification.lock().add_init_msg(msg)
    }

    /// True once the device header and every announced profile were queued.
    pub fn is_init_complete(&self) -> bool {
        self.endpoints
            .as_ref()
            .map(|e| e.notification.lock().is_init_complete())
            .unwrap_or(false)
    }

    /// Initialization messages queued so far, in replay order.
    pub fn init_messages(&self) -> Vec<Notification> {
        self.endpoints
            .as_ref()
            .map(|e| e.notification.lock().init_messages().to_vec())
            .unwrap_or_default()
    }

    /// Stream names declared at `init`, sorted.
    pub fn stream_names(&self) -> Vec<String> {
        self.endpoints
            .as_ref()
            .map(|e| e.streams.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Idle -> Started with the given frame shape.
    pub fn start_streaming(&self, stream_name: &str, header: ImageHeader) -> Result<()> {
        let stream = self.stream(stream_name)?;
        if !self.is_init_complete() {
            return Err(Error::InitIncomplete(self.topic_root.clone()));
        }
        stream.start(&self.participant, header)
    }

    /// Publish one frame. Fails if the stream is not started.
    ///
    /// Safe to call concurrently for different streams.
    pub fn publish_image(&self, stream_name: &str, data: &[u8]) -> Result<()> {
        self.stream(stream_name)?.publish(data)
    }

    /// Started -> Idle. Stopping an idle stream is a no-op.
    pub fn stop_streaming(&self, stream_name: &str) -> Result<()> {
        self.stream(stream_name)?.stop();
        Ok(())
    }

    /// Stop every started stream.
    pub fn stop_all_streams(&self) {
        if let Some(endpoints) = &self.endpoints {
            let stopped = endpoints.streams.values().filter(|s| s.stop()).count();
            if stopped > 0 {
                tracing::debug!("Stopped {} stream(s) on '{}'", stopped, self.topic_root);
            }
        }
    }

    pub fn is_streaming(&self, stream_name: &str) -> bool {
        self.stream(stream_name)
            .map(StreamServer::is_started)
            .unwrap_or(false)
    }

    /// Header of a started stream.
    pub fn stream_header(&self, stream_name: &str) -> Option<ImageHeader> {
        self.stream(stream_name).ok().and_then(StreamServer::header)
    }

    pub fn stream_stats(&self, stream_name: &str) -> Option<StreamStatsSnapshot> {
        self.stream(stream_name).ok().map(StreamServer::stats)
    }

    /// Drain pending subscriber requests. Malformed requests are logged and skipped.
    pub fn take_control_requests(&self) -> Result<Vec<ControlMsg>> {
        let samples = self.endpoints()?.control.take()?;
        let mut requests = Vec::with_capacity(samples.len());
        for sample in samples {
            if sample.kind != SampleKind::Data {
                continue;
            }
            match ControlMsg::decode(&sample.payload) {
                Ok(msg) => requests.push(msg),
                Err(e) => tracing::warn!("Bad control message on '{}': {}", self.topic_root, e),
            }
        }
        Ok(requests)
    }
}

impl std::fmt::Debug for DeviceServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceServer")
            .field("topic_root", &self.topic_root)
            .field("streams", &self.stream_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainState, LocalTransport};
    use crate::topics::{
        DeviceHeaderMsg, Format, GroupName, StreamType, VideoStreamProfile, VideoStreamProfilesMsg,
    };

    fn participant() -> Arc<Participant> {
        Arc::new(
            Participant::builder("test")
                .with_transport(Arc::new(LocalTransport::with_state(Arc::new(
                    DomainState::new(0),
                ))))
                .build()
                .expect("participant"),
        )
    }

    fn color_group() -> Notification {
        let mut group = VideoStreamProfilesMsg::new(GroupName::new("RGB Camera").expect("name"));
        group
            .push(VideoStreamProfile {
                stream_index: 0,
                unique_id: 1,
                fps: 30,
                format: Format::Rgb8,
                stream_type: StreamType::Color,
                width: 1280,
                height: 720,
                is_default: true,
            })
            .expect("push");
        Notification::VideoStreamProfiles(group)
    }

    fn ready_server() -> DeviceServer {
        let mut server = DeviceServer::new(participant(), "realsense/D435/1");
        server.init(&["Color".to_string()]).expect("init");
        server
            .add_init_msg(Notification::DeviceHeader(DeviceHeaderMsg { num_of_streams: 1 }))
            .expect("header");
        server.add_init_msg(color_group()).expect("group");
        server
    }

    #[test]
    fn test_init_once() {
        let mut server = DeviceServer::new(participant(), "realsense/D435/1");
        assert!(matches!(
            server.add_init_msg(color_group()),
            Err(Error::NotInitialized(_))
        ));
        server.init(&["Color".to_string()]).expect("init");
        assert!(matches!(
            server.init(&["Color".to_string()]),
            Err(Error::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_start_requires_complete_init() {
        let mut server = DeviceServer::new(participant(), "realsense/D435/1");
        server.init(&["Color".to_string()]).expect("init");
        server
            .add_init_msg(Notification::DeviceHeader(DeviceHeaderMsg { num_of_streams: 1 }))
            .expect("header");
        let header = ImageHeader::new(Format::Rgb8, 1280, 720);
        assert!(matches!(
            server.start_streaming("Color", header),
            Err(Error::InitIncomplete(_))
        ));
        server.add_init_msg(color_group()).expect("group");
        server.start_streaming("Color", header).expect("start");
        assert_eq!(server.stream_header("Color"), Some(header));
    }

    #[test]
    fn test_unknown_stream() {
        let server = ready_server();
        let header = ImageHeader::new(Format::Z16, 640, 480);
        assert!(matches!(
            server.start_streaming("Depth", header),
            Err(Error::UnknownStream(_))
        ));
        assert!(matches!(
            server.publish_image("Depth", &[]),
            Err(Error::UnknownStream(_))
        ));
    }

    #[test]
    fn test_publish_before_start_fails() {
        let server = ready_server();
        assert!(matches!(
            server.publish_image("Color", &[0; 4]),
            Err(Error::StreamNotStarted(_))
        ));
    }

    #[test]
    fn test_stop_twice() {
        let server = ready_server();
        server
            .start_streaming("Color", ImageHeader::new(Format::Rgb8, 1280, 720))
            .expect("start");
        server.stop_streaming("Color").expect("stop");
        server.stop_streaming("Color").expect("stop again");
        assert!(!server.is_streaming("Color"));
        server.stop_all_streams();
    }

    #[test]
    fn test_reserved_stream_name_rejected() {
        let mut server = DeviceServer::new(participant(), "realsense/D435/1");
        assert!(matches!(
            server.init(&["notification".to_string()]),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(!server.is_initialized());
    }
}
