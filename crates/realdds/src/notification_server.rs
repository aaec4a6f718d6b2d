// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ordered initialization messages of one device.
//!
//! Messages are written as they are queued on a TRANSIENT_LOCAL, KEEP_ALL
//! writer, so the transport replays the whole sequence, in order, to every
//! subscriber that joins later.

use crate::participant::Participant;
use crate::qos::QoS;
use crate::topics::{notification_topic, Notification};
use crate::transport::RawWriter;
use crate::{Error, Result};

/// QoS of notification writers and readers.
pub fn notification_qos() -> QoS {
    QoS::reliable().transient_local().keep_all()
}

pub(crate) struct NotificationServer {
    topic: String,
    writer: Box<dyn RawWriter>,
    init_msgs: Vec<Notification>,
    announced: Option<usize>,
    profiles: usize,
}

impl NotificationServer {
    pub(crate) fn new(participant: &Participant, topic_root: &str) -> Result<Self> {
        let topic = notification_topic(topic_root);
        let writer =
            participant.create_writer(&topic, Notification::TYPE_NAME, notification_qos())?;
        Ok(Self {
            topic,
            writer,
            init_msgs: Vec::new(),
            announced: None,
            profiles: 0,
        })
    }

    /// Queue and publish one initialization message.
    ///
    /// The device header comes first and exactly once; profile groups may not
    /// carry more profiles than the header announced.
    pub(crate) fn add_init_msg(&mut self, msg: Notification) -> Result<()> {
        match (&msg, self.announced) {
            (Notification::DeviceHeader(_), Some(_)) => {
                return Err(Error::InitOrder(format!(
                    "second DEVICE_HEADER on '{}'",
                    self.topic
                )));
            }
            (Notification::DeviceHeader(_), None) => {}
            (_, None) => {
                return Err(Error::InitOrder(format!(
                    "{:?} queued before DEVICE_HEADER on '{}'",
                    msg.msg_type(),
                    self.topic
                )));
            }
            (_, Some(announced)) => {
                if self.profiles + msg.profile_count() > announced {
                    return Err(Error::InitOrder(format!(
                        "'{}' announced {} profiles, got {}",
                        self.topic,
                        announced,
                        self.profiles + msg.profile_count()
                    )));
                }
            }
        }

        let payload = msg.encode()?;
        self.writer.write(&payload)?;

        match &msg {
            Notification::DeviceHeader(h) => self.announced = Some(h.num_of_streams as usize),
            other => self.profiles += other.profile_count(),
        }
        tracing::debug!("Queued {:?} on '{}'", msg.msg_type(), self.topic);
        self.init_msgs.push(msg);
        Ok(())
    }

    /// True once the header and every announced profile were queued.
    pub(crate) fn is_init_complete(&self) -> bool {
        self.announced == Some(self.profiles)
    }

    pub(crate) fn init_messages(&self) -> &[Notification] {
        &self.init_msgs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainState, LocalTransport};
    use crate::topics::{
        DeviceHeaderMsg, Format, GroupName, MotionStreamProfile, MotionStreamProfilesMsg,
        StreamType,
    };
    use std::sync::Arc;

    fn participant() -> Participant {
        Participant::builder("test")
            .with_transport(Arc::new(LocalTransport::with_state(Arc::new(
                DomainState::new(0),
            ))))
            .build()
            .expect("participant")
    }

    fn motion_group(count: usize) -> Notification {
        let mut group = MotionStreamProfilesMsg::new(GroupName::new("Motion Module").expect("name"));
        for uid in 0..count {
            group
                .push(MotionStreamProfile {
                    stream_index: 0,
                    unique_id: uid as i16,
                    fps: 100,
                    format: Format::MotionXyz32f,
                    stream_type: StreamType::Accel,
                    is_default: uid == 0,
                })
                .expect("push");
        }
        Notification::MotionStreamProfiles(group)
    }

    fn header(n: u32) -> Notification {
        Notification::DeviceHeader(DeviceHeaderMsg { num_of_streams: n })
    }

    #[test]
    fn test_header_must_come_first() {
        let participant = participant();
        let mut server = NotificationServer::new(&participant, "realsense/X/1").expect("server");
        assert!(matches!(
            server.add_init_msg(motion_group(1)),
            Err(Error::InitOrder(_))
        ));
        server.add_init_msg(header(2)).expect("header");
        assert!(matches!(server.add_init_msg(header(2)), Err(Error::InitOrder(_))));
    }

    #[test]
    fn test_completion_tracking() {
        let participant = participant();
        let mut server = NotificationServer::new(&participant, "realsense/X/1").expect("server");
        server.add_init_msg(header(3)).expect("header");
        server.add_init_msg(motion_group(2)).expect("group");
        assert!(!server.is_init_complete());
        assert!(matches!(
            server.add_init_msg(motion_group(2)),
            Err(Error::InitOrder(_))
        ));
        server.add_init_msg(motion_group(1)).expect("group");
        assert!(server.is_init_complete());
        assert_eq!(server.init_messages().len(), 3);
    }

    #[test]
    fn test_zero_stream_device_is_complete() {
        let participant = participant();
        let mut server = NotificationServer::new(&participant, "realsense/X/1").expect("server");
        server.add_init_msg(header(0)).expect("header");
        assert!(server.is_init_complete());
    }
}
