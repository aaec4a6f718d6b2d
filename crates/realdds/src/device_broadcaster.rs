// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device Broadcaster
//!
//! Announces bridged devices on the discovery topic. Every device gets its own
//! TRANSIENT_LOCAL writer holding exactly one sample, so a late subscriber
//! sees every live device and nothing else. Dropping the writer retracts the
//! announcement.

use crate::participant::Participant;
use crate::qos::QoS;
use crate::topics::{DeviceInfo, DEVICE_INFO_TOPIC_NAME};
use crate::transport::RawWriter;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// QoS of discovery writers and readers.
pub fn device_info_qos() -> QoS {
    QoS::reliable().transient_local().keep_last(1)
}

/// Publishes and retracts [`DeviceInfo`] announcements.
pub struct DeviceBroadcaster {
    participant: Arc<Participant>,
    running: bool,
    /// Announcement writers keyed by topic root.
    devices: HashMap<String, Box<dyn RawWriter>>,
}

impl DeviceBroadcaster {
    pub fn new(participant: Arc<Participant>) -> Self {
        Self {
            participant,
            running: false,
            devices: HashMap::new(),
        }
    }

    /// Bring up the discovery topic.
    ///
    /// Failing here means the domain is unusable.
    pub fn run(&mut self) -> Result<()> {
        self.participant
            .register_topic(DEVICE_INFO_TOPIC_NAME, DeviceInfo::TYPE_NAME)?;
        self.running = true;
        tracing::info!(
            "Device broadcaster running on '{}' (domain {})",
            DEVICE_INFO_TOPIC_NAME,
            self.participant.domain_id()
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Announce a device.
    ///
    /// A second device resolving to an already announced topic root is refused.
    pub fn add_device(&mut self, info: &DeviceInfo) -> Result<()> {
        if !self.running {
            return Err(Error::BroadcasterNotRunning);
        }
        if self.devices.contains_key(&info.topic_root) {
            return Err(Error::TopicRootCollision(info.topic_root.clone()));
        }

        let writer = self.participant.create_writer(
            DEVICE_INFO_TOPIC_NAME,
            DeviceInfo::TYPE_NAME,
            device_info_qos(),
        )?;
        writer.write(&info.to_json()?)?;
        self.devices.insert(info.topic_root.clone(), writer);

        tracing::info!("Broadcasting device '{}' at '{}'", info.name, info.topic_root);
        Ok(())
    }

    /// Retract a device. Unknown devices are logged and ignored.
    pub fn remove_device(&mut self, info: &DeviceInfo) {
        match self.devices.remove(&info.topic_root) {
            Some(writer) => {
                drop(writer);
                tracing::info!("Removed device '{}' from '{}'", info.name, info.topic_root);
            }
            None => {
                tracing::warn!(
                    "remove_device: '{}' ({}) is not broadcast",
                    info.name,
                    info.topic_root
                );
            }
        }
    }

    pub fn contains(&self, topic_root: &str) -> bool {
        self.devices.contains_key(topic_root)
    }

    /// Topic roots currently announced, sorted.
    pub fn topic_roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self.devices.keys().cloned().collect();
        roots.sort();
        roots
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl std::fmt::Debug for DeviceBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBroadcaster")
            .field("running", &self.running)
            .field("devices", &self.topic_roots())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainState, LocalTransport};
    use crate::transport::SampleKind;

    fn participant() -> (Arc<Participant>, Arc<DomainState>) {
        let state = Arc::new(DomainState::new(0));
        let participant = Participant::builder("test")
            .with_transport(Arc::new(LocalTransport::with_state(Arc::clone(&state))))
            .build()
            .expect("participant");
        (Arc::new(participant), state)
    }

    #[test]
    fn test_add_before_run() {
        let (participant, _) = participant();
        let mut broadcaster = DeviceBroadcaster::new(participant);
        let info = DeviceInfo::new("Intel RealSense D435", "1", "D400", true);
        assert!(matches!(
            broadcaster.add_device(&info),
            Err(Error::BroadcasterNotRunning)
        ));
    }

    #[test]
    fn test_late_joiner_sees_live_devices_only() {
        let (participant, _) = participant();
        let mut broadcaster = DeviceBroadcaster::new(Arc::clone(&participant));
        broadcaster.run().expect("run");

        let a = DeviceInfo::new("Intel RealSense D435", "1", "D400", true);
        let b = DeviceInfo::new("Intel RealSense D455", "2", "D400", true);
        broadcaster.add_device(&a).expect("add a");
        broadcaster.add_device(&b).expect("add b");
        broadcaster.remove_device(&a);

        let reader = participant
            .create_reader(DEVICE_INFO_TOPIC_NAME, DeviceInfo::TYPE_NAME, device_info_qos())
            .expect("reader");
        let samples = reader.take().expect("take");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].kind, SampleKind::Data);
        assert_eq!(DeviceInfo::from_json(&samples[0].payload).expect("json"), b);
        assert_eq!(broadcaster.topic_roots(), vec![b.topic_root.clone()]);
    }

    #[test]
    fn test_collision_refused() {
        let (participant, state) = participant();
        let mut broadcaster = DeviceBroadcaster::new(participant);
        broadcaster.run().expect("run");

        let info = DeviceInfo::new("Intel RealSense D435", "1", "D400", true);
        broadcaster.add_device(&info).expect("add");
        assert!(matches!(
            broadcaster.add_device(&info),
            Err(Error::TopicRootCollision(_))
        ));
        assert_eq!(state.writer_count(DEVICE_INFO_TOPIC_NAME), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (participant, _) = participant();
        let mut broadcaster = DeviceBroadcaster::new(participant);
        broadcaster.run().expect("run");
        broadcaster.remove_device(&DeviceInfo::new("X", "0", "", false));
        assert_eq!(broadcaster.device_count(), 0);
    }
}
