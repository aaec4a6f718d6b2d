// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber-side view of the discovery topic.

use crate::device_broadcaster::device_info_qos;
use crate::participant::Participant;
use crate::topics::{DeviceInfo, DEVICE_INFO_TOPIC_NAME};
use crate::transport::{RawReader, SampleKind};
use crate::Result;
use std::collections::HashMap;

/// Change in the set of announced devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Added(DeviceInfo),
    /// Topic root of the retracted device.
    Removed(String),
}

/// Tracks devices announced by broadcasters on the domain.
pub struct DeviceDiscovery {
    reader: Box<dyn RawReader>,
    /// Announcements keyed by the writer that published them.
    devices: HashMap<u64, DeviceInfo>,
}

impl DeviceDiscovery {
    pub fn new(participant: &Participant) -> Result<Self> {
        let reader = participant.create_reader(
            DEVICE_INFO_TOPIC_NAME,
            DeviceInfo::TYPE_NAME,
            device_info_qos().keep_all(),
        )?;
        Ok(Self {
            reader,
            devices: HashMap::new(),
        })
    }

    /// Process pending announcements and retractions.
    pub fn poll(&mut self) -> Result<Vec<DiscoveryEvent>> {
        let mut events = Vec::new();
        for sample in self.reader.take()? {
            match sample.kind {
                SampleKind::Data => match DeviceInfo::from_json(&sample.payload) {
                    Ok(info) => {
                        tracing::debug!("Discovered '{}' at '{}'", info.name, info.topic_root);
                        self.devices.insert(sample.writer_id, info.clone());
                        events.push(DiscoveryEvent::Added(info));
                    }
                    Err(e) => tracing::warn!("Ignoring malformed device-info: {}", e),
                },
                SampleKind::WriterGone => {
                    if let Some(info) = self.devices.remove(&sample.writer_id) {
                        tracing::debug!("Lost '{}' at '{}'", info.name, info.topic_root);
                        events.push(DiscoveryEvent::Removed(info.topic_root));
                    }
                }
            }
        }
        Ok(events)
    }

    /// Devices currently announced, sorted by topic root.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> = self.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.topic_root.cmp(&b.topic_root));
        devices
    }

    pub fn find(&self, topic_root: &str) -> Option<&DeviceInfo> {
        self.devices.values().find(|d| d.topic_root == topic_root)
    }
}
