// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! realdds - RealSense devices over DDS
//!
//! Publishing and subscribing halves of the device bridge protocol.
//!
//! # Features
//!
//! - **Device Broadcaster**: Announce and retract devices on `realsense/device-info`
//! - **Device Server**: Ordered init messages, per-stream start/stop, frame publishing
//! - **Device Discovery**: Track announced devices from a subscriber
//! - **DdsDevice**: Rebuild a remote device's stream groups and request streams
//!
//! # Architecture
//!
//! ```text
//! Participant (domain 0-232)
//! +-- Transport              HddsTransport (UDP multicast) or LocalTransport (in-process)
//!
//! DeviceBroadcaster          realsense/device-info       one retained sample per device
//! DeviceServer               <root>/notification         DEVICE_HEADER, then profile groups
//!                            <root>/control              open / close requests
//!                            <root>/<stream>             frames, while started
//! ```
//!
//! # Example
//!
//! ```rust
//! use realdds::topics::{DeviceHeaderMsg, DeviceInfo, Notification};
//! use realdds::{DeviceBroadcaster, DeviceServer, Participant};
//! use std::sync::Arc;
//!
//! let participant = Arc::new(Participant::builder("doc").domain_id(229).build()?);
//! let mut broadcaster = DeviceBroadcaster::new(Arc::clone(&participant));
//! broadcaster.run()?;
//!
//! let info = DeviceInfo::new("Intel RealSense D435", "0001", "D400", true);
//! broadcaster.add_device(&info)?;
//!
//! let mut server = DeviceServer::new(participant, &info.topic_root);
//! server.init(&[])?;
//! server.add_init_msg(Notification::DeviceHeader(DeviceHeaderMsg { num_of_streams: 0 }))?;
//! assert!(server.is_init_complete());
//!
//! broadcaster.remove_device(&info);
//! # Ok::<(), realdds::Error>(())
//! ```

pub mod device;
pub mod device_broadcaster;
pub mod device_server;
pub mod discovery;
pub mod domain;
mod error;
pub mod hdds_transport;
mod notification_server;
pub mod participant;
pub mod qos;
mod stream_server;
pub mod topics;
pub mod transport;

pub use device::{DdsDevice, DdsStream};
pub use device_broadcaster::DeviceBroadcaster;
pub use device_server::DeviceServer;
pub use discovery::{DeviceDiscovery, DiscoveryEvent};
pub use domain::{DomainId, DomainRegistry, DomainState, LocalTransport, MAX_DOMAIN_ID};
pub use error::{Error, Result};
pub use hdds_transport::HddsTransport;
pub use notification_server::notification_qos;
pub use participant::{Participant, ParticipantBuilder};
pub use qos::{Durability, History, QoS, Reliability};
pub use stream_server::{image_qos, StreamStats, StreamStatsSnapshot};
pub use transport::{RawReader, RawWriter, Sample, SampleKind, Transport};
