// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport Abstraction
//!
//! The bridge never touches wire-level encoding or sessions: everything it
//! publishes goes through these traits.
//!
//! - [`HddsTransport`]: hdds over UDP multicast, what the server runs on
//! - [`LocalTransport`]: in-process domain, used by tests
//!
//! [`HddsTransport`]: crate::hdds_transport::HddsTransport
//! [`LocalTransport`]: crate::domain::LocalTransport

use crate::qos::QoS;
use crate::Result;
use std::sync::Arc;

/// What a received sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// A payload written by the writer.
    Data,
    /// The writer was deleted; everything it published is retracted.
    WriterGone,
}

/// Sample delivered to a reader.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Topic name.
    pub topic: Arc<str>,
    /// Writer identifier, unique within the domain.
    pub writer_id: u64,
    /// Per-writer sequence number (starts at 1, 0 for `WriterGone`).
    pub sequence: u64,
    /// Serialized payload (empty for `WriterGone`).
    pub payload: Arc<[u8]>,
    /// Sample kind.
    pub kind: SampleKind,
}

/// Abstract data writer.
///
/// Dropping the writer unregisters it from the domain.
pub trait RawWriter: Send + Sync {
    /// Publish one serialized sample.
    fn write(&self, payload: &[u8]) -> Result<()>;

    /// Writer identifier.
    fn id(&self) -> u64;

    /// Topic name.
    fn topic(&self) -> &str;
}

/// Abstract data reader.
pub trait RawReader: Send + Sync {
    /// Take every queued sample, oldest first.
    fn take(&self) -> Result<Vec<Sample>>;

    /// Topic name.
    fn topic(&self) -> &str;
}

/// Abstract pub/sub transport bound to one domain.
pub trait Transport: Send + Sync {
    /// Domain this transport publishes on.
    fn domain_id(&self) -> u32;

    /// Declare a topic and bind it to a type name.
    fn register_topic(&self, topic: &str, type_name: &str) -> Result<()>;

    /// Create a writer on a topic.
    fn create_writer(&self, topic: &str, type_name: &str, qos: &QoS) -> Result<Box<dyn RawWriter>>;

    /// Create a reader on a topic.
    fn create_reader(&self, topic: &str, type_name: &str, qos: &QoS) -> Result<Box<dyn RawReader>>;
}
