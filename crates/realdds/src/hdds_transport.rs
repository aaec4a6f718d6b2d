// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HDDS-backed network transport.
//!
//! Endpoints are HDDS raw writers/readers on a UDP multicast participant,
//! so devices bridged by one process are visible to every subscriber on the
//! same domain.
//!
//! # Envelope
//!
//! Raw HDDS samples carry no writer identity and deleting a writer is not
//! observable from a raw reader. Every payload is therefore prefixed with a
//! small envelope (little-endian):
//!
//! ```text
//! 0      1                9                17
//! +------+----------------+----------------+------------------
//! | kind |   writer id    |    sequence    | payload ...
//! +------+----------------+----------------+------------------
//! ```
//!
//! `kind` is 0 for data and 1 for a retraction, which a writer sends as its
//! last sample when it is dropped.

use crate::domain::MAX_DOMAIN_ID;
use crate::qos::{Durability, History, QoS, Reliability};
use crate::transport::{RawReader, RawWriter, Sample, SampleKind, Transport};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hdds::{RawDataReader, RawDataWriter, TransportMode};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Envelope size in bytes.
pub const ENVELOPE_SIZE: usize = 17;

const KIND_DATA: u8 = 0;
const KIND_WRITER_GONE: u8 = 1;

/// Envelope prepended to every sample on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub kind: SampleKind,
    pub writer_id: u64,
    pub sequence: u64,
}

impl Envelope {
    /// Serialize the envelope followed by `payload`.
    pub fn wrap(&self, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENVELOPE_SIZE + payload.len());
        let kind = match self.kind {
            SampleKind::Data => KIND_DATA,
            SampleKind::WriterGone => KIND_WRITER_GONE,
        };
        // Writes into a Vec cannot fail.
        let _ = buf.write_u8(kind);
        let _ = buf.write_u64::<LittleEndian>(self.writer_id);
        let _ = buf.write_u64::<LittleEndian>(self.sequence);
        buf.extend_from_slice(payload);
        buf
    }

    /// Split a wire sample into its envelope and payload.
    pub fn split(bytes: &[u8]) -> Result<(Self, &[u8])> {
        let mut cursor = Cursor::new(bytes);
        let kind = match cursor.read_u8()? {
            KIND_DATA => SampleKind::Data,
            KIND_WRITER_GONE => SampleKind::WriterGone,
            value => {
                return Err(Error::InvalidEnum {
                    what: "sample kind",
                    value,
                })
            }
        };
        let writer_id = cursor.read_u64::<LittleEndian>()?;
        let sequence = cursor.read_u64::<LittleEndian>()?;
        Ok((
            Self {
                kind,
                writer_id,
                sequence,
            },
            &bytes[ENVELOPE_SIZE..],
        ))
    }
}

/// Map realdds QoS onto the HDDS policy set.
pub fn to_hdds_qos(qos: &QoS) -> hdds::QoS {
    let base = match qos.reliability {
        Reliability::Reliable => hdds::QoS::reliable(),
        Reliability::BestEffort => hdds::QoS::best_effort(),
    };
    let base = match qos.durability {
        Durability::Volatile => base.volatile(),
        Durability::TransientLocal => base.transient_local(),
    };
    match qos.history {
        History::KeepLast(depth) => base.keep_last(depth.max(1)),
        History::KeepAll => base.keep_all(),
    }
}

fn transport_error(what: &str, e: hdds::Error) -> Error {
    Error::Transport(format!("{}: {}", what, e))
}

/// [`Transport`] over an HDDS participant (UDP multicast).
pub struct HddsTransport {
    participant: Arc<hdds::Participant>,
    domain_id: u32,
    writer_base: u64,
    next_writer: AtomicU64,
}

impl HddsTransport {
    /// Join `domain_id` with a UDP multicast participant.
    pub fn new(name: &str, domain_id: u32) -> Result<Self> {
        if domain_id > MAX_DOMAIN_ID {
            return Err(Error::InvalidDomainId(domain_id));
        }
        let participant = hdds::Participant::builder(name)
            .with_transport(TransportMode::UdpMulticast)
            .domain_id(domain_id)
            .build()
            .map_err(|e| transport_error("participant", e))?;
        Ok(Self::with_participant(participant, domain_id))
    }

    /// Wrap an already configured HDDS participant.
    pub fn with_participant(participant: Arc<hdds::Participant>, domain_id: u32) -> Self {
        // Writer ids must not collide across processes: seed them from the GUID.
        let guid = participant.guid().as_bytes();
        let mut halves = [0u8; 8];
        halves.copy_from_slice(&guid[..8]);
        let high = u64::from_le_bytes(halves);
        halves.copy_from_slice(&guid[8..]);
        let low = u64::from_le_bytes(halves);

        tracing::info!(
            "[HddsTransport] participant '{}' on domain {} (UDP multicast)",
            participant.name(),
            domain_id
        );
        Self {
            participant,
            domain_id,
            writer_base: high ^ low.rotate_left(32),
            next_writer: AtomicU64::new(1),
        }
    }

    /// Underlying HDDS participant.
    pub fn participant(&self) -> &Arc<hdds::Participant> {
        &self.participant
    }

    fn next_writer_id(&self) -> u64 {
        self.writer_base
            .wrapping_add(self.next_writer.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Debug for HddsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HddsTransport")
            .field("domain_id", &self.domain_id)
            .finish()
    }
}

impl Transport for HddsTransport {
    fn domain_id(&self) -> u32 {
        self.domain_id
    }

    fn register_topic(&self, topic: &str, type_name: &str) -> Result<()> {
        // HDDS binds the type when the first endpoint is announced.
        tracing::trace!("[HddsTransport] topic '{}' ({})", topic, type_name);
        Ok(())
    }

    fn create_writer(&self, topic: &str, type_name: &str, qos: &QoS) -> Result<Box<dyn RawWriter>> {
        let inner = self
            .participant
            .create_raw_writer_with_type(topic, type_name, Some(to_hdds_qos(qos)), None)
            .map_err(|e| transport_error("create_raw_writer_with_type", e))?;
        let id = self.next_writer_id();
        tracing::debug!("[HddsTransport] writer {:016x} on '{}'", id, topic);
        Ok(Box::new(HddsWriter {
            inner: Mutex::new(inner),
            topic: topic.to_string(),
            id,
            next_sequence: AtomicU64::new(1),
        }))
    }

    fn create_reader(&self, topic: &str, type_name: &str, qos: &QoS) -> Result<Box<dyn RawReader>> {
        let inner = self
            .participant
            .create_raw_reader_with_type(topic, type_name, Some(to_hdds_qos(qos)), None)
            .map_err(|e| transport_error("create_raw_reader_with_type", e))?;
        tracing::debug!("[HddsTransport] reader on '{}'", topic);
        Ok(Box::new(HddsReader {
            inner,
            topic: Arc::from(topic),
        }))
    }
}

struct HddsWriter {
    inner: Mutex<RawDataWriter>,
    topic: String,
    id: u64,
    next_sequence: AtomicU64,
}

impl HddsWriter {
    fn send(&self, kind: SampleKind, sequence: u64, payload: &[u8]) -> Result<()> {
        let envelope = Envelope {
            kind,
            writer_id: self.id,
            sequence,
        };
        self.inner
            .lock()
            .write_raw(&envelope.wrap(payload))
            .map_err(|e| transport_error("write_raw", e))
    }
}

impl RawWriter for HddsWriter {
    fn write(&self, payload: &[u8]) -> Result<()> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.send(SampleKind::Data, sequence, payload)
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for HddsWriter {
    fn drop(&mut self) {
        if let Err(e) = self.send(SampleKind::WriterGone, 0, &[]) {
            tracing::debug!(
                "[HddsTransport] retraction of writer {:016x} on '{}' failed: {}",
                self.id,
                self.topic,
                e
            );
        }
    }
}

struct HddsReader {
    inner: RawDataReader,
    topic: Arc<str>,
}

impl RawReader for HddsReader {
    fn take(&self) -> Result<Vec<Sample>> {
        let raw = self
            .inner
            .try_take_raw()
            .map_err(|e| transport_error("try_take_raw", e))?;

        let mut samples = Vec::with_capacity(raw.len());
        for sample in raw {
            match Envelope::split(&sample.payload) {
                Ok((envelope, payload)) => samples.push(Sample {
                    topic: Arc::clone(&self.topic),
                    writer_id: envelope.writer_id,
                    sequence: envelope.sequence,
                    payload: Arc::from(payload),
                    kind: envelope.kind,
                }),
                Err(e) => {
                    tracing::warn!(
                        "[HddsTransport] dropping malformed sample on '{}': {}",
                        self.topic,
                        e
                    );
                }
            }
        }
        Ok(samples)
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
