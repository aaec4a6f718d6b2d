// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-stream state machine and frame publisher.
//!
//! ```text
//!          start_streaming(header)
//!   Idle --------------------------> Started{header, writer}
//!    ^                                  |
//!    +---------- stop / teardown -------+
//! ```
//!
//! The data writer exists only while the stream is started. Publishing holds
//! the stream lock for the duration of one write, so stopping a stream waits
//! for an in-flight frame and no frame can follow the stop.

use crate::participant::Participant;
use crate::qos::QoS;
use crate::topics::{stream_topic, ImageHeader, ImageMsg};
use crate::transport::RawWriter;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// QoS of image writers: stale frames are worth less than missing ones.
pub fn image_qos() -> QoS {
    QoS::best_effort().volatile().keep_last(1)
}

enum StreamState {
    Idle,
    Started {
        header: ImageHeader,
        writer: Box<dyn RawWriter>,
    },
}

/// Counters for one stream.
#[derive(Debug)]
pub struct StreamStats {
    pub frames_published: AtomicU64,
    pub bytes_published: AtomicU64,
    pub frames_dropped: AtomicU64,
    created: Instant,
}

impl StreamStats {
    fn new() -> Self {
        Self {
            frames_published: AtomicU64::new(0),
            bytes_published: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Snapshot of stream statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatsSnapshot {
    pub frames_published: u64,
    pub bytes_published: u64,
    pub frames_dropped: u64,
    pub uptime_secs: u64,
}

impl StreamStatsSnapshot {
    pub fn frames_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.frames_published as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}

pub(crate) struct StreamServer {
    name: String,
    topic: String,
    state: Mutex<StreamState>,
    stats: StreamStats,
}

impl StreamServer {
    pub(crate) fn new(topic_root: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            topic: stream_topic(topic_root, name),
            state: Mutex::new(StreamState::Idle),
            stats: StreamStats::new(),
        }
    }

    /// Idle -> Started. Restarting a started stream only replaces its header.
    pub(crate) fn start(&self, participant: &Participant, header: ImageHeader) -> Result<()> {
        let mut state = self.state.lock();
        if let StreamState::Started { header: current, .. } = &mut *state {
            *current = header;
            tracing::debug!("Stream '{}' header changed to {:?}", self.topic, header);
            return Ok(());
        }

        let writer = participant.create_writer(&self.topic, ImageMsg::TYPE_NAME, image_qos())?;
        *state = StreamState::Started { header, writer };
        tracing::info!(
            "Stream '{}' started: {:?} {}x{}",
            self.topic,
            header.format,
            header.width,
            header.height
        );
        Ok(())
    }

    /// Started -> Idle. Returns whether the stream was started.
    pub(crate) fn stop(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock(), StreamState::Idle);
        match previous {
            StreamState::Started { writer, .. } => {
                drop(writer);
                tracing::info!("Stream '{}' stopped", self.topic);
                true
            }
            StreamState::Idle => false,
        }
    }

    /// Publish one frame on a started stream.
    ///
    /// A transport failure drops the frame; the stream stays started.
    pub(crate) fn publish(&self, data: &[u8]) -> Result<()> {
        let state = self.state.lock();
        let StreamState::Started { header, writer } = &*state else {
            self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            return Err(Error::StreamNotStarted(self.name.clone()));
        };

        if let Some(expected) = header.expected_size() {
            if expected != data.len() {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                return Err(Error::FrameSizeMismatch {
                    stream: self.name.clone(),
                    expected,
                    actual: data.len(),
                });
            }
        }

        let result = ImageMsg::encode(header, data).and_then(|buf| writer.write(&buf));
        match result {
            Ok(()) => {
                self.stats.frames_published.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_published
                    .fetch_add(data.len() as u64, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Dropping frame on '{}': {}", self.topic, e);
                Err(e)
            }
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        matches!(*self.state.lock(), StreamState::Started { .. })
    }

    pub(crate) fn header(&self) -> Option<ImageHeader> {
        match &*self.state.lock() {
            StreamState::Started { header, .. } => Some(*header),
            StreamState::Idle => None,
        }
    }

    pub(crate) fn stats(&self) -> StreamStatsSnapshot {
        self.stats.snapshot()
    }
}
