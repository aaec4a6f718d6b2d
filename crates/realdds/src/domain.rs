// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process domain used as the default transport.
//!
//! # Architecture
//!
//! ```text
//! DomainRegistry (static global)
//! +-- domains: Mutex<HashMap<DomainId, Weak<DomainState>>>
//!
//! DomainState (one per domain, per process)
//! +-- topics: DashMap<topic name, TopicState>
//! +-- [strong ref held by every LocalTransport / endpoint]
//!
//! TopicState
//! +-- type_name
//! +-- writers: Vec<WriterEntry>   (retained history for TRANSIENT_LOCAL)
//! +-- readers: Vec<ReaderEntry>   (bounded sample queues)
//! ```
//!
//! # Delivery
//!
//! 1. Writer writes -> sample pushed into every compatible reader queue
//! 2. TRANSIENT_LOCAL writer also keeps the sample per its history policy
//! 3. New TRANSIENT_LOCAL reader -> replays retained history, writer creation order
//! 4. Writer dropped -> `WriterGone` pushed to matched readers, history discarded
//!
//! Delivery is synchronous: once `write()` returns, the sample is queued.

use crate::qos::{Durability, QoS};
use crate::transport::{RawReader, RawWriter, Sample, SampleKind, Transport};
use crate::{Error, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Domain ID type (0-232).
pub type DomainId = u32;

/// Highest valid domain ID.
pub const MAX_DOMAIN_ID: DomainId = 232;

struct ReaderQueue {
    samples: Mutex<VecDeque<Sample>>,
    depth: Option<usize>,
}

impl ReaderQueue {
    fn new(depth: Option<usize>) -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            depth,
        }
    }

    fn push(&self, sample: Sample) {
        let mut samples = self.samples.lock();
        if let Some(depth) = self.depth {
            while samples.len() >= depth {
                samples.pop_front();
            }
        }
        samples.push_back(sample);
    }

    fn drain(&self) -> Vec<Sample> {
        self.samples.lock().drain(..).collect()
    }
}

struct WriterEntry {
    id: u64,
    qos: QoS,
    next_sequence: u64,
    history: VecDeque<(u64, Arc<[u8]>)>,
}

struct ReaderEntry {
    id: u64,
    qos: QoS,
    queue: Arc<ReaderQueue>,
}

struct TopicState {
    name: Arc<str>,
    type_name: String,
    writers: Vec<WriterEntry>,
    readers: Vec<ReaderEntry>,
}

impl TopicState {
    fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: Arc::from(name),
            type_name: type_name.to_string(),
            writers: Vec::new(),
            readers: Vec::new(),
        }
    }
}

/// Domain state - holds every topic of a single domain.
pub struct DomainState {
    /// Domain ID
    pub domain_id: DomainId,
    topics: DashMap<String, TopicState>,
    next_entity_id: AtomicU64,
}

impl DomainState {
    /// Create new domain state
    pub fn new(domain_id: DomainId) -> Self {
        Self {
            domain_id,
            topics: DashMap::new(),
            next_entity_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_entity_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Bind `topic` to `type_name`, creating it if needed.
    pub fn register_topic(&self, topic: &str, type_name: &str) -> Result<()> {
        let entry = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicState::new(topic, type_name));
        if entry.type_name != type_name {
            return Err(Error::TypeMismatch {
                topic: topic.to_string(),
                registered: entry.type_name.clone(),
                requested: type_name.to_string(),
            });
        }
        Ok(())
    }

    fn add_writer(self: &Arc<Self>, topic: &str, type_name: &str, qos: &QoS) -> Result<LocalWriter> {
        self.register_topic(topic, type_name)?;
        let id = self.next_id();
        let mut state = self
            .topics
            .get_mut(topic)
            .ok_or_else(|| Error::Transport(format!("topic '{}' vanished", topic)))?;
        state.writers.push(WriterEntry {
            id,
            qos: *qos,
            next_sequence: 1,
            history: VecDeque::new(),
        });
        tracing::debug!("[LocalDomain {}] writer {} on '{}'", self.domain_id, id, topic);

        Ok(LocalWriter {
            domain: Arc::clone(self),
            topic: Arc::clone(&state.name),
            id,
        })
    }

    fn add_reader(self: &Arc<Self>, topic: &str, type_name: &str, qos: &QoS) -> Result<LocalReader> {
        self.register_topic(topic, type_name)?;
        let id = self.next_id();
        let mut state = self
            .topics
            .get_mut(topic)
            .ok_or_else(|| Error::Transport(format!("topic '{}' vanished", topic)))?;
        let queue = Arc::new(ReaderQueue::new(qos.history.depth()));

        // Late-joiner replay
        if qos.durability == Durability::TransientLocal {
            for writer in &state.writers {
                if !writer.qos.is_compatible_with(qos) {
                    continue;
                }
                for (sequence, payload) in &writer.history {
                    queue.push(Sample {
                        topic: Arc::clone(&state.name),
                        writer_id: writer.id,
                        sequence: *sequence,
                        payload: Arc::clone(payload),
                        kind: SampleKind::Data,
                    });
                }
            }
        }

        state.readers.push(ReaderEntry {
            id,
            qos: *qos,
            queue: Arc::clone(&queue),
        });
        tracing::debug!("[LocalDomain {}] reader {} on '{}'", self.domain_id, id, topic);

        Ok(LocalReader {
            domain: Arc::clone(self),
            topic: Arc::clone(&state.name),
            id,
            queue,
        })
    }

    fn write(&self, topic: &str, writer_id: u64, payload: &[u8]) -> Result<()> {
        let mut guard = self
            .topics
            .get_mut(topic)
            .ok_or_else(|| Error::Transport(format!("topic '{}' not registered", topic)))?;
        let state = &mut *guard;
        let writer = state
            .writers
            .iter_mut()
            .find(|w| w.id == writer_id)
            .ok_or_else(|| Error::Transport(format!("writer {} not registered", writer_id)))?;

        let sequence = writer.next_sequence;
        writer.next_sequence += 1;
        let payload: Arc<[u8]> = Arc::from(payload);

        if writer.qos.durability == Durability::TransientLocal {
            writer.history.push_back((sequence, Arc::clone(&payload)));
            if let Some(depth) = writer.qos.history.depth() {
                while writer.history.len() > depth {
                    writer.history.pop_front();
                }
            }
        }

        let writer_qos = writer.qos;
        for reader in &state.readers {
            if writer_qos.is_compatible_with(&reader.qos) {
                reader.queue.push(Sample {
                    topic: Arc::clone(&state.name),
                    writer_id,
                    sequence,
                    payload: Arc::clone(&payload),
                    kind: SampleKind::Data,
                });
            }
        }
        Ok(())
    }

    fn remove_writer(&self, topic: &str, writer_id: u64) {
        {
            let Some(mut guard) = self.topics.get_mut(topic) else {
                return;
            };
            let state = &mut *guard;
            let Some(pos) = state.writers.iter().position(|w| w.id == writer_id) else {
                return;
            };
            let writer = state.writers.remove(pos);
            for reader in &state.readers {
                if writer.qos.is_compatible_with(&reader.qos) {
                    reader.queue.push(Sample {
                        topic: Arc::clone(&state.name),
                        writer_id,
                        sequence: 0,
                        payload: Arc::from(Vec::new()),
                        kind: SampleKind::WriterGone,
                    });
                }
            }
        }
        tracing::debug!("[LocalDomain {}] writer {} left '{}'", self.domain_id, writer_id, topic);
        self.prune_topic(topic);
    }

    fn remove_reader(&self, topic: &str, reader_id: u64) {
        if let Some(mut state) = self.topics.get_mut(topic) {
            state.readers.retain(|r| r.id != reader_id);
        }
        self.prune_topic(topic);
    }

    /// Forget a topic once its last endpoint is gone.
    ///
    /// Must be called without holding a guard on `topics`.
    fn prune_topic(&self, topic: &str) {
        if self
            .topics
            .remove_if(topic, |_, state| {
                state.writers.is_empty() && state.readers.is_empty()
            })
            .is_some()
        {
            tracing::trace!("[LocalDomain {}] topic '{}' pruned", self.domain_id, topic);
        }
    }

    /// Number of topics with at least one endpoint (or registered and not yet used).
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Number of live writers on a topic.
    pub fn writer_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|t| t.writers.len()).unwrap_or(0)
    }

    /// Number of live readers on a topic.
    pub fn reader_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|t| t.readers.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for DomainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainState")
            .field("domain_id", &self.domain_id)
            .field("topic_count", &self.topics.len())
            .finish()
    }
}

/// Global domain registry (singleton)
pub struct DomainRegistry {
    domains: Mutex<HashMap<DomainId, Weak<DomainState>>>,
}

impl DomainRegistry {
    fn new() -> Self {
        Self {
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Get the global registry instance
    pub fn global() -> &'static DomainRegistry {
        use std::sync::OnceLock;
        static REGISTRY: OnceLock<DomainRegistry> = OnceLock::new();
        REGISTRY.get_or_init(DomainRegistry::new)
    }

    /// Get or create domain state for a domain ID.
    ///
    /// The state lives as long as somebody holds the returned `Arc`.
    pub fn get_or_create(&self, domain_id: DomainId) -> Arc<DomainState> {
        let mut domains = self.domains.lock();

        if let Some(strong) = domains.get(&domain_id).and_then(Weak::upgrade) {
            return strong;
        }

        let state = Arc::new(DomainState::new(domain_id));
        domains.insert(domain_id, Arc::downgrade(&state));
        tracing::debug!("[DomainRegistry] Created domain state for domain_id={}", domain_id);
        state
    }

    /// Existing domain state, if still alive.
    pub fn get(&self, domain_id: DomainId) -> Option<Arc<DomainState>> {
        self.domains.lock().get(&domain_id).and_then(Weak::upgrade)
    }
}

/// In-process [`Transport`] backed by a [`DomainState`].
#[derive(Debug, Clone)]
pub struct LocalTransport {
    domain: Arc<DomainState>,
}

impl LocalTransport {
    /// Attach to the process-global state of `domain_id`.
    pub fn new(domain_id: DomainId) -> Self {
        Self {
            domain: DomainRegistry::global().get_or_create(domain_id),
        }
    }

    /// Use a private domain state (isolated from the global registry).
    pub fn with_state(domain: Arc<DomainState>) -> Self {
        Self { domain }
    }

    /// Underlying domain state.
    pub fn state(&self) -> &Arc<DomainState> {
        &self.domain
    }
}

impl Transport for LocalTransport {
    fn domain_id(&self) -> u32 {
        self.domain.domain_id
    }

    fn register_topic(&self, topic: &str, type_name: &str) -> Result<()> {
        self.domain.register_topic(topic, type_name)
    }

    fn create_writer(&self, topic: &str, type_name: &str, qos: &QoS) -> Result<Box<dyn RawWriter>> {
        Ok(Box::new(self.domain.add_writer(topic, type_name, qos)?))
    }

    fn create_reader(&self, topic: &str, type_name: &str, qos: &QoS) -> Result<Box<dyn RawReader>> {
        Ok(Box::new(self.domain.add_reader(topic, type_name, qos)?))
    }
}

struct LocalWriter {
    domain: Arc<DomainState>,
    topic: Arc<str>,
    id: u64,
}

impl RawWriter for LocalWriter {
    fn write(&self, payload: &[u8]) -> Result<()> {
        self.domain.write(&self.topic, self.id, payload)
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for LocalWriter {
    fn drop(&mut self) {
        self.domain.remove_writer(&self.topic, self.id);
    }
}

struct LocalReader {
    domain: Arc<DomainState>,
    topic: Arc<str>,
    id: u64,
    queue: Arc<ReaderQueue>,
}

impl RawReader for LocalReader {
    fn take(&self) -> Result<Vec<Sample>> {
        Ok(self.queue.drain())
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for LocalReader {
    fn drop(&mut self) {
        self.domain.remove_reader(&self.topic, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private_transport() -> LocalTransport {
        LocalTransport::with_state(Arc::new(DomainState::new(0)))
    }

    fn payloads(samples: &[Sample]) -> Vec<Vec<u8>> {
        samples.iter().map(|s| s.payload.to_vec()).collect()
    }

    #[test]
    fn test_live_delivery() {
        let transport = private_transport();
        let reader = transport
            .create_reader("t", "T", &QoS::best_effort().keep_last(10))
            .expect("reader");
        let writer = transport
            .create_writer("t", "T", &QoS::best_effort())
            .expect("writer");

        writer.write(&[1]).expect("write");
        writer.write(&[2]).expect("write");

        let samples = reader.take().expect("take");
        assert_eq!(payloads(&samples), vec![vec![1], vec![2]]);
        assert_eq!(samples[1].sequence, 2);
        assert!(reader.take().expect("take").is_empty());
    }

    #[test]
    fn test_type_mismatch() {
        let transport = private_transport();
        transport.register_topic("t", "A").expect("register");
        assert!(matches!(
            transport.create_writer("t", "B", &QoS::reliable()),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_reliability_mismatch_not_delivered() {
        let transport = private_transport();
        let reader = transport
            .create_reader("t", "T", &QoS::reliable())
            .expect("reader");
        let writer = transport
            .create_writer("t", "T", &QoS::best_effort())
            .expect("writer");
        writer.write(&[1]).expect("write");
        assert!(reader.take().expect("take").is_empty());
    }

    #[test]
    fn test_transient_local_late_joiner() {
        let transport = private_transport();
        let writer = transport
            .create_writer("t", "T", &QoS::reliable().transient_local().keep_last(2))
            .expect("writer");
        for i in 1..=3u8 {
            writer.write(&[i]).expect("write");
        }

        let late = transport
            .create_reader("t", "T", &QoS::reliable().transient_local().keep_all())
            .expect("reader");
        assert_eq!(payloads(&late.take().expect("take")), vec![vec![2], vec![3]]);

        // Volatile readers get no history
        let volatile = transport
            .create_reader("t", "T", &QoS::reliable())
            .expect("reader");
        assert!(volatile.take().expect("take").is_empty());
    }

    #[test]
    fn test_writer_drop_retracts() {
        let transport = private_transport();
        let writer = transport
            .create_writer("t", "T", &QoS::reliable().transient_local())
            .expect("writer");
        writer.write(&[7]).expect("write");
        let reader = transport
            .create_reader("t", "T", &QoS::reliable().transient_local())
            .expect("reader");
        let writer_id = writer.id();
        drop(writer);

        let samples = reader.take().expect("take");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].kind, SampleKind::WriterGone);
        assert_eq!(samples[1].writer_id, writer_id);
        assert_eq!(transport.state().writer_count("t"), 0);

        let late = transport
            .create_reader("t", "T", &QoS::reliable().transient_local())
            .expect("reader");
        assert!(late.take().expect("take").is_empty());
    }

    #[test]
    fn test_reader_depth_drops_oldest() {
        let transport = private_transport();
        let reader = transport
            .create_reader("t", "T", &QoS::best_effort().keep_last(2))
            .expect("reader");
        let writer = transport
            .create_writer("t", "T", &QoS::best_effort())
            .expect("writer");
        for i in 1..=5u8 {
            writer.write(&[i]).expect("write");
        }
        assert_eq!(payloads(&reader.take().expect("take")), vec![vec![4], vec![5]]);
    }

    #[test]
    fn test_topics_pruned_after_last_endpoint() {
        let transport = private_transport();
        for serial in 0..50 {
            let topic = format!("realsense/D435/{}/notification", serial);
            let writer = transport
                .create_writer(&topic, "T", &QoS::reliable().transient_local())
                .expect("writer");
            let reader = transport
                .create_reader(&topic, "T", &QoS::reliable())
                .expect("reader");
            assert_eq!(transport.state().topic_count(), 1);
            drop(reader);
            assert_eq!(transport.state().topic_count(), 1);
            drop(writer);
        }
        assert_eq!(transport.state().topic_count(), 0);

        // A pruned topic can be rebound to another type
        let writer = transport
            .create_writer("realsense/D435/0/notification", "Other", &QoS::reliable())
            .expect("writer");
        assert_eq!(writer.topic(), "realsense/D435/0/notification");
    }

    #[test]
    fn test_registry_shares_domain_state() {
        let a = LocalTransport::new(231);
        let b = LocalTransport::new(231);
        assert!(Arc::ptr_eq(a.state(), b.state()));
        assert_eq!(a.domain_id(), 231);
        assert!(DomainRegistry::global().get(231).is_some());
    }
}
