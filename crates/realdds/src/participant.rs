// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain participant: entry point to a domain and factory for endpoints.

use crate::domain::{LocalTransport, MAX_DOMAIN_ID};
use crate::qos::QoS;
use crate::transport::{RawReader, RawWriter, Transport};
use crate::{Error, Result};
use std::sync::Arc;

/// Entry point to a domain.
///
/// ```rust
/// use realdds::Participant;
///
/// let participant = Participant::builder("rs-dds-server").domain_id(0).build()?;
/// assert_eq!(participant.domain_id(), 0);
/// # Ok::<(), realdds::Error>(())
/// ```
pub struct Participant {
    name: String,
    transport: Arc<dyn Transport>,
}

impl Participant {
    /// Start configuring a participant.
    pub fn builder(name: &str) -> ParticipantBuilder {
        ParticipantBuilder {
            name: name.to_string(),
            domain_id: 0,
            transport: None,
        }
    }

    /// Participant name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Domain the participant belongs to.
    pub fn domain_id(&self) -> u32 {
        self.transport.domain_id()
    }

    /// Declare a topic type.
    pub fn register_topic(&self, topic: &str, type_name: &str) -> Result<()> {
        self.transport.register_topic(topic, type_name)
    }

    /// Create a raw writer.
    pub fn create_writer(
        &self,
        topic: &str,
        type_name: &str,
        qos: QoS,
    ) -> Result<Box<dyn RawWriter>> {
        self.transport.create_writer(topic, type_name, &qos)
    }

    /// Create a raw reader.
    pub fn create_reader(
        &self,
        topic: &str,
        type_name: &str,
        qos: QoS,
    ) -> Result<Box<dyn RawReader>> {
        self.transport.create_reader(topic, type_name, &qos)
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("domain_id", &self.domain_id())
            .finish()
    }
}

/// Builder for [`Participant`].
pub struct ParticipantBuilder {
    name: String,
    domain_id: u32,
    transport: Option<Arc<dyn Transport>>,
}

impl ParticipantBuilder {
    /// Set the domain ID (0-232).
    pub fn domain_id(mut self, domain_id: u32) -> Self {
        self.domain_id = domain_id;
        self
    }

    /// Use a specific transport instead of the in-process domain.
    ///
    /// The transport's own domain ID wins over `domain_id()`.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the participant.
    pub fn build(self) -> Result<Participant> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                if self.domain_id > MAX_DOMAIN_ID {
                    return Err(Error::InvalidDomainId(self.domain_id));
                }
                Arc::new(LocalTransport::new(self.domain_id))
            }
        };
        if transport.domain_id() > MAX_DOMAIN_ID {
            return Err(Error::InvalidDomainId(transport.domain_id()));
        }

        tracing::debug!(
            "Participant '{}' joined domain {}",
            self.name,
            transport.domain_id()
        );
        Ok(Participant {
            name: self.name,
            transport,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_domain_rejected() {
        let result = Participant::builder("p").domain_id(233).build();
        assert!(matches!(result, Err(Error::InvalidDomainId(233))));
    }

    #[test]
    fn test_valid_domain_edges() {
        for domain in [0, 232] {
            let participant = Participant::builder("p")
                .domain_id(domain)
                .build()
                .expect("participant");
            assert_eq!(participant.domain_id(), domain);
            assert_eq!(participant.name(), "p");
        }
    }
}
