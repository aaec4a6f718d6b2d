// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS policies understood by the realdds transport seam.
//!
//! Only the three policies the bridge relies on are modelled:
//! reliability, durability and history.

/// Reliability policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    BestEffort,
    Reliable,
}

/// Durability policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    Volatile,
    TransientLocal,
}

impl Durability {
    /// Ordering used for writer/reader compatibility.
    pub fn rank(self) -> u8 {
        match self {
            Self::Volatile => 0,
            Self::TransientLocal => 1,
        }
    }
}

/// History policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum History {
    KeepLast(u32),
    KeepAll,
}

impl History {
    /// Maximum number of retained samples (`None` = unbounded).
    pub fn depth(self) -> Option<usize> {
        match self {
            Self::KeepLast(depth) => Some(depth.max(1) as usize),
            Self::KeepAll => None,
        }
    }
}

/// Aggregated QoS profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QoS {
    pub reliability: Reliability,
    pub durability: Durability,
    pub history: History,
}

impl QoS {
    /// BestEffort, volatile, keep-last(1).
    pub fn best_effort() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            durability: Durability::Volatile,
            history: History::KeepLast(1),
        }
    }

    /// Reliable, volatile, keep-last(100).
    pub fn reliable() -> Self {
        Self {
            reliability: Reliability::Reliable,
            durability: Durability::Volatile,
            history: History::KeepLast(100),
        }
    }

    /// Set KEEP_LAST history depth.
    pub fn keep_last(mut self, depth: u32) -> Self {
        self.history = History::KeepLast(depth);
        self
    }

    /// Set KEEP_ALL history policy.
    pub fn keep_all(mut self) -> Self {
        self.history = History::KeepAll;
        self
    }

    /// Set volatile durability.
    pub fn volatile(mut self) -> Self {
        self.durability = Durability::Volatile;
        self
    }

    /// Set transient-local durability.
    pub fn transient_local(mut self) -> Self {
        self.durability = Durability::TransientLocal;
        self
    }

    /// Whether a writer offering `self` can serve a reader requesting `requested`.
    ///
    /// - Reliable writer -> any reader
    /// - BestEffort writer -> BestEffort reader only
    /// - Writer durability must be at least the reader's
    pub fn is_compatible_with(&self, requested: &QoS) -> bool {
        let reliability_ok = match (self.reliability, requested.reliability) {
            (Reliability::Reliable, _) => true,
            (Reliability::BestEffort, Reliability::BestEffort) => true,
            (Reliability::BestEffort, Reliability::Reliable) => false,
        };
        reliability_ok && self.durability.rank() >= requested.durability.rank()
    }
}

impl Default for QoS {
    fn default() -> Self {
        Self::reliable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let qos = QoS::reliable().transient_local().keep_all();
        assert_eq!(qos.reliability, Reliability::Reliable);
        assert_eq!(qos.durability, Durability::TransientLocal);
        assert_eq!(qos.history.depth(), None);
        assert_eq!(QoS::best_effort().keep_last(0).history.depth(), Some(1));
    }

    #[test]
    fn test_compatibility() {
        let be = QoS::best_effort();
        let rel = QoS::reliable();
        assert!(rel.is_compatible_with(&be));
        assert!(!be.is_compatible_with(&rel));
        assert!(!rel.is_compatible_with(&rel.transient_local()));
        assert!(rel.transient_local().is_compatible_with(&rel));
    }
}
