// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by every realdds entity.

use thiserror::Error;

/// Errors returned by realdds operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Participant / transport
    // ========================================================================
    /// Domain ID out of range (0-232).
    #[error("Invalid domain_id: {0} (must be 0-232)")]
    InvalidDomainId(u32),

    /// Topic already registered with another type.
    #[error("Type mismatch on topic '{topic}': registered as '{registered}', requested '{requested}'")]
    TypeMismatch {
        topic: String,
        registered: String,
        requested: String,
    },

    /// The transport refused to create an endpoint or to send a sample.
    #[error("Transport error: {0}")]
    Transport(String),

    // ========================================================================
    // Broadcaster
    // ========================================================================
    /// Broadcaster used before `run()` succeeded.
    #[error("Device broadcaster is not running")]
    BroadcasterNotRunning,

    /// Two bridged devices resolved to the same topic root.
    #[error("Topic root '{0}' is already in use by another device")]
    TopicRootCollision(String),

    // ========================================================================
    // Device server
    // ========================================================================
    /// Device server used before `init()`.
    #[error("Device server '{0}' is not initialized")]
    NotInitialized(String),

    /// `init()` called a second time.
    #[error("Device server '{0}' is already initialized")]
    AlreadyInitialized(String),

    /// Initialization messages queued out of order.
    #[error("Initialization order violated: {0}")]
    InitOrder(String),

    /// Streaming requested before the device header and every profile group were queued.
    #[error("Initialization of '{0}' is incomplete")]
    InitIncomplete(String),

    /// Stream name not declared at `init()`.
    #[error("Unknown stream '{0}'")]
    UnknownStream(String),

    /// Frame published on an idle stream.
    #[error("Stream '{0}' is not started")]
    StreamNotStarted(String),

    /// Frame payload does not match the stream's image header.
    #[error("Frame size mismatch on '{stream}': expected {expected} bytes, got {actual}")]
    FrameSizeMismatch {
        stream: String,
        expected: usize,
        actual: usize,
    },

    // ========================================================================
    // Messages
    // ========================================================================
    /// Group name longer than its fixed-capacity field.
    #[error("Group name '{name}' exceeds {capacity} bytes")]
    GroupNameTooLong { name: String, capacity: usize },

    /// Profile group holds more entries than the wire format allows.
    #[error("Too many profiles in group: {count} (max {capacity})")]
    TooManyProfiles { count: usize, capacity: usize },

    /// Unknown message discriminant.
    #[error("Unknown message id {0}")]
    UnknownMessageId(u16),

    /// Unknown format / stream type discriminant.
    #[error("Invalid {what} value {value}")]
    InvalidEnum { what: &'static str, value: u8 },

    /// Truncated or malformed binary message.
    #[error("Decode error: {0}")]
    Decode(#[from] std::io::Error),

    /// Malformed JSON message.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Subscriber side
    // ========================================================================
    /// Remote device used before `run()`.
    #[error("Device '{0}' is not running")]
    NotRunning(String),

    /// Timed out waiting for remote state.
    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

/// Convenient alias for realdds results.
pub type Result<T> = core::result::Result<T, Error>;
