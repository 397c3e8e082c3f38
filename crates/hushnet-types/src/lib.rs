//! Core shared types for the Hushnet secure overlay.
//!
//! This crate defines the types used across the workspace. No other
//! crate should define shared types — everything lives here.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// RoomMessage
// ---------------------------------------------------------------------------

/// A message flowing through the overlay's broadcast room.
///
/// The same shape is used on both sides of the seal boundary: outbound
/// messages carry the plaintext payload until the relay seals them,
/// inbound messages carry the sealed payload until the relay unseals
/// them. Every transformation step clones the message first — no step
/// mutates a value another reader might still observe.
///
/// The [`Default`] value (both fields empty) is the no-op sentinel: the
/// relay ignores it without error on either input stream.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoomMessage {
    /// Identifier of the sending peer, as reported by the room layer.
    pub sender_id: String,
    /// Message payload. Plaintext or sealed depending on pipeline stage.
    pub payload: String,
}

impl RoomMessage {
    /// Creates a message from a sender id and payload.
    pub fn new(sender_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            payload: payload.into(),
        }
    }

    /// Returns `true` for the no-op sentinel (all fields empty).
    pub fn is_sentinel(&self) -> bool {
        self.sender_id.is_empty() && self.payload.is_empty()
    }
}

impl fmt::Display for RoomMessage {
    /// Displays the sender and payload size only. Payload content is
    /// never rendered — it must not reach logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.sender_id, self.payload.len())
    }
}

// ---------------------------------------------------------------------------
// HushnetError
// ---------------------------------------------------------------------------

/// Central error type for the Hushnet workspace.
///
/// All crates convert their internal errors into variants of this enum,
/// ensuring a unified error handling surface.
#[derive(Debug, Error)]
pub enum HushnetError {
    /// A configuration value is invalid or missing.
    #[error("config error: {reason}")]
    ConfigError {
        /// Human-readable description of the configuration problem.
        reason: String,
    },

    /// A cryptographic operation failed (key derivation, seal, unseal).
    #[error("crypto error: {reason}")]
    CryptoError {
        /// Human-readable description of the cryptographic failure.
        reason: String,
    },

    /// A networking or transport operation failed.
    #[error("network error: {reason}")]
    NetworkError {
        /// Human-readable description of the network failure.
        reason: String,
    },

    /// A relay pipeline operation failed (publish, handler dispatch).
    #[error("relay error: {reason}")]
    RelayError {
        /// Human-readable description of the relay failure.
        reason: String,
    },

    /// A virtual network adapter operation failed.
    #[error("adapter error: {reason}")]
    AdapterError {
        /// Human-readable description of the adapter failure.
        reason: String,
    },
}

/// Convenience result type using [`HushnetError`].
pub type Result<T> = std::result::Result<T, HushnetError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_message_is_sentinel() {
        assert!(RoomMessage::default().is_sentinel());
    }

    #[test]
    fn message_with_sender_is_not_sentinel() {
        assert!(!RoomMessage::new("QmPeer", "").is_sentinel());
    }

    #[test]
    fn message_with_payload_is_not_sentinel() {
        assert!(!RoomMessage::new("", "data").is_sentinel());
    }

    #[test]
    fn display_hides_payload_content() {
        let m = RoomMessage::new("QmPeer", "top secret");
        let shown = m.to_string();
        assert!(shown.contains("QmPeer"));
        assert!(!shown.contains("top secret"));
    }

    #[test]
    fn message_serde_json_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let m = RoomMessage::new("QmPeer", "payload");
        let json = serde_json::to_string(&m)?;
        let parsed: RoomMessage = serde_json::from_str(&json)?;
        assert_eq!(m, parsed);
        Ok(())
    }

    #[test]
    fn error_display_includes_reason() {
        let err = HushnetError::ConfigError {
            reason: "interval must be non-zero".into(),
        };
        assert!(err.to_string().contains("interval must be non-zero"));
    }
}
