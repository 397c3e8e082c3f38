//! Gossipsub wrapper for the overlay's broadcast room.
//!
//! The room carries sealed payloads only; membership and topic
//! subscription are handled here, message flow by the relay.
//! Messages exceeding [`MAX_ROOM_MESSAGE_SIZE`] are rejected to
//! prevent gossip flooding.

use libp2p::gossipsub;
use libp2p::identity;

use hushnet_types::{HushnetError, Result};

/// Maximum allowed room message size (64 KiB).
pub const MAX_ROOM_MESSAGE_SIZE: usize = 65_536;

/// Builds a configured `gossipsub::Behaviour` with the Hushnet
/// defaults.
///
/// Messages are signed with the node identity
/// (`MessageAuthenticity::Signed`), so the inbound sender id comes
/// from the authenticated message source rather than the forwarding
/// peer.
///
/// # Errors
///
/// Returns `HushnetError::NetworkError` if the gossipsub config is
/// invalid (should not happen with hardcoded values).
pub fn build_room_behaviour(keypair: &identity::Keypair) -> Result<gossipsub::Behaviour> {
    let config = gossipsub::ConfigBuilder::default()
        .max_transmit_size(MAX_ROOM_MESSAGE_SIZE)
        .build()
        .map_err(|e| HushnetError::NetworkError {
            reason: format!("failed to build gossipsub config: {e}"),
        })?;

    gossipsub::Behaviour::new(
        gossipsub::MessageAuthenticity::Signed(keypair.clone()),
        config,
    )
    .map_err(|e| HushnetError::NetworkError {
        reason: format!("failed to create gossipsub behaviour: {e}"),
    })
}

/// Creates a gossipsub [`gossipsub::IdentTopic`] from a topic name.
pub fn topic(name: &str) -> gossipsub::IdentTopic {
    gossipsub::IdentTopic::new(name)
}

/// Publishes a payload to the room topic.
///
/// # Errors
///
/// Returns [`HushnetError::NetworkError`] if the payload exceeds
/// [`MAX_ROOM_MESSAGE_SIZE`] or publishing fails (including the
/// no-connected-peers case — outbound delivery is best-effort).
pub fn publish(
    behaviour: &mut gossipsub::Behaviour,
    topic: &gossipsub::IdentTopic,
    payload: Vec<u8>,
) -> Result<()> {
    if payload.len() > MAX_ROOM_MESSAGE_SIZE {
        return Err(HushnetError::NetworkError {
            reason: format!(
                "room payload size {} exceeds maximum {}",
                payload.len(),
                MAX_ROOM_MESSAGE_SIZE,
            ),
        });
    }

    behaviour
        .publish(topic.clone(), payload)
        .map(|_| ())
        .map_err(|e| HushnetError::NetworkError {
            reason: format!("room publish failed: {e}"),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behaviour_builds_with_signing_identity() {
        let keypair = identity::Keypair::generate_ed25519();
        assert!(build_room_behaviour(&keypair).is_ok());
    }

    #[test]
    fn oversized_payload_rejected() {
        let keypair = identity::Keypair::generate_ed25519();
        let mut behaviour = build_room_behaviour(&keypair).expect("behaviour must build");
        let t = topic("test-room");

        let oversized = vec![0u8; MAX_ROOM_MESSAGE_SIZE + 1];
        assert!(publish(&mut behaviour, &t, oversized).is_err());
    }

    #[test]
    fn topics_with_same_name_hash_identically() {
        assert_eq!(topic("room-a").hash(), topic("room-a").hash());
        assert_ne!(topic("room-a").hash(), topic("room-b").hash());
    }
}
