//! Node identity: Ed25519 keypair generation.
//!
//! By default the keypair comes from OS entropy. A deterministic seed
//! can be configured for reproducible test deployments — the same seed
//! always yields the same `PeerId`.

use libp2p::identity::Keypair;
use libp2p::PeerId;

use hushnet_crypto::hash::sha3_256;
use hushnet_types::{HushnetError, Result};

/// Generates the node's Ed25519 identity keypair.
///
/// With `seed = None` the keypair is drawn from a cryptographically
/// secure random source. With a seed, the 32-byte Ed25519 secret is
/// expanded from the seed with SHA3-256 — an explicit determinism
/// escape hatch for tests and reproducible deployments, not a security
/// default.
pub fn generate_keypair(seed: Option<u64>) -> Result<Keypair> {
    match seed {
        None => Ok(Keypair::generate_ed25519()),
        Some(seed) => {
            tracing::info!(seed, "deriving node identity from deterministic seed");
            let mut secret = sha3_256(&seed.to_be_bytes());
            Keypair::ed25519_from_bytes(&mut secret).map_err(|e| {
                HushnetError::NetworkError {
                    reason: format!("failed to build Ed25519 keypair from seed: {e}"),
                }
            })
        }
    }
}

/// Extracts the `PeerId` from a keypair.
///
/// Convenience wrapper — equivalent to `PeerId::from(keypair.public())`.
pub fn peer_id_from_keypair(keypair: &Keypair) -> PeerId {
    PeerId::from(keypair.public())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
