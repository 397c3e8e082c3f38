//! The Sealer capability: symmetric seal/unseal of message payloads.
//!
//! The relay does not assume a specific cipher — any implementation of
//! [`Sealer`] can be plugged into the node configuration. The default
//! [`AeadSealer`] uses XChaCha20-Poly1305 with 192-bit nonces; the
//! nonce is generated from OS entropy per seal and prefixed to the
//! ciphertext, and the whole unit travels hex-encoded so it fits the
//! room's string payloads.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

use hushnet_types::{HushnetError, Result};

use crate::hash::sha3_256;

/// Byte length of the XChaCha20-Poly1305 nonce.
const NONCE_LEN: usize = 24;

/// Byte length of the Poly1305 authentication tag.
const TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Sealer
// ---------------------------------------------------------------------------

/// Capability for sealing and unsealing room payloads under a derived
/// rotating key.
///
/// For every conforming implementation, `unseal(seal(m, k), k) == m`
/// must hold for any payload `m` and key `k`.
pub trait Sealer: Send + Sync {
    /// Encrypts `plaintext` under `key`, returning the sealed payload.
    fn seal(&self, plaintext: &str, key: &str) -> Result<String>;

    /// Decrypts a sealed payload under `key`, returning the plaintext.
    fn unseal(&self, sealed: &str, key: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// AeadSealer
// ---------------------------------------------------------------------------

/// Default [`Sealer`]: XChaCha20-Poly1305 AEAD.
///
/// The key string is compressed to 32 bytes with SHA3-256, so keys of
/// any length are accepted. Wire format: `hex(nonce || ciphertext)`
/// where the ciphertext carries the appended 16-byte Poly1305 tag.
#[derive(Clone, Copy, Debug, Default)]
pub struct AeadSealer;

impl AeadSealer {
    fn cipher(key: &str) -> XChaCha20Poly1305 {
        let key_bytes = sha3_256(key.as_bytes());
        XChaCha20Poly1305::new(Key::from_slice(&key_bytes))
    }
}

impl Sealer for AeadSealer {
    fn seal(&self, plaintext: &str, key: &str) -> Result<String> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = Self::cipher(key)
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| HushnetError::CryptoError {
                reason: format!("XChaCha20-Poly1305 seal failed: {e}"),
            })?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(hex::encode(sealed))
    }

    fn unseal(&self, sealed: &str, key: &str) -> Result<String> {
        let raw = hex::decode(sealed).map_err(|e| HushnetError::CryptoError {
            reason: format!("sealed payload is not valid hex: {e}"),
        })?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(HushnetError::CryptoError {
                reason: format!(
                    "sealed payload too short: {} bytes, need at least {}",
                    raw.len(),
                    NONCE_LEN + TAG_LEN,
                ),
            });
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = Self::cipher(key)
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|e| HushnetError::CryptoError {
                reason: format!("XChaCha20-Poly1305 unseal failed: {e}"),
            })?;

        String::from_utf8(plaintext).map_err(|e| HushnetError::CryptoError {
            reason: format!("unsealed payload is not valid UTF-8: {e}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
