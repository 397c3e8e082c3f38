//! Time-windowed seal key derivation.
//!
//! Every node sharing the same exchange secret derives the same seal
//! key for the duration of one rotation interval, with no handshake
//! beyond coarse wall-clock agreement. The derivation is a counter-mode
//! one-time password (HMAC-SHA256 with RFC-4226-style dynamic
//! truncation, extended blockwise to the requested digit count) whose
//! counter is `unix_time / interval`. The raw OTP value is then passed
//! through SHA3-256 and hex-encoded so the final key has a constant
//! size regardless of the configured OTP length.
//!
//! There is deliberately no caching and no ±1-interval tolerance: a
//! message sealed a few seconds before an interval boundary fails to
//! unseal a few seconds after it. That soft reliability loss is an
//! accepted trade-off of the handshake-free design.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use hushnet_types::{HushnetError, Result};

use crate::hash::sha3_256;

type HmacSha256 = Hmac<Sha256>;

/// Decimal digits contributed by one truncated HMAC block.
const DIGITS_PER_BLOCK: usize = 8;

// ---------------------------------------------------------------------------
// SealKey
// ---------------------------------------------------------------------------

/// Ephemeral symmetric seal key, valid for one rotation interval.
///
/// Derived per call and never persisted or cached; the relay recomputes
/// it on every seal and unseal. Zeroized when dropped.
#[derive(Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct SealKey(String);

impl SealKey {
    /// Returns the key material as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// SealKey does not implement Clone/Debug/Display to prevent leakage.

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Computes the raw counter-mode OTP value for a given wall-clock time.
///
/// The value is stable for the duration of one `interval_secs` window
/// and changes deterministically at window boundaries. `length` is the
/// number of decimal digits in the result.
///
/// # Errors
///
/// Returns [`HushnetError::ConfigError`] if `length` or `interval_secs`
/// is zero, [`HushnetError::CryptoError`] if HMAC initialisation fails.
pub fn time_otp(
    secret: &str,
    length: usize,
    interval_secs: u64,
    unix_secs: u64,
) -> Result<String> {
    if length == 0 {
        return Err(HushnetError::ConfigError {
            reason: "OTP length must be greater than 0".into(),
        });
    }
    if interval_secs == 0 {
        return Err(HushnetError::ConfigError {
            reason: "OTP interval must be greater than 0".into(),
        });
    }

    let counter = unix_secs / interval_secs;

    let mut digits = String::with_capacity(length + DIGITS_PER_BLOCK);
    let mut block: u32 = 0;
    while digits.len() < length {
        let code = truncated_code(secret.as_bytes(), counter, block)?;
        digits.push_str(&format!("{:0width$}", code, width = DIGITS_PER_BLOCK));
        block += 1;
    }
    digits.truncate(length);
    Ok(digits)
}

/// Derives the seal key for a given wall-clock time.
///
/// The OTP value (§[`time_otp`]) is hashed with SHA3-256 and
/// hex-encoded, producing a constant 64-character key regardless of
/// the configured OTP `length`.
pub fn seal_key_at(
    secret: &str,
    length: usize,
    interval_secs: u64,
    unix_secs: u64,
) -> Result<SealKey> {
    let otp = time_otp(secret, length, interval_secs, unix_secs)?;
    Ok(SealKey(hex::encode(sha3_256(otp.as_bytes()))))
}

/// Derives the seal key for the current system time.
///
/// Callers invoke this on every seal/unseal — the key is never cached,
/// so rotation takes effect mid-flight by design.
pub fn current_seal_key(secret: &str, length: usize, interval_secs: u64) -> Result<SealKey> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| HushnetError::CryptoError {
            reason: format!("system clock is before the Unix epoch: {e}"),
        })?
        .as_secs();
    seal_key_at(secret, length, interval_secs, now)
}

/// One HMAC block with dynamic truncation: HMAC-SHA256 over
/// `counter || block_index`, truncated per RFC 4226 to a 31-bit code
/// reduced to [`DIGITS_PER_BLOCK`] decimal digits.
fn truncated_code(secret: &[u8], counter: u64, block: u32) -> Result<u32> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| {
        HushnetError::CryptoError {
            reason: format!("HMAC-SHA256 key init failed: {e}"),
        }
    })?;
    mac.update(&counter.to_be_bytes());
    mac.update(&block.to_be_bytes());
    let tag = mac.finalize().into_bytes();

    let offset = (tag[tag.len() - 1] & 0x0f) as usize;
    let code = u32::from_be_bytes([
        tag[offset] & 0x7f,
        tag[offset + 1],
        tag[offset + 2],
        tag[offset + 3],
    ]);
    Ok(code % 10u32.pow(DIGITS_PER_BLOCK as u32))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cr3t";
    const LENGTH: usize = 16;
    const INTERVAL: u64 = 60;

    #[test]
    fn stable_within_one_interval() -> Result<()> {
        // Both times fall inside the window [1200, 1260).
        let k1 = seal_key_at(SECRET, LENGTH, INTERVAL, 1_200)?;
        let k2 = seal_key_at(SECRET, LENGTH, INTERVAL, 1_259)?;
        assert_eq!(k1, k2);
        Ok(())
    }

    #[test]
    fn rotates_at_interval_boundary() -> Result<()> {
        let before = seal_key_at(SECRET, LENGTH, INTERVAL, 1_259)?;
        let after = seal_key_at(SECRET, LENGTH, INTERVAL, 1_260)?;
        assert_ne!(before, after);
        Ok(())
    }

    #[test]
    fn identical_across_nodes_sharing_parameters() -> Result<()> {
        // Two "nodes" with the same secret/length/interval and coarse
        // clock agreement derive the same key.
        let node_a = seal_key_at(SECRET, LENGTH, INTERVAL, 5_000)?;
        let node_b = seal_key_at(SECRET, LENGTH, INTERVAL, 5_003)?;
        assert_eq!(node_a, node_b);
        Ok(())
    }

    #[test]
    fn different_secrets_differ() -> Result<()> {
        let a = seal_key_at("alpha", LENGTH, INTERVAL, 1_000)?;
        let b = seal_key_at("bravo", LENGTH, INTERVAL, 1_000)?;
        assert_ne!(a, b);
        Ok(())
    }

    #[test]
    fn length_changes_intermediate_value_not_key_size() -> Result<()> {
        let short = seal_key_at(SECRET, 8, INTERVAL, 1_000)?;
        let long = seal_key_at(SECRET, 40, INTERVAL, 1_000)?;
        // Different OTP lengths produce different keys...
        assert_ne!(short, long);
        // ...but the final key size is constant (SHA3-256 hex).
        assert_eq!(short.as_str().len(), 64);
        assert_eq!(long.as_str().len(), 64);
        Ok(())
    }

    #[test]
    fn otp_has_requested_digit_count() -> Result<()> {
        for length in [1, 8, 9, 16, 40] {
            let otp = time_otp(SECRET, length, INTERVAL, 1_000)?;
            assert_eq!(otp.len(), length);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
        Ok(())
    }

    #[test]
    fn zero_length_rejected() {
        assert!(time_otp(SECRET, 0, INTERVAL, 1_000).is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        assert!(time_otp(SECRET, LENGTH, 0, 1_000).is_err());
    }

    #[test]
    fn current_key_matches_explicit_time() -> Result<()> {
        // A huge interval keeps "now" and the explicit timestamp in the
        // same window, so the two derivations must agree.
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| HushnetError::CryptoError {
                reason: e.to_string(),
            })?
            .as_secs();
        let explicit = seal_key_at(SECRET, LENGTH, u64::MAX / 2, now)?;
        let current = current_seal_key(SECRET, LENGTH, u64::MAX / 2)?;
        assert_eq!(explicit, current);
        Ok(())
    }
}
