//! SHA3-256 hashing.
//!
//! All fixed-output hashing in Hushnet uses SHA3-256 (Keccak).

use sha3::{Digest, Sha3_256};

/// Computes the SHA3-256 hash of arbitrary data.
///
/// Returns a fixed 32-byte digest. Deterministic: identical inputs
/// always produce identical outputs.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha3_is_deterministic() {
        assert_eq!(sha3_256(b"hushnet"), sha3_256(b"hushnet"));
    }

    #[test]
    fn different_inputs_different_digests() {
        assert_ne!(sha3_256(b"a"), sha3_256(b"b"));
    }

    #[test]
    fn empty_input_hashes() {
        // SHA3-256 of the empty string, well-known vector.
        let digest = sha3_256(b"");
        assert_eq!(
            hex::encode(digest),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }
}
