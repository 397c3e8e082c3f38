//! Cryptographic primitives for the Hushnet secure overlay.
//!
//! This crate is the **sole** location for all cryptographic operations.
//! No other crate in the workspace may perform raw crypto directly.
//!
//! # Modules
//!
//! - [`otp`] — time-windowed seal key derivation (counter-mode OTP)
//! - [`sealer`] — the Sealer capability and the default AEAD implementation
//! - [`hash`] — SHA3-256 hashing

pub mod hash;
pub mod otp;
pub mod sealer;
