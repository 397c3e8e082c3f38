//! Hushnet libp2p overlay layer.
//!
//! Provides identity management, connection admission, the broadcast
//! room, and host construction for the Hushnet secure overlay.
//!
//! # Architecture
//!
//! - [`identity`] — Ed25519 keypair generation (with a deterministic
//!   escape hatch for reproducible test deployments)
//! - [`admission`] — peer/subnet blocklist consulted at connection time
//! - [`room`] — gossipsub behaviour and topic helpers
//! - [`host`] — ordered host assembly and the running [`host::OverlayHost`]
//! - [`config`] — network configuration with defaults

pub mod admission;
pub mod config;
pub mod host;
pub mod identity;
pub mod room;
