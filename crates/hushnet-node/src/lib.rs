//! Hushnet node runtime.
//!
//! Binds the overlay host, the admission gate, and the sealed relay
//! into one [`node::Node`] with a channel-based API.
//!
//! # Architecture
//!
//! - [`config`] — node configuration (secret, seal key parameters,
//!   sealer, optional peer gater)
//! - [`handler`] — the message handler chain contract and the
//!   outbound feedback-loop handle
//! - [`relay`] — the sealed relay event loop
//! - [`node`] — lifecycle: host construction, task spawning, shutdown

pub mod config;
pub mod handler;
pub mod node;
pub mod relay;
