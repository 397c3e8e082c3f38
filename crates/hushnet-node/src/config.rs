//! Node configuration.
//!
//! Immutable after construction — the [`crate::node::Node`] owns its
//! config and nothing mutates it once the node starts.

use std::fmt;
use std::sync::Arc;

use hushnet_crypto::sealer::{AeadSealer, Sealer};
use hushnet_network::config::NetworkConfig;
use hushnet_types::{HushnetError, Result};

use crate::handler::PeerGater;

/// Default number of digits in the intermediate OTP value.
pub const DEFAULT_SEAL_KEY_LENGTH: usize = 32;

/// Default seal key rotation interval in seconds.
pub const DEFAULT_SEAL_KEY_INTERVAL_SECS: u64 = 600;

/// Configuration bundle for a Hushnet node.
///
/// Cheap to clone — the sealer and peer gater are shared handles.
#[derive(Clone)]
pub struct NodeConfig {
    /// Shared exchange secret from which seal keys are derived. All
    /// nodes in the same overlay must agree on it.
    pub exchange_secret: String,

    /// Digit count of the intermediate OTP value. Affects the derived
    /// key, not its size.
    pub seal_key_length: usize,

    /// Seal key rotation interval in seconds.
    pub seal_key_interval_secs: u64,

    /// Overlay network configuration.
    pub network: NetworkConfig,

    /// The sealer implementation applied to every room payload.
    pub sealer: Arc<dyn Sealer>,

    /// Optional application-level gating policy applied to already
    /// connected peers' messages before unsealing.
    pub peer_gater: Option<Arc<dyn PeerGater>>,
}

impl NodeConfig {
    /// Creates a configuration with the given exchange secret and
    /// defaults everywhere else (AEAD sealer, no peer gater).
    pub fn new(exchange_secret: impl Into<String>) -> Self {
        Self {
            exchange_secret: exchange_secret.into(),
            seal_key_length: DEFAULT_SEAL_KEY_LENGTH,
            seal_key_interval_secs: DEFAULT_SEAL_KEY_INTERVAL_SECS,
            network: NetworkConfig::default(),
            sealer: Arc::new(AeadSealer),
            peer_gater: None,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HushnetError::ConfigError`] on an empty secret, a
    /// zero seal key length/interval, or an invalid network section.
    pub fn validate(&self) -> Result<()> {
        if self.exchange_secret.is_empty() {
            return Err(HushnetError::ConfigError {
                reason: "exchange_secret must not be empty".into(),
            });
        }
        if self.seal_key_length == 0 {
            return Err(HushnetError::ConfigError {
                reason: "seal_key_length must be greater than 0".into(),
            });
        }
        if self.seal_key_interval_secs == 0 {
            return Err(HushnetError::ConfigError {
                reason: "seal_key_interval_secs must be greater than 0".into(),
            });
        }
        self.network.validate()
    }
}

impl fmt::Debug for NodeConfig {
    /// The exchange secret is redacted — it must never reach logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("exchange_secret", &"<redacted>")
            .field("seal_key_length", &self.seal_key_length)
            .field("seal_key_interval_secs", &self.seal_key_interval_secs)
            .field("network", &self.network)
            .field("peer_gater", &self.peer_gater.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(NodeConfig::new("s3cr3t").validate().is_ok());
    }

    #[test]
    fn empty_secret_rejected() {
        assert!(NodeConfig::new("").validate().is_err());
    }

    #[test]
    fn zero_key_length_rejected() {
        let config = NodeConfig {
            seal_key_length: 0,
            ..NodeConfig::new("s3cr3t")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let config = NodeConfig {
            seal_key_interval_secs: 0,
            ..NodeConfig::new("s3cr3t")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let config = NodeConfig::new("very-secret-value");
        let dump = format!("{config:?}");
        assert!(!dump.contains("very-secret-value"));
        assert!(dump.contains("<redacted>"));
    }
}
