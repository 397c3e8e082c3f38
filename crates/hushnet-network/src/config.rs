//! Network configuration for the Hushnet overlay layer.
//!
//! This config lives in `hushnet-network` rather than `hushnet-types`
//! to avoid pulling `libp2p::Multiaddr` into the shared types crate.

use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};

use hushnet_types::{HushnetError, Result};

// ---------------------------------------------------------------------------
// DiscoveryStrategy
// ---------------------------------------------------------------------------

/// A peer discovery / advertisement strategy.
///
/// Each configured strategy contributes its behaviour to the host at
/// build time; strategies are independent and can be combined.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DiscoveryStrategy {
    /// Multicast-DNS discovery on the local network.
    Mdns,
    /// Kademlia DHT discovery seeded from bootstrap nodes.
    Kademlia {
        /// DHT protocol name for network isolation,
        /// e.g. `/hushnet/kad/1.0.0`. Must start with `/`.
        protocol: String,
        /// Bootstrap node multiaddrs. Entries should carry a
        /// `/p2p/<peer_id>` component so their routing-table slot is
        /// known up front.
        #[serde(with = "multiaddr_vec_serde")]
        bootstrap: Vec<Multiaddr>,
    },
}

// ---------------------------------------------------------------------------
// NetworkConfig
// ---------------------------------------------------------------------------

/// Overlay network configuration.
///
/// Read-only after the host is built. Controls listening addresses,
/// connection admission rules, the broadcast room, discovery, and
/// low-level transport options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Multiaddrs on which this node listens for incoming connections.
    ///
    /// Default: `/ip4/0.0.0.0/tcp/0` (OS-assigned port on all
    /// interfaces). Address groups from outer configuration layers are
    /// flattened into this single list.
    #[serde(with = "multiaddr_vec_serde")]
    pub listen_addresses: Vec<Multiaddr>,

    /// Admission blocklist entries. Each entry is either a CIDR subnet
    /// (e.g. `10.0.0.0/24`) or, when CIDR parsing fails, a literal
    /// peer identifier.
    pub blacklist: Vec<String>,

    /// This node's own virtual interface address in CIDR form
    /// (e.g. `10.1.0.1/24`). When non-empty, the subnet is blocked so
    /// the node never dials itself back through the virtual interface.
    /// Empty string disables the self-block.
    pub interface_address: String,

    /// Disable transport-layer security (plaintext connections).
    ///
    /// Only for controlled/test deployments. Logged at warn level when
    /// the host is built.
    pub insecure: bool,

    /// Deterministic identity seed.
    ///
    /// When set, the node identity keypair is derived from this seed
    /// instead of OS entropy — an explicit reproducibility escape
    /// hatch for tests, never a security default.
    pub key_seed: Option<u64>,

    /// Discovery strategies to enable.
    pub discovery: Vec<DiscoveryStrategy>,

    /// Name of the broadcast room topic the node joins.
    pub room_topic: String,

    /// Seconds before an idle connection is closed by the swarm.
    /// Applied as a fallback default, last in the option chain.
    pub idle_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        // Construct the default listen address without parsing to avoid
        // expect()/unwrap() per project rules.
        let mut listen = Multiaddr::empty();
        listen.push(Protocol::Ip4(std::net::Ipv4Addr::UNSPECIFIED));
        listen.push(Protocol::Tcp(0));

        Self {
            listen_addresses: vec![listen],
            blacklist: Vec::new(),
            interface_address: String::new(),
            insecure: false,
            key_seed: None,
            discovery: vec![DiscoveryStrategy::Mdns],
            room_topic: "hushnet".into(),
            idle_timeout_secs: 60,
        }
    }
}

impl NetworkConfig {
    /// Validates all configuration values.
    ///
    /// Returns `Err(HushnetError::ConfigError)` if any value is outside
    /// its acceptable range.
    pub fn validate(&self) -> Result<()> {
        if self.listen_addresses.is_empty() {
            return Err(HushnetError::ConfigError {
                reason: "at least one listen address is required".into(),
            });
        }
        if self.room_topic.is_empty() {
            return Err(HushnetError::ConfigError {
                reason: "room_topic must not be empty".into(),
            });
        }
        if self.idle_timeout_secs == 0 {
            return Err(HushnetError::ConfigError {
                reason: "idle_timeout_secs must be greater than 0".into(),
            });
        }
        for strategy in &self.discovery {
            if let DiscoveryStrategy::Kademlia { protocol, .. } = strategy {
                if !protocol.starts_with('/') {
                    return Err(HushnetError::ConfigError {
                        reason: format!("DHT protocol '{protocol}' must start with '/'"),
                    });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Serde helpers — Multiaddr does not implement Serialize/Deserialize
// ---------------------------------------------------------------------------

mod multiaddr_vec_serde {
    use libp2p::Multiaddr;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(addrs: &[Multiaddr], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(addrs.len()))?;
        for addr in addrs {
            seq.serialize_element(&addr.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<Multiaddr>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let strings: Vec<String> = Vec::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| s.parse().map_err(serde::de::Error::custom))
            .collect()
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
        assert!(NetworkConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_listen_addresses_rejected() {
        let config = NetworkConfig {
            listen_addresses: Vec::new(),
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_room_topic_rejected() {
        let config = NetworkConfig {
            room_topic: String::new(),
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_idle_timeout_rejected() {
        let config = NetworkConfig {
            idle_timeout_secs: 0,
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn dht_protocol_without_slash_rejected() {
        let config = NetworkConfig {
            discovery: vec![DiscoveryStrategy::Kademlia {
                protocol: "hushnet/kad/1.0.0".into(),
                bootstrap: Vec::new(),
            }],
            ..NetworkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_serde_json_roundtrip() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let config = NetworkConfig {
            blacklist: vec!["10.0.0.0/24".into(), "QmBadPeer".into()],
            interface_address: "10.1.0.1/24".into(),
            ..NetworkConfig::default()
        };
        let json = serde_json::to_string(&config)?;
        let parsed: NetworkConfig = serde_json::from_str(&json)?;
        assert_eq!(parsed.blacklist, config.blacklist);
        assert_eq!(parsed.listen_addresses, config.listen_addresses);
        Ok(())
    }
}
