//! Connection admission: peer and subnet blocklists.
//!
//! The [`AdmissionGate`] is consulted before any inbound or outbound
//! connection is kept. It is populated during host construction and
//! read-only afterwards — a peer or subnet once blocked stays blocked
//! for the node's lifetime; there is no unblock operation.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;
use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;

use hushnet_types::{HushnetError, Result};

// ---------------------------------------------------------------------------
// AdmissionGate
// ---------------------------------------------------------------------------

/// Blocklist of peer identifiers and IP subnets.
///
/// Peer identifiers are held as strings so that blacklist entries which
/// are not valid libp2p `PeerId`s still match textually; entries that
/// do parse are additionally mirrored into the swarm's blocked-peers
/// behaviour at host build time.
#[derive(Clone, Debug, Default)]
pub struct AdmissionGate {
    blocked_peers: HashSet<String>,
    blocked_subnets: Vec<IpNet>,
}

impl AdmissionGate {
    /// Creates an empty gate that admits everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a gate from the configured blacklist and the node's own
    /// interface address.
    ///
    /// Each blacklist entry is first parsed as a CIDR subnet; on parse
    /// failure the literal string is blocked as a peer identifier. A
    /// non-empty `interface_address` is always additionally blocked as
    /// a subnet so the node never dials itself back through the virtual
    /// interface; if it fails to parse, the failure is logged at warn
    /// level and no self-block is applied (fail-open, never silent).
    pub fn from_rules(blacklist: &[String], interface_address: &str) -> Self {
        let mut gate = Self::new();

        if !interface_address.is_empty() {
            if let Err(e) = gate.block_subnet(interface_address) {
                tracing::warn!(
                    address = interface_address,
                    %e,
                    "self interface address is not a valid CIDR, self-block skipped"
                );
            }
        }

        for entry in blacklist {
            if gate.block_subnet(entry).is_err() {
                // Not a CIDR — assume it's a peer identifier.
                gate.block_peer(entry.clone());
            }
        }

        gate
    }

    /// Blocks a peer identifier.
    pub fn block_peer(&mut self, id: impl Into<String>) {
        self.blocked_peers.insert(id.into());
    }

    /// Blocks a CIDR subnet.
    ///
    /// # Errors
    ///
    /// Returns [`HushnetError::ConfigError`] if `cidr` does not parse.
    pub fn block_subnet(&mut self, cidr: &str) -> Result<()> {
        let net: IpNet = cidr.parse().map_err(|e| HushnetError::ConfigError {
            reason: format!("invalid CIDR '{cidr}': {e}"),
        })?;
        self.blocked_subnets.push(net);
        Ok(())
    }

    /// Returns whether a connection from `remote` claiming `peer_id`
    /// is admitted.
    ///
    /// A connection is denied if the peer identifier is blocked or the
    /// remote address falls inside any blocked subnet. A connection
    /// with no resolvable IP (e.g. a relayed address) is judged on the
    /// peer identifier alone.
    pub fn allow(&self, remote: Option<IpAddr>, peer_id: &str) -> bool {
        if self.blocked_peers.contains(peer_id) {
            return false;
        }
        if let Some(ip) = remote {
            if self.blocked_subnets.iter().any(|net| net.contains(&ip)) {
                return false;
            }
        }
        true
    }

    /// Iterates the blocked peer identifiers (for mirroring into the
    /// transport-level blocklist behaviour).
    pub fn blocked_peer_ids(&self) -> impl Iterator<Item = &str> {
        self.blocked_peers.iter().map(String::as_str)
    }

    /// Number of blocked subnets.
    pub fn blocked_subnet_count(&self) -> usize {
        self.blocked_subnets.len()
    }
}

/// Extracts the IP address component from a multiaddr, if any.
pub fn multiaddr_ip(addr: &Multiaddr) -> Option<IpAddr> {
    addr.iter().find_map(|p| match p {
        Protocol::Ip4(ip) => Some(IpAddr::V4(ip)),
        Protocol::Ip6(ip) => Some(IpAddr::V6(ip)),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().expect("test address must parse")
    }

    #[test]
    fn blocked_subnet_rejects_inside_accepts_outside() -> Result<()> {
        let mut gate = AdmissionGate::new();
        gate.block_subnet("10.0.0.0/24")?;

        assert!(!gate.allow(Some(ip("10.0.0.7")), "QmPeer"));
        assert!(!gate.allow(Some(ip("10.0.0.254")), "QmPeer"));
        assert!(gate.allow(Some(ip("10.0.1.1")), "QmPeer"));
        assert!(gate.allow(Some(ip("192.168.0.1")), "QmPeer"));
        Ok(())
    }

    #[test]
    fn blocked_peer_rejected_regardless_of_address() {
        let mut gate = AdmissionGate::new();
        gate.block_peer("Qm123");

        assert!(!gate.allow(Some(ip("1.2.3.4")), "Qm123"));
        assert!(!gate.allow(None, "Qm123"));
        assert!(gate.allow(Some(ip("1.2.3.4")), "Qm456"));
    }

    #[test]
    fn invalid_cidr_rejected() {
        let mut gate = AdmissionGate::new();
        assert!(gate.block_subnet("not-a-subnet").is_err());
        assert!(gate.block_subnet("10.0.0.1").is_err()); // bare IP, no prefix
    }

    #[test]
    fn rules_treat_unparseable_entries_as_peer_ids() {
        let blacklist = vec!["10.0.0.0/24".to_string(), "QmBadPeer".to_string()];
        let gate = AdmissionGate::from_rules(&blacklist, "");

        assert!(!gate.allow(Some(ip("10.0.0.9")), "QmGood"));
        assert!(!gate.allow(Some(ip("8.8.8.8")), "QmBadPeer"));
        assert!(gate.allow(Some(ip("8.8.8.8")), "QmGood"));
        assert_eq!(gate.blocked_subnet_count(), 1);
    }

    #[test]
    fn self_interface_subnet_is_blocked() {
        let gate = AdmissionGate::from_rules(&[], "10.1.0.1/24");
        assert!(!gate.allow(Some(ip("10.1.0.2")), "QmPeer"));
        assert!(gate.allow(Some(ip("10.2.0.2")), "QmPeer"));
    }

    #[test]
    fn malformed_self_address_skips_self_block() {
        // Fail-open: the gate still works, nothing is blocked.
        let gate = AdmissionGate::from_rules(&[], "bogus");
        assert_eq!(gate.blocked_subnet_count(), 0);
        assert!(gate.allow(Some(ip("10.1.0.2")), "QmPeer"));
    }

    #[test]
    fn ipv6_subnets_supported() -> Result<()> {
        let mut gate = AdmissionGate::new();
        gate.block_subnet("fd00::/8")?;
        assert!(!gate.allow(Some(ip("fd12::1")), "QmPeer"));
        assert!(gate.allow(Some(ip("2001:db8::1")), "QmPeer"));
        Ok(())
    }

    #[test]
    fn multiaddr_ip_extraction() {
        let addr: Multiaddr = "/ip4/10.0.0.1/tcp/4001".parse().expect("must parse");
        assert_eq!(multiaddr_ip(&addr), Some(ip("10.0.0.1")));

        let dns: Multiaddr = "/dns4/example.com/tcp/4001".parse().expect("must parse");
        assert_eq!(multiaddr_ip(&dns), None);
    }
}
