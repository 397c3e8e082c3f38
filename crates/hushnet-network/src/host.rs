//! Host assembly and the running overlay host.
//!
//! [`build_host`] performs the order-sensitive construction sequence:
//! identity, admission gate, behaviours, transport security, fallback
//! defaults, listeners, room subscription. Failure at any step aborts
//! the whole build — nothing external is started before the final
//! step, so there is no partial-host state to clean up.
//!
//! [`OverlayHost`] wraps the resulting swarm and exposes one-event
//! polling for use inside `tokio::select!`, gate-checked connection
//! handling, and best-effort room publishing.

use std::time::Duration;

use futures::StreamExt;
use libp2p::kad::store::MemoryStore;
use libp2p::swarm::behaviour::toggle::Toggle;
use libp2p::swarm::{NetworkBehaviour, SwarmEvent};
use libp2p::{
    allow_block_list, gossipsub, identify, kad, mdns, noise, plaintext, tcp, yamux, Multiaddr,
    PeerId, StreamProtocol, Swarm, SwarmBuilder,
};

use hushnet_types::{HushnetError, Result as HushnetResult, RoomMessage};

use crate::admission::{multiaddr_ip, AdmissionGate};
use crate::config::{DiscoveryStrategy, NetworkConfig};
use crate::identity;
use crate::room;

/// Identify protocol version advertised to peers.
const IDENTIFY_PROTOCOL: &str = "/hushnet/id/1.0.0";

// ---------------------------------------------------------------------------
// Combined behaviour
// ---------------------------------------------------------------------------

/// Combined libp2p behaviour for the Hushnet overlay.
///
/// Composes:
/// - `gossipsub::Behaviour` — the broadcast room.
/// - `identify::Behaviour` — peer address learning.
/// - `Toggle<mdns>` / `Toggle<kad>` — discovery strategies, enabled
///   per configuration.
/// - `allow_block_list` — transport-level denial of blocked peers,
///   mirrored from the [`AdmissionGate`].
#[derive(NetworkBehaviour)]
pub struct OverlayBehaviour {
    /// Pub/sub room carrying sealed payloads.
    pub gossip: gossipsub::Behaviour,
    /// Peer info exchange.
    pub identify: identify::Behaviour,
    /// LAN discovery, enabled by [`DiscoveryStrategy::Mdns`].
    pub mdns: Toggle<mdns::tokio::Behaviour>,
    /// DHT discovery, enabled by [`DiscoveryStrategy::Kademlia`].
    pub kademlia: Toggle<kad::Behaviour<MemoryStore>>,
    /// Blocked-peer enforcement at the transport layer.
    pub blocked: allow_block_list::Behaviour<allow_block_list::BlockedPeers>,
}

// ---------------------------------------------------------------------------
// HostEvent
// ---------------------------------------------------------------------------

/// Application-visible events surfaced by [`OverlayHost::poll`].
#[derive(Clone, Debug)]
pub enum HostEvent {
    /// A message arrived on the room topic. The sender id is the
    /// authenticated gossipsub source, falling back to the forwarding
    /// peer when unsigned.
    InboundMessage(RoomMessage),
    /// A listener finished binding.
    NewListenAddr(Multiaddr),
    /// A connection to a peer was admitted and established.
    PeerConnected(PeerId),
    /// The last connection to a peer closed.
    PeerDisconnected(PeerId),
}

// ---------------------------------------------------------------------------
// Host construction
// ---------------------------------------------------------------------------

/// Builds the overlay host from the network configuration.
///
/// Steps, order-sensitive (later options must never override earlier
/// explicit choices):
/// 1. Identity keypair — OS entropy, or seeded when
///    `config.key_seed` is set.
/// 2. Admission gate — self-subnet + blacklist rules applied before
///    any behaviour references the gate.
/// 3. Behaviours and transport — discovery strategies contribute
///    their behaviours; `insecure` swaps Noise for plaintext security
///    (logged at warn; the QUIC listener is omitted in that branch as
///    it cannot run without TLS).
/// 4. Fallback defaults (idle connection timeout) last, then
///    listeners and room subscription.
///
/// # Errors
///
/// Any failing step (invalid config, keypair, behaviour, transport,
/// listen address) aborts the build with the propagated error.
pub fn build_host(config: &NetworkConfig) -> HushnetResult<OverlayHost> {
    config.validate()?;

    let keypair = identity::generate_keypair(config.key_seed)?;
    let gate = AdmissionGate::from_rules(&config.blacklist, &config.interface_address);

    let idle = Duration::from_secs(config.idle_timeout_secs);
    let swarm = if config.insecure {
        tracing::warn!("disabling security transport layer (plaintext connections)");
        SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                tcp::Config::default().nodelay(true),
                |key: &libp2p::identity::Keypair| -> std::result::Result<
                    plaintext::Config,
                    std::convert::Infallible,
                > { Ok(plaintext::Config::new(key)) },
                yamux::Config::default,
            )
            .map_err(|e| HushnetError::NetworkError {
                reason: format!("failed to configure plaintext TCP transport: {e}"),
            })?
            .with_behaviour(|key| {
                build_behaviour(key, config, &gate)
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            })
            .map_err(|e| HushnetError::NetworkError {
                reason: format!("failed to build overlay behaviour: {e}"),
            })?
            .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(idle))
            .build()
    } else {
        SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                tcp::Config::default().nodelay(true),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| HushnetError::NetworkError {
                reason: format!("failed to configure TCP transport: {e}"),
            })?
            .with_quic()
            .with_behaviour(|key| {
                build_behaviour(key, config, &gate)
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
            })
            .map_err(|e| HushnetError::NetworkError {
                reason: format!("failed to build overlay behaviour: {e}"),
            })?
            .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(idle))
            .build()
    };

    let mut host = OverlayHost {
        local_peer_id: *swarm.local_peer_id(),
        topic: room::topic(&config.room_topic),
        swarm,
        gate,
    };

    for addr in &config.listen_addresses {
        host.swarm
            .listen_on(addr.clone())
            .map_err(|e| HushnetError::NetworkError {
                reason: format!("failed to listen on {addr}: {e}"),
            })?;
    }

    host.swarm
        .behaviour_mut()
        .gossip
        .subscribe(&host.topic)
        .map_err(|e| HushnetError::NetworkError {
            reason: format!("failed to subscribe room topic: {e}"),
        })?;

    Ok(host)
}

/// Assembles the combined behaviour. Discovery strategies each
/// contribute their component; absent strategies leave the toggle
/// disabled.
fn build_behaviour(
    key: &libp2p::identity::Keypair,
    config: &NetworkConfig,
    gate: &AdmissionGate,
) -> HushnetResult<OverlayBehaviour> {
    let local_peer_id = PeerId::from(key.public());

    let gossip = room::build_room_behaviour(key)?;

    let identify = identify::Behaviour::new(identify::Config::new(
        IDENTIFY_PROTOCOL.into(),
        key.public(),
    ));

    let mut mdns_behaviour = None;
    let mut kad_behaviour = None;
    for strategy in &config.discovery {
        match strategy {
            DiscoveryStrategy::Mdns => {
                let behaviour =
                    mdns::tokio::Behaviour::new(mdns::Config::default(), local_peer_id)
                        .map_err(|e| HushnetError::NetworkError {
                            reason: format!("failed to create mDNS behaviour: {e}"),
                        })?;
                mdns_behaviour = Some(behaviour);
            }
            DiscoveryStrategy::Kademlia {
                protocol,
                bootstrap,
            } => {
                let proto = StreamProtocol::try_from_owned(protocol.clone()).map_err(|e| {
                    HushnetError::ConfigError {
                        reason: format!("invalid DHT protocol name '{protocol}': {e}"),
                    }
                })?;
                let mut kad_config = kad::Config::default();
                kad_config.set_protocol_names(vec![proto]);
                let mut behaviour = kad::Behaviour::with_config(
                    local_peer_id,
                    MemoryStore::new(local_peer_id),
                    kad_config,
                );
                for addr in bootstrap {
                    match peer_id_component(addr) {
                        Some(peer) => {
                            behaviour.add_address(&peer, addr.clone());
                        }
                        None => tracing::warn!(
                            %addr,
                            "bootstrap address has no /p2p component, skipping"
                        ),
                    }
                }
                kad_behaviour = Some(behaviour);
            }
        }
    }

    let mut blocked = allow_block_list::Behaviour::default();
    for id in gate.blocked_peer_ids() {
        match id.parse::<PeerId>() {
            Ok(peer) => blocked.block_peer(peer),
            // Non-PeerId entries stay textual in the gate and are
            // enforced by the connection check in `poll`.
            Err(_) => tracing::debug!(id, "blocklist entry is not a libp2p peer id"),
        }
    }

    Ok(OverlayBehaviour {
        gossip,
        identify,
        mdns: Toggle::from(mdns_behaviour),
        kademlia: Toggle::from(kad_behaviour),
        blocked,
    })
}

/// Extracts the trailing `/p2p/<peer_id>` component of a multiaddr.
fn peer_id_component(addr: &Multiaddr) -> Option<PeerId> {
    addr.iter().find_map(|p| match p {
        libp2p::multiaddr::Protocol::P2p(peer) => Some(peer),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// OverlayHost
// ---------------------------------------------------------------------------

/// The running overlay host: swarm, admission gate, and room topic.
///
/// Exclusively owned by its node; dropped on shutdown.
pub struct OverlayHost {
    swarm: Swarm<OverlayBehaviour>,
    gate: AdmissionGate,
    topic: gossipsub::IdentTopic,
    local_peer_id: PeerId,
}

impl OverlayHost {
    /// Returns the local `PeerId`.
    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    /// Returns the addresses the host is currently listening on.
    pub fn listeners(&self) -> Vec<Multiaddr> {
        self.swarm.listeners().cloned().collect()
    }

    /// Returns the currently connected peers.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.swarm.connected_peers().cloned().collect()
    }

    /// Read access to the admission gate.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Blocks an additional peer identifier.
    ///
    /// Entries that parse as libp2p peer ids are also mirrored into
    /// the transport-level blocklist behaviour.
    pub fn block_peer(&mut self, id: &str) {
        self.gate.block_peer(id);
        if let Ok(peer) = id.parse::<PeerId>() {
            self.swarm.behaviour_mut().blocked.block_peer(peer);
        }
    }

    /// Blocks an additional CIDR subnet.
    pub fn block_subnet(&mut self, cidr: &str) -> HushnetResult<()> {
        self.gate.block_subnet(cidr)
    }

    /// Dials a remote peer.
    pub fn dial(&mut self, addr: Multiaddr) -> HushnetResult<()> {
        self.swarm.dial(addr).map_err(|e| HushnetError::NetworkError {
            reason: format!("failed to dial peer: {e}"),
        })
    }

    /// Initiates a Kademlia bootstrap, when DHT discovery is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`HushnetError::NetworkError`] if no bootstrap peers are
    /// known yet; callers typically log and retry later.
    pub fn bootstrap(&mut self) -> HushnetResult<()> {
        match self.swarm.behaviour_mut().kademlia.as_mut() {
            Some(kademlia) => kademlia
                .bootstrap()
                .map(|_| ())
                .map_err(|e| HushnetError::NetworkError {
                    reason: format!("DHT bootstrap failed: {e}"),
                }),
            None => Ok(()),
        }
    }

    /// Publishes a payload to the room topic. Best-effort: a failure
    /// (including no connected peers) is returned for the caller to
    /// log and drop — never retried here.
    pub fn publish(&mut self, payload: &[u8]) -> HushnetResult<()> {
        let topic = self.topic.clone();
        room::publish(
            &mut self.swarm.behaviour_mut().gossip,
            &topic,
            payload.to_vec(),
        )
    }

    /// Drives the swarm by one event.
    ///
    /// Designed for use inside `tokio::select!`. Connection admission
    /// is applied here: an established connection whose remote address
    /// or peer id the gate rejects is closed immediately. Returns an
    /// application-visible [`HostEvent`] when the event produced one.
    pub async fn poll(&mut self) -> Option<HostEvent> {
        match self.swarm.select_next_some().await {
            SwarmEvent::NewListenAddr { address, .. } => {
                tracing::info!(%address, "new listen address");
                Some(HostEvent::NewListenAddr(address))
            }

            SwarmEvent::ConnectionEstablished {
                peer_id,
                connection_id,
                endpoint,
                num_established,
                ..
            } => {
                let remote = endpoint.get_remote_address();
                if !self.gate.allow(multiaddr_ip(remote), &peer_id.to_string()) {
                    tracing::warn!(
                        %peer_id,
                        %remote,
                        "connection denied by admission gate, closing"
                    );
                    let _ = self.swarm.close_connection(connection_id);
                    return None;
                }
                tracing::debug!(
                    %peer_id,
                    %remote,
                    num_established = num_established.get(),
                    "connection established"
                );
                Some(HostEvent::PeerConnected(peer_id))
            }

            SwarmEvent::ConnectionClosed {
                peer_id,
                cause,
                num_established,
                ..
            } => {
                tracing::debug!(%peer_id, ?cause, num_established, "connection closed");
                if num_established == 0 {
                    Some(HostEvent::PeerDisconnected(peer_id))
                } else {
                    None
                }
            }

            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                tracing::warn!(?peer_id, %error, "outgoing connection error");
                None
            }

            SwarmEvent::IncomingConnectionError {
                send_back_addr,
                error,
                ..
            } => {
                tracing::warn!(%send_back_addr, %error, "incoming connection error");
                None
            }

            SwarmEvent::Behaviour(event) => self.handle_behaviour_event(event),

            other => {
                tracing::trace!(?other, "unhandled swarm event");
                None
            }
        }
    }

    fn handle_behaviour_event(&mut self, event: OverlayBehaviourEvent) -> Option<HostEvent> {
        match event {
            OverlayBehaviourEvent::Gossip(gossipsub::Event::Message {
                propagation_source,
                message,
                ..
            }) => {
                let sender = message
                    .source
                    .unwrap_or(propagation_source)
                    .to_string();
                let payload = String::from_utf8_lossy(&message.data).into_owned();
                Some(HostEvent::InboundMessage(RoomMessage::new(sender, payload)))
            }

            OverlayBehaviourEvent::Gossip(gossipsub::Event::Subscribed { peer_id, topic }) => {
                tracing::debug!(%peer_id, %topic, "peer subscribed to room");
                None
            }

            OverlayBehaviourEvent::Gossip(event) => {
                tracing::trace!(?event, "other gossipsub event");
                None
            }

            OverlayBehaviourEvent::Mdns(mdns::Event::Discovered(peers)) => {
                for (peer_id, addr) in peers {
                    tracing::info!(%peer_id, %addr, "mDNS: discovered peer");
                    if let Some(kademlia) = self.swarm.behaviour_mut().kademlia.as_mut() {
                        kademlia.add_address(&peer_id, addr.clone());
                    }
                    if let Err(e) = self.swarm.dial(addr) {
                        tracing::debug!(%peer_id, %e, "mDNS: dial failed (may already be connected)");
                    }
                }
                None
            }

            OverlayBehaviourEvent::Mdns(mdns::Event::Expired(peers)) => {
                for (peer_id, addr) in peers {
                    tracing::debug!(%peer_id, %addr, "mDNS: peer expired");
                }
                None
            }

            OverlayBehaviourEvent::Identify(identify::Event::Received {
                peer_id, info, ..
            }) => {
                tracing::debug!(
                    %peer_id,
                    agent_version = %info.agent_version,
                    "identify: received peer info"
                );
                if let Some(kademlia) = self.swarm.behaviour_mut().kademlia.as_mut() {
                    for addr in info.listen_addrs {
                        kademlia.add_address(&peer_id, addr);
                    }
                }
                None
            }

            OverlayBehaviourEvent::Identify(event) => {
                tracing::trace!(?event, "other identify event");
                None
            }

            OverlayBehaviourEvent::Kademlia(kad::Event::RoutingUpdated {
                peer, addresses, ..
            }) => {
                tracing::debug!(%peer, ?addresses, "DHT routing table updated");
                None
            }

            OverlayBehaviourEvent::Kademlia(event) => {
                tracing::trace!(?event, "other Kademlia event");
                None
            }

            _ => None,
        }
    }
}
