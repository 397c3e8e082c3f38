//! Node lifecycle.
//!
//! The [`Node`] is the public entry point for the Hushnet runtime. It
//! owns the overlay host, the admission gate inside it, the node
//! configuration, and the application ledger handle, and drives the
//! sealed relay.
//!
//! # State machine
//!
//! ```text
//! Initializing ──start()──▶ Running ──shutdown()──▶ ShuttingDown
//! ```
//!
//! - `Initializing` — host built and listening set up, relay not yet
//!   running; admission rules and dials may still be added.
//! - `Running` — relay and host driver tasks active.
//! - `ShuttingDown` — cancellation signalled, tasks joined.
//!
//! Double-start and shutdown-from-initializing are rejected. There is
//! no restart operation — one node per process lifetime.

use std::fmt;
use std::sync::{Arc, Mutex};

use libp2p::{Multiaddr, PeerId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use hushnet_network::host::{build_host, HostEvent, OverlayHost};
use hushnet_types::{HushnetError, Result, RoomMessage};

use crate::config::NodeConfig;
use crate::handler::{MessageHandler, OutboundSender};
use crate::relay::{ChannelPublisher, SealedRelay};

// ---------------------------------------------------------------------------
// NodeState
// ---------------------------------------------------------------------------

/// Lifecycle state of the node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeState {
    /// Host built, relay not started.
    Initializing,
    /// Relay and host driver active.
    Running,
    /// Shutdown signalled.
    ShuttingDown,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A Hushnet node: overlay host + admission gate + sealed relay +
/// ledger handle.
///
/// `L` is the application-state ledger type. The node never reads or
/// writes the ledger itself — it only passes the handle to the handler
/// chain.
pub struct Node<L> {
    state: NodeState,
    config: NodeConfig,
    ledger: Arc<L>,
    handlers: Vec<Arc<dyn MessageHandler<L>>>,

    /// The host, present until `start()` moves it into the driver task.
    host: Option<OverlayHost>,
    local_peer_id: PeerId,

    /// Bound listen addresses, filled in by the driver task as the
    /// swarm reports them.
    listeners: Arc<Mutex<Vec<Multiaddr>>>,

    outbound_tx: mpsc::UnboundedSender<RoomMessage>,
    outbound_rx: Option<mpsc::UnboundedReceiver<RoomMessage>>,

    shutdown_tx: watch::Sender<bool>,

    relay_handle: Option<JoinHandle<()>>,
    host_handle: Option<JoinHandle<()>>,
}

impl<L: Send + Sync + 'static> Node<L> {
    /// Builds a node: validates the configuration and constructs the
    /// overlay host (identity, admission gate, transport, listeners,
    /// room subscription).
    ///
    /// # Errors
    ///
    /// Any configuration or host construction failure aborts the build.
    pub fn new(
        config: NodeConfig,
        ledger: Arc<L>,
        handlers: Vec<Arc<dyn MessageHandler<L>>>,
    ) -> Result<Self> {
        config.validate()?;
        let host = build_host(&config.network)?;
        let local_peer_id = *host.local_peer_id();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);

        Ok(Self {
            state: NodeState::Initializing,
            config,
            ledger,
            handlers,
            host: Some(host),
            local_peer_id,
            listeners: Arc::new(Mutex::new(Vec::new())),
            outbound_tx,
            outbound_rx: Some(outbound_rx),
            shutdown_tx,
            relay_handle: None,
            host_handle: None,
        })
    }

    /// Returns the node's lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Returns the node's `PeerId`.
    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    /// Returns the listen addresses bound so far.
    ///
    /// Empty until the driver task has processed the swarm's listener
    /// events.
    pub fn listeners(&self) -> Vec<Multiaddr> {
        self.listeners
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    /// Returns a handle for enqueuing outbound messages.
    ///
    /// Usable before and after `start()` — messages enqueued early are
    /// buffered until the relay runs.
    pub fn sender(&self) -> OutboundSender {
        OutboundSender::new(self.outbound_tx.clone())
    }

    /// Blocks an additional peer identifier. Only valid before
    /// `start()` — the gate must be fully wired before traffic flows.
    pub fn block_peer(&mut self, id: &str) -> Result<()> {
        match self.host.as_mut() {
            Some(host) => {
                host.block_peer(id);
                Ok(())
            }
            None => Err(HushnetError::ConfigError {
                reason: "admission rules must be added before start".into(),
            }),
        }
    }

    /// Blocks an additional CIDR subnet. Only valid before `start()`.
    pub fn block_subnet(&mut self, cidr: &str) -> Result<()> {
        match self.host.as_mut() {
            Some(host) => host.block_subnet(cidr),
            None => Err(HushnetError::ConfigError {
                reason: "admission rules must be added before start".into(),
            }),
        }
    }

    /// Queues a dial to a remote peer. Only valid before `start()`;
    /// the dial proceeds once the driver task polls the swarm.
    pub fn connect(&mut self, addr: Multiaddr) -> Result<()> {
        match self.host.as_mut() {
            Some(host) => host.dial(addr),
            None => Err(HushnetError::ConfigError {
                reason: "connect must be called before start".into(),
            }),
        }
    }

    /// Starts the node: spawns the host driver and the sealed relay.
    ///
    /// # Errors
    ///
    /// Returns [`HushnetError::ConfigError`] on double start.
    pub fn start(&mut self) -> Result<()> {
        if self.state != NodeState::Initializing {
            return Err(HushnetError::ConfigError {
                reason: format!("node already started (state: {})", self.state),
            });
        }
        let host = self.host.take().ok_or_else(|| HushnetError::ConfigError {
            reason: "host already consumed".into(),
        })?;
        let outbound_rx = self
            .outbound_rx
            .take()
            .ok_or_else(|| HushnetError::ConfigError {
                reason: "outbound queue already consumed".into(),
            })?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();

        let relay = SealedRelay::new(
            &self.config,
            Arc::clone(&self.ledger),
            self.handlers.clone(),
            OutboundSender::new(self.outbound_tx.clone()),
        );
        self.relay_handle = Some(tokio::spawn(relay.run(
            outbound_rx,
            inbound_rx,
            ChannelPublisher::new(publish_tx),
            self.shutdown_tx.subscribe(),
        )));

        self.host_handle = Some(tokio::spawn(run_host_driver(
            host,
            publish_rx,
            inbound_tx,
            Arc::clone(&self.listeners),
            self.shutdown_tx.subscribe(),
        )));

        self.state = NodeState::Running;
        tracing::info!(peer_id = %self.local_peer_id, "node started");
        Ok(())
    }

    /// Signals cancellation and joins both tasks.
    ///
    /// # Errors
    ///
    /// Returns [`HushnetError::ConfigError`] when the node is not
    /// running.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state != NodeState::Running {
            return Err(HushnetError::ConfigError {
                reason: format!("node is not running (state: {})", self.state),
            });
        }
        self.state = NodeState::ShuttingDown;
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.relay_handle.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.host_handle.take() {
            let _ = handle.await;
        }

        tracing::info!("node shut down");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Host driver task
// ---------------------------------------------------------------------------

/// Drives the swarm and bridges it to the relay: inbound room messages
/// flow toward the relay, sealed publish requests flow from it. A
/// publish failure is logged and the message dropped — outbound
/// delivery is at-most-once.
async fn run_host_driver(
    mut host: OverlayHost,
    mut publish_rx: mpsc::UnboundedReceiver<RoomMessage>,
    inbound_tx: mpsc::UnboundedSender<RoomMessage>,
    listeners: Arc<Mutex<Vec<Multiaddr>>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // First DHT bootstrap attempt; deferred quietly when no bootstrap
    // peers are known yet.
    if let Err(e) = host.bootstrap() {
        tracing::debug!(%e, "DHT bootstrap deferred");
    }

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => break,
                    Ok(()) => {}
                    Err(_) => break,
                }
            }

            request = publish_rx.recv() => {
                match request {
                    Some(message) => {
                        if let Err(e) = host.publish(message.payload.as_bytes()) {
                            tracing::warn!(%e, "room publish failed, message dropped");
                        }
                    }
                    None => break,
                }
            }

            event = host.poll() => {
                match event {
                    Some(HostEvent::InboundMessage(message)) => {
                        if inbound_tx.send(message).is_err() {
                            tracing::debug!("relay stopped, stopping host driver");
                            break;
                        }
                    }
                    Some(HostEvent::NewListenAddr(addr)) => {
                        if let Ok(mut bound) = listeners.lock() {
                            bound.push(addr);
                        }
                    }
                    Some(HostEvent::PeerConnected(peer)) => {
                        tracing::info!(%peer, "peer connected");
                    }
                    Some(HostEvent::PeerDisconnected(peer)) => {
                        tracing::info!(%peer, "peer disconnected");
                    }
                    None => {}
                }
            }
        }
    }

    tracing::info!("host driver stopped");
}
