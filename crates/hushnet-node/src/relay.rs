//! The sealed relay: the node's central event loop.
//!
//! Consumes two message streams — the internal outbound queue and the
//! inbound room stream — seals/unseals payloads under the current
//! rotating key, applies peer gating, and drives the handler chain.
//! Handlers may enqueue new outbound messages, re-entering the loop.
//!
//! The relay has two states: running (inside [`SealedRelay::run`]) and
//! stopped (the terminal state reached when `run` returns). There is
//! no restart — a new relay must be constructed to resume, which is
//! why `run` consumes the relay.
//!
//! Every error inside the loop is transient by design: seal, unseal,
//! publish, key derivation, and handler failures are logged and the
//! offending message is dropped. The relay never terminates because of
//! a single bad message. Outbound delivery is at-most-once,
//! best-effort — publish failures are never retried here.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use hushnet_crypto::otp::current_seal_key;
use hushnet_crypto::sealer::Sealer;
use hushnet_types::{HushnetError, Result, RoomMessage};

use crate::config::NodeConfig;
use crate::handler::{MessageHandler, OutboundSender, PeerGater};

// ---------------------------------------------------------------------------
// RoomPublisher
// ---------------------------------------------------------------------------

/// Outbound publication seam.
///
/// Production uses [`ChannelPublisher`] to hand sealed messages to the
/// host driver task; tests substitute recording implementations.
pub trait RoomPublisher: Send {
    /// Publishes a sealed message to the room.
    fn publish(&mut self, message: &RoomMessage) -> Result<()>;
}

/// Forwards sealed messages to the host driver over a channel.
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<RoomMessage>,
}

impl ChannelPublisher {
    /// Wraps the sending half of the host driver's publish channel.
    pub fn new(tx: mpsc::UnboundedSender<RoomMessage>) -> Self {
        Self { tx }
    }
}

impl RoomPublisher for ChannelPublisher {
    fn publish(&mut self, message: &RoomMessage) -> Result<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| HushnetError::RelayError {
                reason: "host publish channel is closed".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// SealedRelay
// ---------------------------------------------------------------------------

/// The sealed relay event loop.
///
/// One relay runs per node, on its own tokio task. It is cooperative
/// and single-threaded within itself: one event at a time, handlers
/// invoked synchronously, suspension only while waiting for the next
/// event. Messages are processed in per-source order; there is no
/// ordering guarantee between the outbound and inbound sources.
pub struct SealedRelay<L> {
    exchange_secret: String,
    seal_key_length: usize,
    seal_key_interval_secs: u64,
    sealer: Arc<dyn Sealer>,
    peer_gater: Option<Arc<dyn PeerGater>>,
    handlers: Vec<Arc<dyn MessageHandler<L>>>,
    ledger: Arc<L>,
    outbound: OutboundSender,
}

impl<L: Send + Sync + 'static> SealedRelay<L> {
    /// Creates a relay from the node configuration.
    ///
    /// `outbound` is the same handle handed to handlers, closing the
    /// feedback loop: a handler-enqueued message re-enters `run` on
    /// the outbound path.
    pub fn new(
        config: &NodeConfig,
        ledger: Arc<L>,
        handlers: Vec<Arc<dyn MessageHandler<L>>>,
        outbound: OutboundSender,
    ) -> Self {
        Self {
            exchange_secret: config.exchange_secret.clone(),
            seal_key_length: config.seal_key_length,
            seal_key_interval_secs: config.seal_key_interval_secs,
            sealer: Arc::clone(&config.sealer),
            peer_gater: config.peer_gater.clone(),
            handlers,
            ledger,
            outbound,
        }
    }

    /// Runs the relay until cancellation.
    ///
    /// Waits on the outbound queue, the inbound room stream, and the
    /// cancellation signal; whichever is ready first is serviced. The
    /// select is biased toward cancellation: once the signal fires, no
    /// further publication or dispatch happens, even for messages
    /// already buffered. A closed input channel also stops the loop —
    /// the source it fed from is gone.
    pub async fn run(
        self,
        mut outbound_rx: mpsc::UnboundedReceiver<RoomMessage>,
        mut inbound_rx: mpsc::UnboundedReceiver<RoomMessage>,
        mut publisher: impl RoomPublisher,
        mut cancel: watch::Receiver<bool>,
    ) {
        tracing::info!("sealed relay started");

        loop {
            tokio::select! {
                biased;

                changed = cancel.changed() => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            tracing::info!("cancellation observed, stopping relay");
                            break;
                        }
                        Ok(()) => {}
                        Err(_) => {
                            tracing::debug!("cancellation channel dropped, stopping relay");
                            break;
                        }
                    }
                }

                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(message) => self.on_outbound(message, &mut publisher),
                        None => {
                            tracing::debug!("outbound queue closed, stopping relay");
                            break;
                        }
                    }
                }

                inbound = inbound_rx.recv() => {
                    match inbound {
                        Some(message) => self.on_inbound(message),
                        None => {
                            tracing::debug!("inbound stream closed, stopping relay");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("sealed relay stopped");
    }

    /// Derives the seal key for this instant. Recomputed on every
    /// seal/unseal — the key may rotate mid-flight by design.
    fn seal_key(&self) -> Result<hushnet_crypto::otp::SealKey> {
        current_seal_key(
            &self.exchange_secret,
            self.seal_key_length,
            self.seal_key_interval_secs,
        )
    }

    /// Outbound path: seal the payload under the current key and
    /// publish. Seal and publish failures drop the message.
    fn on_outbound(&self, message: RoomMessage, publisher: &mut impl RoomPublisher) {
        if message.is_sentinel() {
            return;
        }

        let key = match self.seal_key() {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(%e, "seal key derivation failed, dropping outbound message");
                return;
            }
        };

        let mut sealed = message.clone();
        sealed.payload = match self.sealer.seal(&message.payload, key.as_str()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(sender = %message.sender_id, %e, "seal failed, dropping message");
                return;
            }
        };

        if let Err(e) = publisher.publish(&sealed) {
            tracing::warn!(%e, "publish error, message dropped");
        }
    }

    /// Inbound path: gate, unseal under the current key, dispatch to
    /// the handler chain. Gating is checked before any unsealing work
    /// is spent on the message.
    fn on_inbound(&self, message: RoomMessage) {
        if message.is_sentinel() {
            return;
        }

        if let Some(gater) = &self.peer_gater {
            if gater.gated(&message.sender_id) {
                tracing::warn!(sender = %message.sender_id, "gated message dropped");
                return;
            }
        }

        let key = match self.seal_key() {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(%e, "seal key derivation failed, dropping inbound message");
                return;
            }
        };

        let mut opened = message.clone();
        opened.payload = match self.sealer.unseal(&message.payload, key.as_str()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(sender = %message.sender_id, %e, "unseal failed, dropping message");
                return;
            }
        };

        self.dispatch(&opened);
    }

    /// Invokes every handler in order. One handler's failure never
    /// prevents the remaining handlers from running.
    fn dispatch(&self, message: &RoomMessage) {
        for handler in &self.handlers {
            if let Err(e) = handler.handle(self.ledger.as_ref(), message, &self.outbound) {
                tracing::warn!(sender = %message.sender_id, %e, "handler error");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_publisher_forwards_messages() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut publisher = ChannelPublisher::new(tx);
        publisher.publish(&RoomMessage::new("a", "sealed-bytes"))?;

        let got = rx.try_recv().map_err(|e| HushnetError::RelayError {
            reason: e.to_string(),
        })?;
        assert_eq!(got.payload, "sealed-bytes");
        Ok(())
    }

    #[test]
    fn channel_publisher_errors_when_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut publisher = ChannelPublisher::new(tx);
        assert!(publisher.publish(&RoomMessage::new("a", "x")).is_err());
    }
}
