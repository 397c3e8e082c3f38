//! The message handler chain contract.
//!
//! Handlers are the application's entry point into the relay: every
//! successfully admitted, unsealed inbound message is passed through
//! the configured chain in order. Handlers are stateless with respect
//! to the relay — any state they need lives in the ledger or their own
//! fields — and they may enqueue new outbound messages through the
//! [`OutboundSender`], re-entering the relay (feedback loop).

use tokio::sync::mpsc;

use hushnet_types::{HushnetError, Result, RoomMessage};

// ---------------------------------------------------------------------------
// MessageHandler
// ---------------------------------------------------------------------------

/// A single processor in the relay's handler chain.
///
/// `L` is the application-state ledger type; the relay never touches
/// it beyond passing the reference through. Handler errors are logged
/// by the relay and never abort the chain for the remaining handlers.
///
/// Handlers run synchronously on the relay task: a slow handler stalls
/// delivery of subsequent messages, so long blocking work must be
/// moved elsewhere.
pub trait MessageHandler<L>: Send + Sync {
    /// Processes one unsealed inbound message.
    fn handle(&self, ledger: &L, message: &RoomMessage, outbound: &OutboundSender) -> Result<()>;
}

// ---------------------------------------------------------------------------
// PeerGater
// ---------------------------------------------------------------------------

/// Application-level gating policy for already-connected peers.
///
/// Separate from connection admission: the gate runs at connection
/// time, this policy runs per message, before any unsealing work is
/// spent on it.
pub trait PeerGater: Send + Sync {
    /// Returns `true` when messages from `sender_id` must be dropped.
    fn gated(&self, sender_id: &str) -> bool;
}

// ---------------------------------------------------------------------------
// OutboundSender
// ---------------------------------------------------------------------------

/// Handle for enqueuing messages onto the node's outbound queue.
///
/// Held by application code and passed to every handler invocation.
#[derive(Clone)]
pub struct OutboundSender {
    tx: mpsc::UnboundedSender<RoomMessage>,
}

impl OutboundSender {
    /// Wraps the sending half of an outbound queue.
    pub fn new(tx: mpsc::UnboundedSender<RoomMessage>) -> Self {
        Self { tx }
    }

    /// Enqueues a message for sealing and publication.
    ///
    /// # Errors
    ///
    /// Returns [`HushnetError::RelayError`] if the relay has stopped.
    pub fn enqueue(&self, message: RoomMessage) -> Result<()> {
        self.tx.send(message).map_err(|_| HushnetError::RelayError {
            reason: "outbound queue is closed".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// LoggingHandler
// ---------------------------------------------------------------------------

/// Minimal handler that records message arrival in the log.
///
/// Logs the sender and payload size only — payload content never
/// reaches the log output.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingHandler;

impl<L> MessageHandler<L> for LoggingHandler {
    fn handle(&self, _ledger: &L, message: &RoomMessage, _outbound: &OutboundSender) -> Result<()> {
        tracing::debug!(
            sender = %message.sender_id,
            bytes = message.payload.len(),
            "message received"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_delivers_to_receiver() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = OutboundSender::new(tx);
        sender.enqueue(RoomMessage::new("me", "ping"))?;

        let got = rx.try_recv().map_err(|e| HushnetError::RelayError {
            reason: e.to_string(),
        })?;
        assert_eq!(got.payload, "ping");
        Ok(())
    }

    #[test]
    fn enqueue_after_close_errors() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sender = OutboundSender::new(tx);
        assert!(sender.enqueue(RoomMessage::new("me", "ping")).is_err());
    }

    #[test]
    fn logging_handler_accepts_any_message() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sender = OutboundSender::new(tx);
        let ledger = ();
        LoggingHandler.handle(&ledger, &RoomMessage::new("peer", "data"), &sender)
    }
}
