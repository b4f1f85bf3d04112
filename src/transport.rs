//! The abstract sink/source the `HandshakeEngine` speaks to. Concrete
//! implementations (the organization-mediated server transport, the LAN
//! multicast/TCP transport) live outside this crate.

use async_trait::async_trait;

use crate::handshake::message::HandshakeMessage;

/// Errors a `Transport` implementation may report back to the engine.
/// Distinct from `CoreError`: these are network/IO failures, not protocol
/// violations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),
    #[error("transport closed")]
    Closed,
    #[error("transport error: {0}")]
    Other(String),
}

/// What the `HandshakeEngine` needs from a transport: send a message to a
/// peer, and identify who sent each inbound message.
///
/// The transport guarantees at-least-once delivery; the handshake protocol
/// is idempotent at the message level so duplicates are safe to drop.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `message` to `peer_id`. A failed send is logged by the caller;
    /// there is no automatic retry from the core.
    async fn send(&self, peer_id: &str, message: HandshakeMessage) -> Result<(), TransportError>;
}
