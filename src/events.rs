//! Typed events the `HandshakeEngine` publishes to the UI bridge
//! (out of scope here — only the contract lives in this crate).

/// Outcome of a chat's key-establishment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Established { chat_id: String, fingerprint: String },
    Failed { chat_id: String, reason: String },
}
