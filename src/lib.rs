//! Post-quantum KEM handshake core for chat key establishment.
//!
//! This crate is the protocol state machine, cryptographic orchestration,
//! and persisted key/chat store that turns a sequence of handshake messages
//! into an authenticated, per-chat symmetric key. The concrete transports
//! (organization server, LAN P2P) and the UI bridge live outside this crate;
//! see [`transport::Transport`] and [`events::ChatEvent`] for the seams.

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod chat;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod handshake;
pub mod keyring;
pub mod pending;
pub mod reaper;
pub mod store;
pub mod transport;
pub mod utils;

pub use chat::{Chat, ChatStatus};
pub use crypto::AlgorithmTriple;
pub use error::{CoreError, Result};
pub use events::ChatEvent;
pub use handshake::{AlgorithmPolicy, HandshakeEngine, HandshakeMessage};
pub use keyring::ChatKeyRing;
pub use pending::PendingSecretTable;
pub use reaper::StaleReaper;
pub use store::ChatStore;
pub use transport::{Transport, TransportError};
