//! The four-message handshake state machine.
//!
//! ```text
//!             created locally                received INIT_REQUEST
//!                   │                                │
//!                   ▼                                ▼
//!             AWAIT_RESPONSE ◄── own keypair ──► AWAIT_CONFIRM
//!                   │        generated+stored        │
//!          INIT_RESPONSE rcvd               INIT_CONFIRM rcvd
//!                   │                                │
//!                   ▼                                ▼
//!                 ESTABLISHED ◄──────────────────► ESTABLISHED
//!                   │                                │
//!                   └──── stale timeout ────► FAILED ◄────┘
//! ```
//!
//! The sub-state AWAIT_RESPONSE vs AWAIT_CONFIRM is never stored explicitly;
//! it is implicit in whether `keys.peer_public` has been filled in yet for a
//! chat still in INITIALIZING.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chat::{Chat, ChatStatus};
use crate::crypto::{engine as crypto_engine, AlgorithmTriple};
use crate::error::{CoreError, Result};
use crate::events::ChatEvent;
use crate::handshake::locks::ChatLocks;
use crate::handshake::message::{
    ChatInitConfirm, ChatInitRequest, ChatInitResponse, ChatInitSignature, HandshakeMessage, WireAlgorithms,
};
use crate::handshake::policy::AlgorithmPolicy;
use crate::pending::PendingSecretTable;
use crate::store::ChatStore;
use crate::transport::Transport;

fn parse_wire_algorithms(wire: &Option<WireAlgorithms>) -> Result<Option<AlgorithmTriple>> {
    wire.as_ref()
        .map(|w| AlgorithmTriple::from_wire_tags(&w.asymmetric, &w.symmetric, &w.signature))
        .transpose()
}

pub struct HandshakeEngine<T: Transport> {
    store: Arc<ChatStore>,
    pending: Arc<PendingSecretTable>,
    policy: AlgorithmPolicy,
    locks: ChatLocks,
    transport: Arc<T>,
    events: tokio::sync::mpsc::UnboundedSender<ChatEvent>,
}

impl<T: Transport> HandshakeEngine<T> {
    pub fn new(
        store: Arc<ChatStore>,
        pending: Arc<PendingSecretTable>,
        policy: AlgorithmPolicy,
        transport: Arc<T>,
    ) -> (Self, tokio::sync::mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let engine = Self {
            store,
            pending,
            policy,
            locks: ChatLocks::new(),
            transport,
            events: tx,
        };
        (engine, rx)
    }

    fn publish(&self, event: ChatEvent) {
        // A dropped receiver (UI bridge gone) is not a handshake failure.
        let _ = self.events.send(event);
    }

    /// Locally originate a chat: generate a keypair, persist it in
    /// INITIALIZING/AWAIT_RESPONSE, and send CHAT_INIT_REQUEST.
    pub async fn initiate_chat(&self, chat_uuid: String, peer_id: String, name: String) -> Result<()> {
        let _guard = self.locks.shard_for(&chat_uuid).lock_owned().await;

        let algorithms = self.policy.triple_for_new_chat();
        let chat = Chat::new_initiating(chat_uuid.clone(), name, peer_id.clone(), algorithms)?;
        let public_key = chat.keys.own_public.clone().expect("freshly initiated chat has a keypair");
        self.store.save(chat)?;

        let crypto_algorithms = match &self.policy {
            AlgorithmPolicy::P2p { .. } => Some(WireAlgorithms::from_triple(
                algorithms.kem,
                algorithms.symmetric,
                algorithms.signature,
            )),
            AlgorithmPolicy::Server { .. } => None,
        };

        let message = HandshakeMessage::ChatInitRequest(ChatInitRequest {
            chat_uuid,
            public_key,
            crypto_algorithms,
        });
        if let Err(err) = self.transport.send(&peer_id, message).await {
            warn!(target: "handshake", %err, "failed to send CHAT_INIT_REQUEST");
        }
        Ok(())
    }

    /// Responder side: `handle_init_request`.
    pub async fn handle_init_request(&self, from_peer: &str, msg: ChatInitRequest) -> Result<()> {
        let _guard = self.locks.shard_for(&msg.chat_uuid).lock_owned().await;

        if msg.public_key.is_empty() {
            debug!(target: "handshake", chat_uuid = %msg.chat_uuid, "dropping CHAT_INIT_REQUEST with empty public_key");
            return Ok(());
        }

        let inbound_algorithms = match parse_wire_algorithms(&msg.crypto_algorithms) {
            Ok(a) => a,
            Err(err) => {
                debug!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "dropping CHAT_INIT_REQUEST with unsupported algorithms");
                return Ok(());
            }
        };
        let algorithms = match self.policy.resolve_inbound(inbound_algorithms) {
            Ok(a) => a,
            Err(err) => {
                debug!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "dropping CHAT_INIT_REQUEST, could not resolve algorithms");
                return Ok(());
            }
        };

        let existing = self.store.get(&msg.chat_uuid);
        if let Some(existing) = &existing {
            if existing.keys.has_peer_key() || existing.status != ChatStatus::Initializing {
                // Duplicate INIT_REQUEST: drop without mutating state.
                debug!(target: "handshake", chat_uuid = %msg.chat_uuid, "dropping duplicate CHAT_INIT_REQUEST");
                return Ok(());
            }
        }

        let mut chat = match existing {
            Some(chat) => chat,
            None => match Chat::new_initiating(msg.chat_uuid.clone(), String::new(), from_peer.to_string(), algorithms) {
                Ok(chat) => chat,
                Err(err) => {
                    warn!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "could not generate responder keypair");
                    return Ok(());
                }
            },
        };

        chat.keys.peer_public = Some(msg.public_key.clone());

        let (secret_b, capsule_b) = match crypto_engine::encapsulate(&msg.public_key, algorithms.kem) {
            Ok(pair) => pair,
            Err(err) => {
                debug!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "dropping CHAT_INIT_REQUEST, bad peer public key");
                return Ok(());
            }
        };

        self.pending.put(&msg.chat_uuid, secret_b.to_vec());

        let own_public = chat.keys.own_public.clone().expect("responder keypair always has a public half");
        chat.touch();
        self.store.save(chat)?;

        let crypto_algorithms = match &self.policy {
            AlgorithmPolicy::P2p { .. } => Some(WireAlgorithms::from_triple(
                algorithms.kem,
                algorithms.symmetric,
                algorithms.signature,
            )),
            AlgorithmPolicy::Server { .. } => None,
        };

        let response = HandshakeMessage::ChatInitResponse(ChatInitResponse {
            chat_uuid: msg.chat_uuid,
            public_key: own_public,
            kem_capsule: capsule_b,
            crypto_algorithms,
            user_signature: None,
        });
        if let Err(err) = self.transport.send(from_peer, response).await {
            warn!(target: "handshake", %err, "failed to send CHAT_INIT_RESPONSE");
        }
        Ok(())
    }

    /// Initiator side: `handle_init_response`.
    pub async fn handle_init_response(&self, from_peer: &str, msg: ChatInitResponse) -> Result<()> {
        let _guard = self.locks.shard_for(&msg.chat_uuid).lock_owned().await;

        let mut chat = match self.store.get(&msg.chat_uuid) {
            Some(chat) => chat,
            None => {
                debug!(target: "handshake", chat_uuid = %msg.chat_uuid, "dropping CHAT_INIT_RESPONSE for unknown chat");
                return Ok(());
            }
        };
        if chat.status != ChatStatus::Initializing || chat.keys.has_peer_key() {
            debug!(target: "handshake", chat_uuid = %msg.chat_uuid, "dropping CHAT_INIT_RESPONSE, chat not in AWAIT_RESPONSE");
            return Ok(());
        }

        let inbound_algorithms = match parse_wire_algorithms(&msg.crypto_algorithms) {
            Ok(a) => a,
            Err(err) => {
                debug!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "dropping CHAT_INIT_RESPONSE with unsupported algorithms");
                return Ok(());
            }
        };
        if let Err(err) = self.policy.check_consistent(chat.algorithms, inbound_algorithms, &msg.chat_uuid) {
            warn!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "algorithm mismatch, failing chat");
            chat.mark_failed();
            self.store.save(chat)?;
            self.publish(ChatEvent::Failed { chat_id: msg.chat_uuid.clone(), reason: err.to_string() });
            return Ok(());
        }

        chat.keys.peer_public = Some(msg.public_key.clone());
        let kem = chat.algorithms.kem;

        let secret_b = match crypto_engine::decapsulate(&msg.kem_capsule, chat.keys.own_private.as_deref().unwrap_or(&[]), kem) {
            Ok(s) => s,
            Err(err) => {
                warn!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "decapsulation failed, failing chat");
                chat.mark_failed();
                self.store.save(chat)?;
                self.publish(ChatEvent::Failed { chat_id: msg.chat_uuid.clone(), reason: err.to_string() });
                return Ok(());
            }
        };
        let (secret_a, capsule_a) = match crypto_engine::encapsulate(&msg.public_key, kem) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "encapsulation failed, failing chat");
                chat.mark_failed();
                self.store.save(chat)?;
                self.publish(ChatEvent::Failed { chat_id: msg.chat_uuid.clone(), reason: err.to_string() });
                return Ok(());
            }
        };

        let symmetric = crypto_engine::derive_symmetric(&secret_a, &secret_b, chat.algorithms.symmetric)?;
        let fingerprint = crypto_engine::fingerprint(
            chat.keys.own_public.as_deref().unwrap_or(&[]),
            chat.keys.peer_public.as_deref().unwrap_or(&[]),
            chat.algorithms.symmetric,
        );

        chat.keys.symmetric = Some(symmetric.to_vec());
        chat.mark_established(fingerprint.clone());
        self.store.save(chat)?;

        let confirm = HandshakeMessage::ChatInitConfirm(ChatInitConfirm {
            chat_uuid: msg.chat_uuid.clone(),
            kem_capsule: capsule_a,
        });
        if let Err(err) = self.transport.send(from_peer, confirm).await {
            warn!(target: "handshake", %err, "failed to send CHAT_INIT_CONFIRM");
        }

        info!(target: "handshake", chat_uuid = %msg.chat_uuid, "chat established (initiator)");
        self.publish(ChatEvent::Established { chat_id: msg.chat_uuid, fingerprint });
        Ok(())
    }

    /// Responder side: `handle_init_confirm`.
    pub async fn handle_init_confirm(&self, _from_peer: &str, msg: ChatInitConfirm) -> Result<()> {
        let _guard = self.locks.shard_for(&msg.chat_uuid).lock_owned().await;

        let mut chat = match self.store.get(&msg.chat_uuid) {
            Some(chat) => chat,
            None => {
                debug!(target: "handshake", chat_uuid = %msg.chat_uuid, "dropping CHAT_INIT_CONFIRM for unknown chat");
                return Ok(());
            }
        };
        if chat.status != ChatStatus::Initializing || !chat.keys.has_peer_key() {
            debug!(target: "handshake", chat_uuid = %msg.chat_uuid, "dropping CHAT_INIT_CONFIRM, chat not in AWAIT_CONFIRM");
            return Ok(());
        }

        let kem = chat.algorithms.kem;
        let secret_a = match crypto_engine::decapsulate(&msg.kem_capsule, chat.keys.own_private.as_deref().unwrap_or(&[]), kem) {
            Ok(s) => s,
            Err(err) => {
                warn!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "decapsulation failed, failing chat");
                chat.mark_failed();
                self.store.save(chat)?;
                self.publish(ChatEvent::Failed { chat_id: msg.chat_uuid.clone(), reason: err.to_string() });
                return Ok(());
            }
        };

        let secret_b = match self.pending.remove(&msg.chat_uuid) {
            Some(secret) => secret,
            None => {
                warn!(target: "handshake", chat_uuid = %msg.chat_uuid, "no pending secret, handshake desynchronized");
                chat.mark_failed();
                self.store.save(chat)?;
                let reason = CoreError::HandshakeDesynchronized { chat_uuid: msg.chat_uuid.clone() }.to_string();
                self.publish(ChatEvent::Failed { chat_id: msg.chat_uuid.clone(), reason });
                return Ok(());
            }
        };

        let symmetric = crypto_engine::derive_symmetric(&secret_a, &secret_b, chat.algorithms.symmetric)?;
        let fingerprint = crypto_engine::fingerprint(
            chat.keys.own_public.as_deref().unwrap_or(&[]),
            chat.keys.peer_public.as_deref().unwrap_or(&[]),
            chat.algorithms.symmetric,
        );

        chat.keys.symmetric = Some(symmetric.to_vec());
        chat.mark_established(fingerprint.clone());
        self.store.save(chat)?;

        info!(target: "handshake", chat_uuid = %msg.chat_uuid, "chat established (responder)");
        self.publish(ChatEvent::Established { chat_id: msg.chat_uuid, fingerprint });
        Ok(())
    }

    /// Either side, optional: `handle_init_signature`.
    ///
    /// Best-effort organization-identity assertion over the already
    /// established fingerprint. Never tears down a session: the
    /// cryptographic handshake is already complete by the time this leg
    /// arrives.
    pub async fn handle_init_signature(&self, _from_peer: &str, msg: ChatInitSignature, peer_signature_public_key: Option<&[u8]>, sig_alg: crate::crypto::SignatureAlgorithm) -> Result<bool> {
        let chat = match self.store.get(&msg.chat_uuid) {
            Some(chat) => chat,
            None => return Ok(false),
        };
        let Some(fingerprint) = chat.fingerprint.as_ref() else {
            debug!(target: "handshake", chat_uuid = %msg.chat_uuid, "CHAT_INIT_SIGNATURE arrived before establishment, ignoring");
            return Ok(false);
        };
        let Some(public_key) = peer_signature_public_key else {
            debug!(target: "handshake", chat_uuid = %msg.chat_uuid, "no peer signature key available, ignoring CHAT_INIT_SIGNATURE");
            return Ok(false);
        };

        match crypto_engine::verify(fingerprint.as_bytes(), &msg.signature, public_key, sig_alg) {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(target: "handshake", chat_uuid = %msg.chat_uuid, "CHAT_INIT_SIGNATURE failed verification");
                Ok(false)
            }
            Err(err) => {
                warn!(target: "handshake", chat_uuid = %msg.chat_uuid, %err, "CHAT_INIT_SIGNATURE verification error");
                Ok(false)
            }
        }
    }
}
