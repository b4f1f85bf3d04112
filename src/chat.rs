//! The persistent chat record and its establishment lifecycle.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::crypto::{engine, AlgorithmTriple};
use crate::keyring::ChatKeyRing;
use crate::utils::time::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatStatus {
    Initializing,
    Established,
    Failed,
}

/// A two-party chat and its key-establishment state.
///
/// Invariant: `status == Established` iff `keys.symmetric` is set,
/// `fingerprint` is set, and `establishment_completed_at > 0`. `status ==
/// Initializing` is the only status that may carry `keys.own_private`.
#[derive(Debug, Clone)]
pub struct Chat {
    pub id: String,
    pub name: String,
    pub keys: ChatKeyRing,
    pub peer_id: String,
    pub algorithms: AlgorithmTriple,
    pub fingerprint: Option<String>,
    pub status: ChatStatus,
    /// Unix milliseconds. Millisecond resolution (rather than seconds) is
    /// what lets `establishment_completed_at > created_at` hold even when a
    /// handshake completes inside the same wall-clock second it started in.
    pub created_at: i64,
    pub updated_at: i64,
    pub establishment_completed_at: i64,
    pub last_activity: i64,
}

impl Chat {
    /// Create a new chat in INITIALIZING status with a freshly generated
    /// keypair for `algorithms.kem`.
    pub fn new_initiating(id: String, name: String, peer_id: String, algorithms: AlgorithmTriple) -> crate::error::Result<Self> {
        let keypair = engine::generate_kem_keypair(algorithms.kem)?;
        let now = now_millis();
        let mut keys = ChatKeyRing::new(algorithms);
        keys.own_public = Some(keypair.public);
        keys.own_private = Some(keypair.private.to_vec());
        Ok(Self {
            id,
            name,
            keys,
            peer_id,
            algorithms,
            fingerprint: None,
            status: ChatStatus::Initializing,
            created_at: now,
            updated_at: now,
            establishment_completed_at: 0,
            last_activity: now,
        })
    }

    /// Render the fingerprint for human out-of-band comparison, grouped into
    /// 4-character chunks: `"a1b2 c3d4 ..."`.
    pub fn fingerprint_display(&self) -> Option<String> {
        self.fingerprint.as_deref().map(|fp| {
            engine::fingerprint_display(fp, Config::global().fingerprint_group_width)
        })
    }

    pub fn touch(&mut self) {
        let now = now_millis();
        self.updated_at = now;
        self.last_activity = now;
    }

    /// Transition into ESTABLISHED, recording the fingerprint and wiping all
    /// private/intermediate key material. Leaves only `keys.symmetric`.
    pub fn mark_established(&mut self, fingerprint: String) {
        self.keys.secure_wipe();
        self.fingerprint = Some(fingerprint);
        self.status = ChatStatus::Established;
        let now = now_millis();
        self.establishment_completed_at = now;
        self.touch();
    }

    /// Transition into FAILED, wiping every byte of key material — including
    /// the symmetric key, which can never have been derived without a
    /// complete handshake.
    pub fn mark_failed(&mut self) {
        self.keys.wipe_all();
        self.status = ChatStatus::Failed;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KemAlgorithm, SignatureAlgorithm, SymmetricAlgorithm};

    fn triple() -> AlgorithmTriple {
        AlgorithmTriple::new(
            KemAlgorithm::Kyber768,
            SymmetricAlgorithm::Aes256Gcm,
            SignatureAlgorithm::Dilithium3,
        )
    }

    #[test]
    fn new_initiating_chat_has_keypair_and_no_fingerprint() {
        let chat = Chat::new_initiating("c1".into(), "Bob".into(), "peer-1".into(), triple()).unwrap();
        assert_eq!(chat.status, ChatStatus::Initializing);
        assert!(chat.keys.has_keypair());
        assert!(chat.fingerprint.is_none());
        assert_eq!(chat.establishment_completed_at, 0);
    }

    #[test]
    fn mark_established_wipes_private_material() {
        let mut chat = Chat::new_initiating("c1".into(), "Bob".into(), "peer-1".into(), triple()).unwrap();
        chat.keys.symmetric = Some(vec![9; 32]);
        chat.mark_established("abc123".into());
        assert_eq!(chat.status, ChatStatus::Established);
        assert!(chat.keys.own_private.is_none());
        assert!(chat.keys.own_public.is_none());
        assert!(chat.keys.symmetric.is_some());
        assert!(chat.establishment_completed_at > 0);
    }

    #[test]
    fn mark_established_completes_strictly_after_creation() {
        let mut chat = Chat::new_initiating("c1".into(), "Bob".into(), "peer-1".into(), triple()).unwrap();
        chat.mark_established("abc123".into());
        assert!(chat.establishment_completed_at > chat.created_at);
    }

    #[test]
    fn mark_failed_wipes_everything() {
        let mut chat = Chat::new_initiating("c1".into(), "Bob".into(), "peer-1".into(), triple()).unwrap();
        chat.mark_failed();
        assert_eq!(chat.status, ChatStatus::Failed);
        assert!(chat.keys.symmetric.is_none());
        assert!(chat.keys.own_private.is_none());
    }
}
