//! In-memory key material for a single chat, with the lifecycle invariants
//! the handshake design depends on.

use zeroize::Zeroize;

use crate::crypto::AlgorithmTriple;

/// Per-chat key material.
///
/// Invariant: `own_private` is present only while the owning chat is
/// INITIALIZING. Once the chat transitions to ESTABLISHED, `secure_wipe`
/// must have been called so only `symmetric` remains.
#[derive(Debug, Clone, Default)]
pub struct ChatKeyRing {
    pub own_public: Option<Vec<u8>>,
    pub own_private: Option<Vec<u8>>,
    pub peer_public: Option<Vec<u8>>,
    pub symmetric: Option<Vec<u8>>,
    pub algorithms: Option<AlgorithmTriple>,
}

impl ChatKeyRing {
    pub fn new(algorithms: AlgorithmTriple) -> Self {
        Self {
            algorithms: Some(algorithms),
            ..Default::default()
        }
    }

    pub fn has_keypair(&self) -> bool {
        self.own_public.is_some() && self.own_private.is_some()
    }

    pub fn has_peer_key(&self) -> bool {
        self.peer_public.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.has_keypair() && self.has_peer_key() && self.symmetric.is_some()
    }

    /// Zeroize every private/intermediate field, leaving only `symmetric`
    /// (and the immutable algorithm triple) behind. Called exactly once, at
    /// the moment a chat transitions to ESTABLISHED or FAILED.
    pub fn secure_wipe(&mut self) {
        if let Some(mut private) = self.own_private.take() {
            private.zeroize();
        }
        if let Some(mut own_public) = self.own_public.take() {
            own_public.zeroize();
        }
        if let Some(mut peer_public) = self.peer_public.take() {
            peer_public.zeroize();
        }
    }

    /// Zeroize everything including the symmetric key. Used when a chat is
    /// reaped to FAILED: no key material, private or derived, may remain.
    pub fn wipe_all(&mut self) {
        self.secure_wipe();
        if let Some(mut symmetric) = self.symmetric.take() {
            symmetric.zeroize();
        }
    }
}

impl Drop for ChatKeyRing {
    fn drop(&mut self) {
        self.wipe_all();
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
    fn predicates_track_field_presence() {
        let mut ring = ChatKeyRing::new(triple());
        assert!(!ring.has_keypair());
        ring.own_public = Some(vec![1; 32]);
        ring.own_private = Some(vec![2; 32]);
        assert!(ring.has_keypair());
        assert!(!ring.has_peer_key());
        ring.peer_public = Some(vec![3; 32]);
        assert!(ring.has_peer_key());
        assert!(!ring.is_complete());
        ring.symmetric = Some(vec![4; 32]);
        assert!(ring.is_complete());
    }

    #[test]
    fn secure_wipe_clears_private_material_only() {
        let mut ring = ChatKeyRing::new(triple());
        ring.own_public = Some(vec![1; 32]);
        ring.own_private = Some(vec![2; 32]);
        ring.peer_public = Some(vec![3; 32]);
        ring.symmetric = Some(vec![4; 32]);
        ring.secure_wipe();
        assert!(ring.own_private.is_none());
        assert!(ring.own_public.is_none());
        assert!(ring.peer_public.is_none());
        assert!(ring.symmetric.is_some());
    }
}
