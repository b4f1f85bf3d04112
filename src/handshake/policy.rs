//! Resolves the `AlgorithmTriple` governing a handshake, which differs
//! fundamentally between the two deployment modes.

use crate::crypto::AlgorithmTriple;
use crate::error::{CoreError, Result};

/// How algorithms are determined for chats this engine participates in.
#[derive(Debug, Clone)]
pub enum AlgorithmPolicy {
    /// LAN P2P: every message carries the triple explicitly. A locally
    /// originated chat uses `local_preference`.
    P2p { local_preference: AlgorithmTriple },
    /// Organization server: the triple is fixed by organization metadata
    /// fetched at login, shared by every chat in the organization.
    Server { organization_triple: AlgorithmTriple },
}

impl AlgorithmPolicy {
    /// Algorithms to stamp on a chat the local user originates.
    pub fn triple_for_new_chat(&self) -> AlgorithmTriple {
        match self {
            Self::P2p { local_preference } => *local_preference,
            Self::Server { organization_triple } => *organization_triple,
        }
    }

    /// Resolve the triple to use for an inbound message that may or may not
    /// carry an explicit `crypto_algorithms` field.
    ///
    /// - P2P mode: the field is required; an absent field is rejected.
    /// - Server mode: any inbound field is ignored; the organization triple
    ///   is always authoritative.
    pub fn resolve_inbound(&self, inbound: Option<AlgorithmTriple>) -> Result<AlgorithmTriple> {
        match self {
            Self::P2p { .. } => inbound.ok_or_else(|| {
                CoreError::AlgorithmUnsupported("P2P mode requires crypto_algorithms on every message".into())
            }),
            Self::Server { organization_triple } => Ok(*organization_triple),
        }
    }

    /// Validate that a later message's inbound triple (if present) still
    /// matches the triple the chat was created with. Only meaningful in P2P
    /// mode; server mode never carries a triple to mismatch against.
    pub fn check_consistent(&self, expected: AlgorithmTriple, inbound: Option<AlgorithmTriple>, chat_uuid: &str) -> Result<()> {
        if let Self::P2p { .. } = self {
            if let Some(inbound) = inbound {
                if inbound != expected {
                    return Err(CoreError::AlgorithmMismatch { chat_uuid: chat_uuid.to_string() });
                }
            }
        }
        Ok(())
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
    fn p2p_requires_inbound_algorithms() {
        let policy = AlgorithmPolicy::P2p { local_preference: triple() };
        assert!(policy.resolve_inbound(None).is_err());
        assert!(policy.resolve_inbound(Some(triple())).is_ok());
    }

    #[test]
    fn server_mode_ignores_inbound_and_uses_cached_triple() {
        let policy = AlgorithmPolicy::Server { organization_triple: triple() };
        let resolved = policy.resolve_inbound(None).unwrap();
        assert_eq!(resolved, triple());
        // Even a differing inbound value is ignored.
        let other = AlgorithmTriple::new(
            KemAlgorithm::Kyber512,
            SymmetricAlgorithm::ChaCha20Poly1305,
            SignatureAlgorithm::Dilithium2,
        );
        let resolved = policy.resolve_inbound(Some(other)).unwrap();
        assert_eq!(resolved, triple());
    }

    #[test]
    fn p2p_mismatch_is_rejected() {
        let policy = AlgorithmPolicy::P2p { local_preference: triple() };
        let other = AlgorithmTriple::new(
            KemAlgorithm::Kyber512,
            SymmetricAlgorithm::ChaCha20Poly1305,
            SignatureAlgorithm::Dilithium2,
        );
        let err = policy.check_consistent(triple(), Some(other), "c1");
        assert!(matches!(err, Err(CoreError::AlgorithmMismatch { .. })));
    }
}
