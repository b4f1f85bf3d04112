//! Stateless cryptographic operations over byte arrays, parameterized by the
//! algorithm tags negotiated for a chat.
//!
//! Nothing in this module holds state across calls: every operation takes
//! the algorithm and the key material it needs and returns fresh bytes. This
//! mirrors the CryptoEngine described in the handshake design — a pure
//! function library, not an object with lifecycle.

use hkdf::Hkdf;
use pqcrypto_dilithium::{dilithium2, dilithium3, dilithium5};
use pqcrypto_kyber::{kyber1024, kyber512, kyber768};
use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};
use pqcrypto_traits::sign::{
    DetachedSignature as _, PublicKey as SignPublicKeyTrait, SecretKey as SignSecretKeyTrait,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::algorithm::{KemAlgorithm, SignatureAlgorithm, SymmetricAlgorithm};
use crate::error::{CoreError, Result};

/// A KEM keypair. The private half is wiped on drop.
pub struct KemKeyPair {
    pub public: Vec<u8>,
    pub private: Zeroizing<Vec<u8>>,
}

/// Generate a fresh keypair for `kem`.
pub fn generate_kem_keypair(kem: KemAlgorithm) -> Result<KemKeyPair> {
    let (public, private) = match kem {
        KemAlgorithm::Kyber512 => {
            let (pk, sk) = kyber512::keypair();
            (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
        }
        KemAlgorithm::Kyber768 => {
            let (pk, sk) = kyber768::keypair();
            (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
        }
        KemAlgorithm::Kyber1024 => {
            let (pk, sk) = kyber1024::keypair();
            (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
        }
    };
    Ok(KemKeyPair { public, private: Zeroizing::new(private) })
}

fn check_len(bytes: &[u8], expected: usize, what: &str) -> Result<()> {
    if bytes.len() != expected {
        return Err(CoreError::InvalidKey(format!(
            "{what}: expected {expected} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

/// Encapsulate a fresh secret to `peer_public`, returning `(secret, capsule)`.
pub fn encapsulate(peer_public: &[u8], kem: KemAlgorithm) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>)> {
    check_len(peer_public, kem.public_key_len(), "peer_public_key")?;
    let (secret, capsule) = match kem {
        KemAlgorithm::Kyber512 => {
            let pk = kyber512::PublicKey::from_bytes(peer_public)
                .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
            let (ss, ct) = kyber512::encapsulate(&pk);
            (ss.as_bytes().to_vec(), ct.as_bytes().to_vec())
        }
        KemAlgorithm::Kyber768 => {
            let pk = kyber768::PublicKey::from_bytes(peer_public)
                .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
            let (ss, ct) = kyber768::encapsulate(&pk);
            (ss.as_bytes().to_vec(), ct.as_bytes().to_vec())
        }
        KemAlgorithm::Kyber1024 => {
            let pk = kyber1024::PublicKey::from_bytes(peer_public)
                .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
            let (ss, ct) = kyber1024::encapsulate(&pk);
            (ss.as_bytes().to_vec(), ct.as_bytes().to_vec())
        }
    };
    Ok((Zeroizing::new(secret), capsule))
}

/// Recover the secret encapsulated in `capsule` using `own_private`.
pub fn decapsulate(capsule: &[u8], own_private: &[u8], kem: KemAlgorithm) -> Result<Zeroizing<Vec<u8>>> {
    check_len(own_private, kem.secret_key_len(), "own_private_key")?;
    check_len(capsule, kem.ciphertext_len(), "capsule")?;
    let secret = match kem {
        KemAlgorithm::Kyber512 => {
            let sk = kyber512::SecretKey::from_bytes(own_private)
                .map_err(|e| CoreError::DecapsulationFailed(e.to_string()))?;
            let ct = kyber512::Ciphertext::from_bytes(capsule)
                .map_err(|e| CoreError::DecapsulationFailed(e.to_string()))?;
            kyber512::decapsulate(&ct, &sk).as_bytes().to_vec()
        }
        KemAlgorithm::Kyber768 => {
            let sk = kyber768::SecretKey::from_bytes(own_private)
                .map_err(|e| CoreError::DecapsulationFailed(e.to_string()))?;
            let ct = kyber768::Ciphertext::from_bytes(capsule)
                .map_err(|e| CoreError::DecapsulationFailed(e.to_string()))?;
            kyber768::decapsulate(&ct, &sk).as_bytes().to_vec()
        }
        KemAlgorithm::Kyber1024 => {
            let sk = kyber1024::SecretKey::from_bytes(own_private)
                .map_err(|e| CoreError::DecapsulationFailed(e.to_string()))?;
            let ct = kyber1024::Ciphertext::from_bytes(capsule)
                .map_err(|e| CoreError::DecapsulationFailed(e.to_string()))?;
            kyber1024::decapsulate(&ct, &sk).as_bytes().to_vec()
        }
    };
    Ok(Zeroizing::new(secret))
}

/// Order two secrets so both peers agree on byte order without either side
/// knowing which one is "A". Ties (equal secrets) are stable by definition.
fn sorted_pair<'a>(a: &'a [u8], b: &'a [u8]) -> (&'a [u8], &'a [u8]) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Derive the per-chat symmetric key from the two peers' independently
/// contributed KEM secrets. Order-invariant: swapping `secret_a`/`secret_b`
/// yields the same output.
pub fn derive_symmetric(
    secret_a: &[u8],
    secret_b: &[u8],
    symmetric_alg: SymmetricAlgorithm,
) -> Result<Zeroizing<Vec<u8>>> {
    let (lo, hi) = sorted_pair(secret_a, secret_b);
    let mut ikm = Vec::with_capacity(lo.len() + hi.len() + symmetric_alg.wire_tag().len());
    ikm.extend_from_slice(lo);
    ikm.extend_from_slice(hi);
    ikm.extend_from_slice(symmetric_alg.wire_tag().as_bytes());

    let hk = Hkdf::<Sha256>::new(None, &ikm);
    let mut out = vec![0u8; symmetric_alg.key_len()];
    hk.expand(b"yumsg/chat-key/v1", &mut out)
        .map_err(|e| CoreError::InvalidKey(format!("hkdf expand failed: {e}")))?;
    Ok(Zeroizing::new(out))
}

/// Sign `data` with a Dilithium private key, producing a detached signature.
pub fn sign(data: &[u8], private_sig_key: &[u8], sig_alg: SignatureAlgorithm) -> Result<Vec<u8>> {
    let sig = match sig_alg {
        SignatureAlgorithm::Dilithium2 => {
            let sk = dilithium2::SecretKey::from_bytes(private_sig_key)
                .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
            dilithium2::detached_sign(data, &sk).as_bytes().to_vec()
        }
        SignatureAlgorithm::Dilithium3 => {
            let sk = dilithium3::SecretKey::from_bytes(private_sig_key)
                .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
            dilithium3::detached_sign(data, &sk).as_bytes().to_vec()
        }
        SignatureAlgorithm::Dilithium5 => {
            let sk = dilithium5::SecretKey::from_bytes(private_sig_key)
                .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
            dilithium5::detached_sign(data, &sk).as_bytes().to_vec()
        }
    };
    Ok(sig)
}

/// Verify a detached signature over `data`.
pub fn verify(
    data: &[u8],
    signature: &[u8],
    public_sig_key: &[u8],
    sig_alg: SignatureAlgorithm,
) -> Result<bool> {
    let ok = match sig_alg {
        SignatureAlgorithm::Dilithium2 => {
            let pk = dilithium2::PublicKey::from_bytes(public_sig_key)
                .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
            let sig = dilithium2::DetachedSignature::from_bytes(signature)
                .map_err(|e| CoreError::InvalidSignature(e.to_string()))?;
            dilithium2::verify_detached_signature(&sig, data, &pk).is_ok()
        }
        SignatureAlgorithm::Dilithium3 => {
            let pk = dilithium3::PublicKey::from_bytes(public_sig_key)
                .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
            let sig = dilithium3::DetachedSignature::from_bytes(signature)
                .map_err(|e| CoreError::InvalidSignature(e.to_string()))?;
            dilithium3::verify_detached_signature(&sig, data, &pk).is_ok()
        }
        SignatureAlgorithm::Dilithium5 => {
            let pk = dilithium5::PublicKey::from_bytes(public_sig_key)
                .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
            let sig = dilithium5::DetachedSignature::from_bytes(signature)
                .map_err(|e| CoreError::InvalidSignature(e.to_string()))?;
            dilithium5::verify_detached_signature(&sig, data, &pk).is_ok()
        }
    };
    Ok(ok)
}

/// Compute the 32-hex-character fingerprint of a session:
/// `HEX(SHA-256(sort(own_public, peer_public) ++ symmetric_alg_tag))`,
/// truncated to the first 16 digest bytes (32 hex characters).
///
/// Both peers compute the same value regardless of which one holds
/// `own_public` versus `peer_public`, because the two public keys are sorted
/// before hashing.
pub fn fingerprint(own_public: &[u8], peer_public: &[u8], symmetric_alg: SymmetricAlgorithm) -> String {
    let (lo, hi) = sorted_pair(own_public, peer_public);
    let mut hasher = Sha256::new();
    hasher.update(lo);
    hasher.update(hi);
    hasher.update(symmetric_alg.wire_tag().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Render a fingerprint for human comparison: grouped into 4-character
/// chunks separated by spaces.
pub fn fingerprint_display(fingerprint_hex: &str, group_width: usize) -> String {
    fingerprint_hex
        .as_bytes()
        .chunks(group_width)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kyber768_round_trips() {
        let alice = generate_kem_keypair(KemAlgorithm::Kyber768).unwrap();
        let (secret_sender, capsule) = encapsulate(&alice.public, KemAlgorithm::Kyber768).unwrap();
        let secret_receiver = decapsulate(&capsule, &alice.private, KemAlgorithm::Kyber768).unwrap();
        assert_eq!(secret_sender.as_slice(), secret_receiver.as_slice());
    }

    #[test]
    fn derive_symmetric_is_order_invariant() {
        let a = vec![1u8, 2, 3, 4];
        let b = vec![5u8, 6, 7, 8];
        let k1 = derive_symmetric(&a, &b, SymmetricAlgorithm::Aes256Gcm).unwrap();
        let k2 = derive_symmetric(&b, &a, SymmetricAlgorithm::Aes256Gcm).unwrap();
        assert_eq!(k1.as_slice(), k2.as_slice());
        assert_eq!(k1.len(), 32);
    }

    #[test]
    fn fingerprint_is_symmetric() {
        let pk_a = vec![9u8; 32];
        let pk_b = vec![1u8; 32];
        let f1 = fingerprint(&pk_a, &pk_b, SymmetricAlgorithm::ChaCha20Poly1305);
        let f2 = fingerprint(&pk_b, &pk_a, SymmetricAlgorithm::ChaCha20Poly1305);
        assert_eq!(f1, f2);
        assert_eq!(f1.len(), 32);
    }

    #[test]
    fn dilithium3_sign_and_verify() {
        let (pk, sk) = dilithium3::keypair();
        let data = b"fingerprint-bytes";
        let sig = sign(data, sk.as_bytes(), SignatureAlgorithm::Dilithium3).unwrap();
        assert!(verify(data, &sig, pk.as_bytes(), SignatureAlgorithm::Dilithium3).unwrap());
        assert!(!verify(b"tampered", &sig, pk.as_bytes(), SignatureAlgorithm::Dilithium3).unwrap());
    }

    #[test]
    fn rejects_wrong_length_public_key() {
        let err = encapsulate(&[0u8; 4], KemAlgorithm::Kyber768);
        assert!(matches!(err, Err(CoreError::InvalidKey(_))));
    }
}
