//! Algorithm identifiers carried in handshake messages and chat records.
//!
//! `AlgorithmTriple` is the `(kem, symmetric, signature)` tuple negotiated
//! once per chat and held immutable afterwards (spec: "algorithm agility
//! within an established session" is a non-goal).

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Post-quantum KEM family used for the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KemAlgorithm {
    Kyber512,
    Kyber768,
    Kyber1024,
}

impl KemAlgorithm {
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Self::Kyber512 => "KYBER512",
            Self::Kyber768 => "KYBER768",
            Self::Kyber1024 => "KYBER1024",
        }
    }

    pub fn from_wire_tag(tag: &str) -> Option<Self> {
        match tag {
            "KYBER512" => Some(Self::Kyber512),
            "KYBER768" => Some(Self::Kyber768),
            "KYBER1024" => Some(Self::Kyber1024),
            _ => None,
        }
    }

    /// Expected length of a public key for this KEM, in bytes.
    pub fn public_key_len(&self) -> usize {
        match self {
            Self::Kyber512 => pqcrypto_kyber::kyber512::public_key_bytes(),
            Self::Kyber768 => pqcrypto_kyber::kyber768::public_key_bytes(),
            Self::Kyber1024 => pqcrypto_kyber::kyber1024::public_key_bytes(),
        }
    }

    /// Expected length of a secret key for this KEM, in bytes.
    pub fn secret_key_len(&self) -> usize {
        match self {
            Self::Kyber512 => pqcrypto_kyber::kyber512::secret_key_bytes(),
            Self::Kyber768 => pqcrypto_kyber::kyber768::secret_key_bytes(),
            Self::Kyber1024 => pqcrypto_kyber::kyber1024::secret_key_bytes(),
        }
    }

    /// Expected length of an encapsulated capsule, in bytes.
    pub fn ciphertext_len(&self) -> usize {
        match self {
            Self::Kyber512 => pqcrypto_kyber::kyber512::ciphertext_bytes(),
            Self::Kyber768 => pqcrypto_kyber::kyber768::ciphertext_bytes(),
            Self::Kyber1024 => pqcrypto_kyber::kyber1024::ciphertext_bytes(),
        }
    }
}

/// AEAD cipher used to encrypt content once the handshake completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymmetricAlgorithm {
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl SymmetricAlgorithm {
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-256",
            Self::ChaCha20Poly1305 => "CHACHA20",
        }
    }

    pub fn from_wire_tag(tag: &str) -> Option<Self> {
        match tag {
            "AES-256" => Some(Self::Aes256Gcm),
            "CHACHA20" => Some(Self::ChaCha20Poly1305),
            _ => None,
        }
    }

    /// Key length this cipher requires, in bytes. Both supported ciphers use
    /// 256-bit keys.
    pub fn key_len(&self) -> usize {
        32
    }
}

/// Post-quantum signature scheme used for the optional organization-identity
/// assertion leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    Dilithium2,
    Dilithium3,
    Dilithium5,
}

impl SignatureAlgorithm {
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Self::Dilithium2 => "DILITHIUM2",
            Self::Dilithium3 => "DILITHIUM3",
            Self::Dilithium5 => "DILITHIUM5",
        }
    }

    pub fn from_wire_tag(tag: &str) -> Option<Self> {
        match tag {
            "DILITHIUM2" => Some(Self::Dilithium2),
            "DILITHIUM3" => Some(Self::Dilithium3),
            "DILITHIUM5" => Some(Self::Dilithium5),
            _ => None,
        }
    }
}

/// The `(kem, symmetric, signature)` triple governing a single chat.
///
/// Invariant: all three fields are always populated — there is no
/// "half-built" triple once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmTriple {
    pub kem: KemAlgorithm,
    pub symmetric: SymmetricAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl AlgorithmTriple {
    pub fn new(kem: KemAlgorithm, symmetric: SymmetricAlgorithm, signature: SignatureAlgorithm) -> Self {
        Self { kem, symmetric, signature }
    }

    /// Parse a triple from its wire tag form, rejecting unknown identifiers.
    pub fn from_wire_tags(kem: &str, symmetric: &str, signature: &str) -> Result<Self> {
        let kem = KemAlgorithm::from_wire_tag(kem)
            .ok_or_else(|| CoreError::AlgorithmUnsupported(format!("kem: {kem}")))?;
        let symmetric = SymmetricAlgorithm::from_wire_tag(symmetric)
            .ok_or_else(|| CoreError::AlgorithmUnsupported(format!("symmetric: {symmetric}")))?;
        let signature = SignatureAlgorithm::from_wire_tag(signature)
            .ok_or_else(|| CoreError::AlgorithmUnsupported(format!("signature: {signature}")))?;
        Ok(Self { kem, symmetric, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_wire_tags() {
        let triple = AlgorithmTriple::new(
            KemAlgorithm::Kyber768,
            SymmetricAlgorithm::Aes256Gcm,
            SignatureAlgorithm::Dilithium3,
        );
        let parsed = AlgorithmTriple::from_wire_tags(
            triple.kem.wire_tag(),
            triple.symmetric.wire_tag(),
            triple.signature.wire_tag(),
        )
        .unwrap();
        assert_eq!(triple, parsed);
    }

    #[test]
    fn rejects_unknown_kem() {
        let err = AlgorithmTriple::from_wire_tags("MCELIECE", "AES-256", "DILITHIUM3");
        assert!(matches!(err, Err(CoreError::AlgorithmUnsupported(_))));
    }
}
