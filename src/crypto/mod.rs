//! Cryptographic primitives for the chat key-establishment handshake.
//!
//! ```text
//! HandshakeEngine
//!        │ calls
//!        ▼
//!   crypto::engine   (generate/encapsulate/decapsulate/derive/sign/verify/fingerprint)
//!        │ parameterized by
//!        ▼
//!   crypto::algorithm (KemAlgorithm / SymmetricAlgorithm / SignatureAlgorithm)
//! ```
//!
//! Unlike a compile-time generic crypto provider, every operation here takes
//! its algorithm as a runtime value: the triple is negotiated per chat and
//! carried on the wire in P2P mode, so it cannot be fixed at compile time.

pub mod algorithm;
pub mod engine;

pub use algorithm::{AlgorithmTriple, KemAlgorithm, SignatureAlgorithm, SymmetricAlgorithm};
