//! Versioned, length-prefixed binary encoding for `ChatKeyRing`, as persisted
//! in the `keys_blob` column of a chat row.
//!
//! Layout: a 2-byte version, three fixed-width 16-byte algorithm tags (kem,
//! symmetric, signature — right-padded with NUL), a 1-byte presence bitmap,
//! then each present field of the ring as a 2-byte length prefix followed by
//! its raw bytes, in the fixed order own_public, own_private, peer_public,
//! symmetric.

use crate::config::Config;
use crate::crypto::{AlgorithmTriple, KemAlgorithm, SignatureAlgorithm, SymmetricAlgorithm};
use crate::error::{CoreError, Result};
use crate::keyring::ChatKeyRing;

const TAG_WIDTH: usize = 16;

const BIT_OWN_PUBLIC: u8 = 1 << 0;
const BIT_OWN_PRIVATE: u8 = 1 << 1;
const BIT_PEER_PUBLIC: u8 = 1 << 2;
const BIT_SYMMETRIC: u8 = 1 << 3;

fn pack_tag(tag: &str) -> [u8; TAG_WIDTH] {
    let mut buf = [0u8; TAG_WIDTH];
    let bytes = tag.as_bytes();
    let n = bytes.len().min(TAG_WIDTH);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

fn unpack_tag(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn write_field(out: &mut Vec<u8>, field: &Option<Vec<u8>>) -> Result<()> {
    if let Some(bytes) = field {
        let len: u16 = bytes
            .len()
            .try_into()
            .map_err(|_| CoreError::MalformedMessage("key field too long to persist".into()))?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(bytes);
    }
    Ok(())
}

/// Encode a `ChatKeyRing` into the versioned binary layout.
pub fn encode_keys_blob(ring: &ChatKeyRing) -> Result<Vec<u8>> {
    let algorithms = ring
        .algorithms
        .ok_or_else(|| CoreError::MalformedMessage("keyring has no algorithm triple".into()))?;

    let mut out = Vec::new();
    out.extend_from_slice(&Config::global().keys_blob_version.to_be_bytes());
    out.extend_from_slice(&pack_tag(algorithms.kem.wire_tag()));
    out.extend_from_slice(&pack_tag(algorithms.symmetric.wire_tag()));
    out.extend_from_slice(&pack_tag(algorithms.signature.wire_tag()));

    let mut bitmap = 0u8;
    if ring.own_public.is_some() {
        bitmap |= BIT_OWN_PUBLIC;
    }
    if ring.own_private.is_some() {
        bitmap |= BIT_OWN_PRIVATE;
    }
    if ring.peer_public.is_some() {
        bitmap |= BIT_PEER_PUBLIC;
    }
    if ring.symmetric.is_some() {
        bitmap |= BIT_SYMMETRIC;
    }
    out.push(bitmap);

    write_field(&mut out, &ring.own_public)?;
    write_field(&mut out, &ring.own_private)?;
    write_field(&mut out, &ring.peer_public)?;
    write_field(&mut out, &ring.symmetric)?;

    Ok(out)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(CoreError::MalformedMessage("keys_blob truncated".into()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_field(&mut self, present: bool) -> Result<Option<Vec<u8>>> {
        if !present {
            return Ok(None);
        }
        let len_bytes = self.take(2)?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        Ok(Some(self.take(len)?.to_vec()))
    }
}

/// Decode a `keys_blob` back into a `ChatKeyRing`.
///
/// Returns `CoreError::MalformedMessage` on any structural problem; callers
/// on the read path treat that as "corrupt key material" and keep the chat
/// identity with a null ring rather than failing the whole read.
pub fn decode_keys_blob(bytes: &[u8]) -> Result<ChatKeyRing> {
    let mut cursor = Cursor { bytes, pos: 0 };

    let version_bytes = cursor.take(2)?;
    let version = u16::from_be_bytes([version_bytes[0], version_bytes[1]]);
    if version != Config::global().keys_blob_version {
        return Err(CoreError::MalformedMessage(format!(
            "unsupported keys_blob version {version}"
        )));
    }

    let kem_tag = unpack_tag(cursor.take(TAG_WIDTH)?);
    let symmetric_tag = unpack_tag(cursor.take(TAG_WIDTH)?);
    let signature_tag = unpack_tag(cursor.take(TAG_WIDTH)?);

    let kem = KemAlgorithm::from_wire_tag(&kem_tag)
        .ok_or_else(|| CoreError::MalformedMessage(format!("unknown kem tag {kem_tag}")))?;
    let symmetric = SymmetricAlgorithm::from_wire_tag(&symmetric_tag)
        .ok_or_else(|| CoreError::MalformedMessage(format!("unknown symmetric tag {symmetric_tag}")))?;
    let signature = SignatureAlgorithm::from_wire_tag(&signature_tag)
        .ok_or_else(|| CoreError::MalformedMessage(format!("unknown signature tag {signature_tag}")))?;

    let bitmap = cursor.take(1)?[0];

    let mut ring = ChatKeyRing::new(AlgorithmTriple::new(kem, symmetric, signature));
    ring.own_public = cursor.take_field(bitmap & BIT_OWN_PUBLIC != 0)?;
    ring.own_private = cursor.take_field(bitmap & BIT_OWN_PRIVATE != 0)?;
    ring.peer_public = cursor.take_field(bitmap & BIT_PEER_PUBLIC != 0)?;
    ring.symmetric = cursor.take_field(bitmap & BIT_SYMMETRIC != 0)?;

    Ok(ring)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_complete_ring() {
        let mut ring = ChatKeyRing::new(AlgorithmTriple::new(
            KemAlgorithm::Kyber768,
            SymmetricAlgorithm::Aes256Gcm,
            SignatureAlgorithm::Dilithium3,
        ));
        ring.own_public = Some(vec![1; 8]);
        ring.own_private = Some(vec![2; 8]);
        ring.peer_public = Some(vec![3; 8]);
        ring.symmetric = Some(vec![4; 32]);

        let blob = encode_keys_blob(&ring).unwrap();
        let decoded = decode_keys_blob(&blob).unwrap();

        assert_eq!(decoded.own_public, ring.own_public);
        assert_eq!(decoded.own_private, ring.own_private);
        assert_eq!(decoded.peer_public, ring.peer_public);
        assert_eq!(decoded.symmetric, ring.symmetric);
        assert_eq!(decoded.algorithms, ring.algorithms);
    }

    #[test]
    fn round_trips_a_post_establishment_ring() {
        let mut ring = ChatKeyRing::new(AlgorithmTriple::new(
            KemAlgorithm::Kyber512,
            SymmetricAlgorithm::ChaCha20Poly1305,
            SignatureAlgorithm::Dilithium2,
        ));
        ring.symmetric = Some(vec![7; 32]);

        let blob = encode_keys_blob(&ring).unwrap();
        let decoded = decode_keys_blob(&blob).unwrap();
        assert!(decoded.own_public.is_none());
        assert!(decoded.own_private.is_none());
        assert!(decoded.peer_public.is_none());
        assert_eq!(decoded.symmetric, Some(vec![7; 32]));
    }

    #[test]
    fn rejects_truncated_blob() {
        let err = decode_keys_blob(&[0, 1, 2]);
        assert!(matches!(err, Err(CoreError::MalformedMessage(_))));
    }
}
