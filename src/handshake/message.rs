//! Wire schema for the four handshake message kinds plus `CHAT_DELETE`.
//!
//! Byte fields are base64-encoded so the envelope is safe to carry over a
//! text-framed transport (the concrete transports are out of scope here).

use serde::{Deserialize, Serialize};

use crate::crypto::algorithm::{KemAlgorithm, SignatureAlgorithm, SymmetricAlgorithm};

mod b64field {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        general_purpose::STANDARD.encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

mod b64field_opt {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        bytes.as_ref().map(|b| general_purpose::STANDARD.encode(b)).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| general_purpose::STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// The `(kem, symmetric, signature)` triple as it appears on the wire:
/// present in P2P mode, absent in server mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAlgorithms {
    pub asymmetric: String,
    pub symmetric: String,
    pub signature: String,
}

impl WireAlgorithms {
    pub fn from_triple(kem: KemAlgorithm, symmetric: SymmetricAlgorithm, signature: SignatureAlgorithm) -> Self {
        Self {
            asymmetric: kem.wire_tag().to_string(),
            symmetric: symmetric.wire_tag().to_string(),
            signature: signature.wire_tag().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInitRequest {
    pub chat_uuid: String,
    #[serde(with = "b64field")]
    pub public_key: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crypto_algorithms: Option<WireAlgorithms>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInitResponse {
    pub chat_uuid: String,
    #[serde(with = "b64field")]
    pub public_key: Vec<u8>,
    #[serde(with = "b64field")]
    pub kem_capsule: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crypto_algorithms: Option<WireAlgorithms>,
    #[serde(default, with = "b64field_opt", skip_serializing_if = "Option::is_none")]
    pub user_signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInitConfirm {
    pub chat_uuid: String,
    #[serde(with = "b64field")]
    pub kem_capsule: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInitSignature {
    pub chat_uuid: String,
    #[serde(with = "b64field")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDelete {
    pub chat_uuid: String,
    pub reason: String,
}

/// The envelope carried by the transport: `{type, chat_uuid, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum HandshakeMessage {
    #[serde(rename = "CHAT_INIT_REQUEST")]
    ChatInitRequest(ChatInitRequest),
    #[serde(rename = "CHAT_INIT_RESPONSE")]
    ChatInitResponse(ChatInitResponse),
    #[serde(rename = "CHAT_INIT_CONFIRM")]
    ChatInitConfirm(ChatInitConfirm),
    #[serde(rename = "CHAT_INIT_SIGNATURE")]
    ChatInitSignature(ChatInitSignature),
    #[serde(rename = "CHAT_DELETE")]
    ChatDelete(ChatDelete),
}

impl HandshakeMessage {
    pub fn chat_uuid(&self) -> &str {
        match self {
            Self::ChatInitRequest(m) => &m.chat_uuid,
            Self::ChatInitResponse(m) => &m.chat_uuid,
            Self::ChatInitConfirm(m) => &m.chat_uuid,
            Self::ChatInitSignature(m) => &m.chat_uuid,
            Self::ChatDelete(m) => &m.chat_uuid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_request_round_trips_through_json() {
        let msg = HandshakeMessage::ChatInitRequest(ChatInitRequest {
            chat_uuid: "c1".into(),
            public_key: vec![1, 2, 3, 4],
            crypto_algorithms: Some(WireAlgorithms {
                asymmetric: "KYBER768".into(),
                symmetric: "AES-256".into(),
                signature: "DILITHIUM3".into(),
            }),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("CHAT_INIT_REQUEST"));
        let decoded: HandshakeMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.chat_uuid(), "c1");
    }
}
