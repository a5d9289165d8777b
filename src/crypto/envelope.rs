// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! The at-rest representation of an encrypted payload.
//!
//! An envelope is the explicit (ciphertext, nonce, tag) triple produced by
//! AES-256-GCM. The three fields serialize as Base64 strings, so a corrupted
//! or hand-edited record fails JSON/Base64 parsing, visibly distinct from an
//! authentication failure during decryption.

use serde::{Deserialize, Serialize};

/// Encrypted payload: AES-256-GCM ciphertext with its nonce and tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Ciphertext bytes (without the appended GCM tag).
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    /// 96-bit nonce, unique per encryption.
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
    /// 128-bit GCM authentication tag.
    #[serde(with = "b64")]
    pub tag: Vec<u8>,
}

/// Serde helpers encoding byte fields as standard Base64 strings.
pub(crate) mod b64 {
    use base64ct::{Base64, Encoding};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Base64::decode_vec(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for optional byte fields (e.g. a not-yet-provisioned salt).
pub(crate) mod b64_opt {
    use base64ct::{Base64, Encoding};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&Base64::encode_string(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => Base64::decode_vec(&encoded)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = Envelope {
            ciphertext: vec![1, 2, 3, 255],
            nonce: vec![0; 12],
            tag: vec![9; 16],
        };

        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn envelope_fields_are_base64_strings() {
        let envelope = Envelope {
            ciphertext: b"hello".to_vec(),
            nonce: vec![0; 12],
            tag: vec![0; 16],
        };

        let value: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["ciphertext"], "aGVsbG8=");
        assert!(value["nonce"].is_string());
        assert!(value["tag"].is_string());
    }

    #[test]
    fn invalid_base64_is_a_parse_error() {
        let json = r#"{"ciphertext":"not base64!!","nonce":"AAAA","tag":"AAAA"}"#;
        assert!(serde_json::from_str::<Envelope>(json).is_err());
    }
}
