use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::{self, Codec};
use crate::error::Result;

pub const TYPE_CREATE: &str = "webauthn.create";
pub const TYPE_GET:    &str = "webauthn.get";

/// clientDataJSON. Members this crate does not model are kept in `extra`
/// and written back after the known ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientData {
    #[serde(rename = "type")]
    pub kind:         String,
    pub challenge:    String,
    pub origin:       String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_origin:   Option<String>,
    #[serde(flatten)]
    pub extra:        serde_json::Map<String, serde_json::Value>,
}

impl ClientData {
    pub fn new(kind: &str, challenge: &str, origin: &str) -> Self {
        Self {
            kind:         kind.to_string(),
            challenge:    challenge.to_string(),
            origin:       origin.to_string(),
            cross_origin: None,
            top_origin:   None,
            extra:        serde_json::Map::new(),
        }
    }

    /// Compact JSON bytes, members in declaration order.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// SHA-256 of [`ClientData::to_json_bytes`].
    pub fn hash(&self) -> Result<[u8; 32]> {
        Ok(Sha256::digest(self.to_json_bytes()?).into())
    }
}

pub fn encode_client_data(data: &ClientData, codec: Codec) -> Result<String> {
    Ok(encoding::encode(&data.to_json_bytes()?, codec))
}

pub fn decode_client_data(text: &str, codec: Codec) -> Result<ClientData> {
    let bytes = encoding::decode(text, codec)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_order() {
        let mut cd = ClientData::new(TYPE_GET, "AAEC", "https://example.com");
        cd.cross_origin = Some(false);
        let json = String::from_utf8(cd.to_json_bytes().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"type":"webauthn.get","challenge":"AAEC","origin":"https://example.com","crossOrigin":false}"#
        );
    }

    #[test]
    fn test_extra_members_survive() {
        let raw = r#"{"type":"webauthn.create","challenge":"x","origin":"https://a.test","other_keys_can_be_added_here":"do not compare clientDataJSON against a template"}"#;
        let text = encoding::encode(raw.as_bytes(), Codec::Base64Url);
        let cd = decode_client_data(&text, Codec::Base64Url).unwrap();
        assert_eq!(cd.kind, TYPE_CREATE);
        assert!(cd.extra.contains_key("other_keys_can_be_added_here"));
        assert_eq!(encode_client_data(&cd, Codec::Base64Url).unwrap(), text);
    }

    #[test]
    fn test_hash_matches_encoded_bytes() {
        let cd = ClientData::new(TYPE_CREATE, "c2FsdA", "https://example.com");
        let bytes = cd.to_json_bytes().unwrap();
        assert_eq!(cd.hash().unwrap().to_vec(), Sha256::digest(&bytes).to_vec());
    }

    #[test]
    fn test_wrong_codec_rejected() {
        let text = encode_client_data(&ClientData::new(TYPE_GET, "x", "o"), Codec::Hex).unwrap();
        assert!(decode_client_data(&text, Codec::Base64Url).is_err());
    }
}
