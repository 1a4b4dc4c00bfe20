//! serde adapters for JWK byte members (unpadded base64url text).

pub mod b64url {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::encoding::{base64url_to_bytes, bytes_to_base64url};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&bytes_to_base64url(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        base64url_to_bytes(&text).map_err(serde::de::Error::custom)
    }
}

pub mod b64url_option {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::encoding::{base64url_to_bytes, bytes_to_base64url};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&bytes_to_base64url(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(text) => base64url_to_bytes(&text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
