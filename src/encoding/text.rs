use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Standard alphabet, padded on output, padding optional on input.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// URL-safe alphabet, never padded on output, padding optional on input.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Text encoding used when binary artifacts cross the crate boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    #[serde(rename = "hex")]
    Hex,
    #[serde(rename = "b64")]
    Base64,
    #[serde(rename = "b64url")]
    Base64Url,
}

impl Codec {
    pub const ALL: [Codec; 3] = [Codec::Hex, Codec::Base64, Codec::Base64Url];

    pub fn name(self) -> &'static str {
        match self {
            Codec::Hex => "hex",
            Codec::Base64 => "b64",
            Codec::Base64Url => "b64url",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hex" => Ok(Codec::Hex),
            "b64" | "base64" => Ok(Codec::Base64),
            "b64url" | "base64url" => Ok(Codec::Base64Url),
            other => Err(Error::Decode(format!("unknown codec: {other}"))),
        }
    }
}

pub fn encode(bytes: &[u8], codec: Codec) -> String {
    match codec {
        Codec::Hex => bytes_to_hex(bytes),
        Codec::Base64 => BASE64.encode(bytes),
        Codec::Base64Url => bytes_to_base64url(bytes),
    }
}

/// Decode `text` with the selected codec. Surrounding whitespace is ignored;
/// characters outside the codec's alphabet are rejected.
pub fn decode(text: &str, codec: Codec) -> Result<Vec<u8>> {
    let text = text.trim();
    match codec {
        Codec::Hex => hex_to_bytes(text),
        Codec::Base64 => BASE64
            .decode(text)
            .map_err(|e| Error::Decode(format!("base64: {e}"))),
        Codec::Base64Url => base64url_to_bytes(text),
    }
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::Decode(format!("hex: {e}")))
}

pub fn bytes_to_base64url(bytes: &[u8]) -> String {
    BASE64URL.encode(bytes)
}

pub fn base64url_to_bytes(text: &str) -> Result<Vec<u8>> {
    BASE64URL
        .decode(text)
        .map_err(|e| Error::Decode(format!("base64url: {e}")))
}
