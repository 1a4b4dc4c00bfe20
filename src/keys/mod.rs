//! Credential key material in its structured (JWK-style) form, and the
//! converters to and from COSE, PEM and DER.

pub(crate) mod backend;
pub mod cose;
pub mod jwk;
pub mod pem;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encoding::{self, Codec};
use crate::error::{Error, Result};

pub use backend::generate_keypair;
pub use cose::{cose_to_key, decode_cose_key, key_to_cose};
pub use pem::{der_to_key, key_to_der, key_to_pem, pem_to_der, pem_to_key, public_key_to_pem};

/// Signature algorithms understood by the engine, with their COSE identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "ES256")]
    Es256,
    #[serde(rename = "ES384")]
    Es384,
    #[serde(rename = "ES512")]
    Es512,
    #[serde(rename = "PS256")]
    Ps256,
    #[serde(rename = "PS384")]
    Ps384,
    #[serde(rename = "PS512")]
    Ps512,
    #[serde(rename = "RS256")]
    Rs256,
    #[serde(rename = "RS384")]
    Rs384,
    #[serde(rename = "RS512")]
    Rs512,
    #[serde(rename = "EdDSA")]
    EdDsa,
}

/// Digest bound to an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    pub const ALL: [Algorithm; 10] = [
        Algorithm::Es256,
        Algorithm::Es384,
        Algorithm::Es512,
        Algorithm::Ps256,
        Algorithm::Ps384,
        Algorithm::Ps512,
        Algorithm::Rs256,
        Algorithm::Rs384,
        Algorithm::Rs512,
        Algorithm::EdDsa,
    ];

    pub fn cose_id(self) -> i64 {
        match self {
            Algorithm::Es256 => -7,
            Algorithm::Es384 => -35,
            Algorithm::Es512 => -36,
            Algorithm::Ps256 => -37,
            Algorithm::Ps384 => -38,
            Algorithm::Ps512 => -39,
            Algorithm::Rs256 => -257,
            Algorithm::Rs384 => -258,
            Algorithm::Rs512 => -259,
            Algorithm::EdDsa => -8,
        }
    }

    pub fn from_cose_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.cose_id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Es256 => "ES256",
            Algorithm::Es384 => "ES384",
            Algorithm::Es512 => "ES512",
            Algorithm::Ps256 => "PS256",
            Algorithm::Ps384 => "PS384",
            Algorithm::Ps512 => "PS512",
            Algorithm::Rs256 => "RS256",
            Algorithm::Rs384 => "RS384",
            Algorithm::Rs512 => "RS512",
            Algorithm::EdDsa => "EdDSA",
        }
    }

    /// Curve implied by an ECDSA algorithm.
    pub fn ec_curve(self) -> Option<EcCurve> {
        match self {
            Algorithm::Es256 => Some(EcCurve::P256),
            Algorithm::Es384 => Some(EcCurve::P384),
            Algorithm::Es512 => Some(EcCurve::P521),
            _ => None,
        }
    }

    pub fn is_rsa(self) -> bool {
        matches!(
            self,
            Algorithm::Ps256
                | Algorithm::Ps384
                | Algorithm::Ps512
                | Algorithm::Rs256
                | Algorithm::Rs384
                | Algorithm::Rs512
        )
    }

    /// RSA-PSS salt length in bytes; `None` for every non-PSS algorithm.
    pub fn pss_salt_len(self) -> Option<usize> {
        match self {
            Algorithm::Ps256 => Some(32),
            Algorithm::Ps384 => Some(48),
            Algorithm::Ps512 => Some(64),
            _ => None,
        }
    }

    /// EdDSA hashes internally and has no separate digest.
    pub fn hash(self) -> Option<HashAlg> {
        match self {
            Algorithm::Es256 | Algorithm::Ps256 | Algorithm::Rs256 => Some(HashAlg::Sha256),
            Algorithm::Es384 | Algorithm::Ps384 | Algorithm::Rs384 => Some(HashAlg::Sha384),
            Algorithm::Es512 | Algorithm::Ps512 | Algorithm::Rs512 => Some(HashAlg::Sha512),
            Algorithm::EdDsa => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcCurve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
}

impl EcCurve {
    pub fn cose_id(self) -> i64 {
        match self {
            EcCurve::P256 => 1,
            EcCurve::P384 => 2,
            EcCurve::P521 => 3,
        }
    }

    pub fn from_cose_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(EcCurve::P256),
            2 => Some(EcCurve::P384),
            3 => Some(EcCurve::P521),
            _ => None,
        }
    }

    /// Byte width of a coordinate, a scalar, and each half of a raw signature.
    pub fn width(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }

    pub fn algorithm(self) -> Algorithm {
        match self {
            EcCurve::P256 => Algorithm::Es256,
            EcCurve::P384 => Algorithm::Es384,
            EcCurve::P521 => Algorithm::Es512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OkpCurve {
    Ed25519,
}

impl OkpCurve {
    pub fn cose_id(self) -> i64 {
        6
    }

    pub fn from_cose_id(id: i64) -> Option<Self> {
        (id == 6).then_some(OkpCurve::Ed25519)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcKey {
    pub alg: Algorithm,
    pub crv: EcCurve,
    #[serde(with = "jwk::b64url")]
    pub x:   Vec<u8>,
    #[serde(with = "jwk::b64url")]
    pub y:   Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "jwk::b64url_option")]
    pub d:   Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaKey {
    pub alg: Algorithm,
    #[serde(with = "jwk::b64url")]
    pub n:   Vec<u8>,
    #[serde(with = "jwk::b64url")]
    pub e:   Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "jwk::b64url_option")]
    pub d:   Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "jwk::b64url_option")]
    pub p:   Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "jwk::b64url_option")]
    pub q:   Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "jwk::b64url_option")]
    pub dp:  Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "jwk::b64url_option")]
    pub dq:  Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "jwk::b64url_option")]
    pub qi:  Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkpKey {
    pub alg: Algorithm,
    pub crv: OkpCurve,
    #[serde(with = "jwk::b64url")]
    pub x:   Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "jwk::b64url_option")]
    pub d:   Option<Vec<u8>>,
}

/// A public or private key with its declared signature algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum Key {
    #[serde(rename = "EC")]
    Ec(EcKey),
    #[serde(rename = "RSA")]
    Rsa(RsaKey),
    #[serde(rename = "OKP")]
    Okp(OkpKey),
}

impl Key {
    pub fn alg(&self) -> Algorithm {
        match self {
            Key::Ec(k) => k.alg,
            Key::Rsa(k) => k.alg,
            Key::Okp(k) => k.alg,
        }
    }

    pub fn kty(&self) -> &'static str {
        match self {
            Key::Ec(_) => "EC",
            Key::Rsa(_) => "RSA",
            Key::Okp(_) => "OKP",
        }
    }

    pub fn is_private(&self) -> bool {
        match self {
            Key::Ec(k) => k.d.is_some(),
            Key::Rsa(k) => k.d.is_some(),
            Key::Okp(k) => k.d.is_some(),
        }
    }

    /// Drop every private component.
    pub fn to_public(&self) -> Key {
        match self {
            Key::Ec(k) => Key::Ec(EcKey { d: None, ..k.clone() }),
            Key::Rsa(k) => Key::Rsa(RsaKey {
                alg: k.alg,
                n:   k.n.clone(),
                e:   k.e.clone(),
                d:   None,
                p:   None,
                q:   None,
                dp:  None,
                dq:  None,
                qi:  None,
            }),
            Key::Okp(k) => Key::Okp(OkpKey { d: None, ..k.clone() }),
        }
    }

    /// Confirm the declared algorithm belongs to this key type and curve.
    pub fn check(&self) -> Result<()> {
        let ok = match self {
            Key::Ec(k) => k.alg.ec_curve() == Some(k.crv),
            Key::Rsa(k) => k.alg.is_rsa(),
            Key::Okp(k) => k.alg == Algorithm::EdDsa,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::UnsupportedAlgorithm(format!(
                "{} declared on {} key",
                self.alg(),
                self.kty()
            )))
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let key: Key = serde_json::from_str(json)?;
        key.check()?;
        Ok(key)
    }
}

/// Text renderings a key can be exported to or imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    Cose,
    Pem,
    Der,
}

/// Render `key` as COSE or DER bytes in `codec`, or as PEM text (codec ignored).
pub fn export_key(key: &Key, format: KeyFormat, codec: Codec) -> Result<String> {
    match format {
        KeyFormat::Cose => Ok(encoding::encode(&key_to_cose(key)?, codec)),
        KeyFormat::Pem => key_to_pem(key),
        KeyFormat::Der => Ok(encoding::encode(&key_to_der(key)?, codec)),
    }
}

/// Inverse of [`export_key`]. PEM and DER carry no algorithm of their own, so
/// `alg` names it; COSE keys bring their own and `alg` is ignored.
pub fn import_key(text: &str, format: KeyFormat, codec: Codec, alg: Algorithm) -> Result<Key> {
    match format {
        KeyFormat::Cose => cose_to_key(&encoding::decode(text, codec)?),
        KeyFormat::Pem => pem_to_key(text, alg),
        KeyFormat::Der => der_to_key(&encoding::decode(text, codec)?, alg),
    }
}
