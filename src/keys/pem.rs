use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use p256::pkcs8::spki::{AlgorithmIdentifierRef, SubjectPublicKeyInfoRef};
use p256::pkcs8::{ObjectIdentifier, PrivateKeyInfo};

use super::{Algorithm, EcCurve, Key, backend};
use crate::error::{Error, Result};

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const OID_P521: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// Key family carried by a PEM block. SEC1 blocks do not name their curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Ec(Option<EcCurve>),
    Rsa,
    Ed25519,
}

impl KeyFamily {
    fn accepts(self, alg: Algorithm) -> bool {
        match self {
            KeyFamily::Ec(None) => alg.ec_curve().is_some(),
            KeyFamily::Ec(Some(crv)) => alg.ec_curve() == Some(crv),
            KeyFamily::Rsa => alg.is_rsa(),
            KeyFamily::Ed25519 => alg == Algorithm::EdDsa,
        }
    }
}

fn family_of(id: AlgorithmIdentifierRef<'_>) -> Result<KeyFamily> {
    if id.oid == OID_RSA_ENCRYPTION {
        Ok(KeyFamily::Rsa)
    } else if id.oid == OID_ED25519 {
        Ok(KeyFamily::Ed25519)
    } else if id.oid == OID_EC_PUBLIC_KEY {
        let curve = id
            .parameters_oid()
            .map_err(|e| Error::Crypto(format!("EC curve parameters: {e}")))?;
        match curve {
            c if c == OID_P256 => Ok(KeyFamily::Ec(Some(EcCurve::P256))),
            c if c == OID_P384 => Ok(KeyFamily::Ec(Some(EcCurve::P384))),
            c if c == OID_P521 => Ok(KeyFamily::Ec(Some(EcCurve::P521))),
            c => Err(Error::UnsupportedAlgorithm(format!("EC curve {c}"))),
        }
    } else {
        Err(Error::UnsupportedAlgorithm(format!("key algorithm {}", id.oid)))
    }
}

fn pem_label(pem: &str) -> Result<&str> {
    pem.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("-----BEGIN ")?.strip_suffix("-----"))
        .ok_or_else(|| Error::Decode("PEM has no BEGIN line".into()))
}

fn pem_family(pem: &str) -> Result<KeyFamily> {
    match pem_label(pem)? {
        "RSA PRIVATE KEY" | "RSA PUBLIC KEY" => Ok(KeyFamily::Rsa),
        "EC PRIVATE KEY" => Ok(KeyFamily::Ec(None)),
        "PRIVATE KEY" => {
            let der = pem_to_der(pem)?;
            let info = PrivateKeyInfo::try_from(der.as_slice())
                .map_err(|e| Error::Crypto(format!("PKCS#8: {e}")))?;
            family_of(info.algorithm)
        }
        "PUBLIC KEY" => {
            let der = pem_to_der(pem)?;
            let info = SubjectPublicKeyInfoRef::try_from(der.as_slice())
                .map_err(|e| Error::Crypto(format!("SubjectPublicKeyInfo: {e}")))?;
            family_of(info.algorithm)
        }
        other => Err(Error::Decode(format!("unsupported PEM label {other:?}"))),
    }
}

/// PKCS#8 PEM for private keys, SubjectPublicKeyInfo PEM for public keys.
pub fn key_to_pem(key: &Key) -> Result<String> {
    to_pem(key, true)
}

/// SubjectPublicKeyInfo PEM for the public half of `key`.
pub fn public_key_to_pem(key: &Key) -> Result<String> {
    to_pem(key, false)
}

fn to_pem(key: &Key, private: bool) -> Result<String> {
    key.check()?;
    match key {
        Key::Ec(k) => backend::ec_to_pem(k, private),
        Key::Rsa(k) => backend::rsa_to_pem(k, private),
        Key::Okp(k) => backend::okp_to_pem(k, private),
    }
}

/// Parse a PEM key. The algorithm must match the key family (and curve)
/// the PEM carries; for RSA it also picks the signature scheme recorded on
/// the result.
pub fn pem_to_key(pem: &str, alg: Algorithm) -> Result<Key> {
    let family = pem_family(pem)?;
    if !family.accepts(alg) {
        return Err(Error::UnsupportedAlgorithm(format!("{alg} does not fit a {family:?} key")));
    }
    let key = if let Some(crv) = alg.ec_curve() {
        Key::Ec(backend::ec_from_pem(pem, crv)?)
    } else if alg.is_rsa() {
        Key::Rsa(backend::rsa_from_pem(pem, alg)?)
    } else {
        Key::Okp(backend::okp_from_pem(pem)?)
    };
    tracing::debug!(kty = key.kty(), alg = %alg, private = key.is_private(), "Decoded PEM key");
    Ok(key)
}

/// Strip the armour lines and decode the enclosed base64.
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();
    if body.is_empty() {
        return Err(Error::Decode("PEM has no body".into()));
    }
    STANDARD
        .decode(body)
        .map_err(|e| Error::Decode(format!("PEM body: {e}")))
}

pub fn key_to_der(key: &Key) -> Result<Vec<u8>> {
    pem_to_der(&key_to_pem(key)?)
}

fn der_to_pem(der: &[u8], label: &str) -> String {
    let body = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(64) {
        // base64 output is ASCII
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}

/// Parse a PKCS#8 or SubjectPublicKeyInfo DER key.
pub fn der_to_key(der: &[u8], alg: Algorithm) -> Result<Key> {
    let label = if PrivateKeyInfo::try_from(der).is_ok() { "PRIVATE KEY" } else { "PUBLIC KEY" };
    pem_to_key(&der_to_pem(der, label), alg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    #[test]
    fn test_pem_to_der_strips_armour() {
        let pem = "-----BEGIN PUBLIC KEY-----\nAQID\nBA==\n-----END PUBLIC KEY-----\n";
        assert_eq!(pem_to_der(pem).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_pem_to_der_empty() {
        let pem = "-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----\n";
        assert!(matches!(pem_to_der(pem), Err(Error::Decode(_))));
    }

    #[test]
    fn test_der_roundtrip_public_and_private() {
        let key = generate_keypair(Algorithm::Es256, 0).unwrap();
        let der = key_to_der(&key).unwrap();
        assert_eq!(der_to_key(&der, Algorithm::Es256).unwrap(), key);

        let public = key.to_public();
        let der = key_to_der(&public).unwrap();
        assert_eq!(der_to_key(&der, Algorithm::Es256).unwrap(), public);
    }

    #[test]
    fn test_family_mismatch_is_unsupported_algorithm() {
        let ed = generate_keypair(Algorithm::EdDsa, 0).unwrap();
        let spki = public_key_to_pem(&ed).unwrap();
        assert!(matches!(pem_to_key(&spki, Algorithm::Es256), Err(Error::UnsupportedAlgorithm(_))));
        let pkcs8 = key_to_pem(&ed).unwrap();
        assert!(matches!(pem_to_key(&pkcs8, Algorithm::Rs256), Err(Error::UnsupportedAlgorithm(_))));

        let p256 = generate_keypair(Algorithm::Es256, 0).unwrap();
        let der = key_to_der(&p256).unwrap();
        assert!(matches!(der_to_key(&der, Algorithm::Es384), Err(Error::UnsupportedAlgorithm(_))));
        let der = key_to_der(&p256.to_public()).unwrap();
        assert!(matches!(der_to_key(&der, Algorithm::EdDsa), Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_garbage_key_material_is_crypto_error() {
        let pem = "-----BEGIN PUBLIC KEY-----\nAQID\n-----END PUBLIC KEY-----\n";
        assert!(matches!(pem_to_key(pem, Algorithm::Es256), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_public_pem_of_private_key() {
        let key = generate_keypair(Algorithm::EdDsa, 0).unwrap();
        let pem = public_key_to_pem(&key).unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(pem_to_key(&pem, Algorithm::EdDsa).unwrap(), key.to_public());
    }
}
