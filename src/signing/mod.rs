//! Signature engine: sign and verify payloads with a structured [`Key`].

pub mod ecdsa;

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};

use crate::error::{Error, Result};
use crate::keys::{Algorithm, EcKey, Key, OkpKey, RsaKey, backend};

/// Byte layout of an ECDSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EcSignatureFormat {
    /// ASN.1 `SEQUENCE { r INTEGER, s INTEGER }`, as carried by WebAuthn.
    #[default]
    Der,
    /// Fixed-width `r || s` (JOSE).
    Raw,
}

/// What the ECDSA primitives in this crate emit and accept.
pub const NATIVE_EC_FORMAT: EcSignatureFormat = EcSignatureFormat::Raw;

/// Signs and verifies with a fixed ECDSA wire format. RSA and EdDSA
/// signatures are unaffected by the format.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureEngine {
    ec_format: EcSignatureFormat,
}

impl SignatureEngine {
    pub fn new(ec_format: EcSignatureFormat) -> Self {
        Self { ec_format }
    }

    pub fn ec_format(&self) -> EcSignatureFormat {
        self.ec_format
    }

    pub fn sign(&self, key: &Key, payload: &[u8]) -> Result<Vec<u8>> {
        key.check()?;
        if !key.is_private() {
            return Err(Error::Crypto(format!("{} key has no private part", key.kty())));
        }
        let sig = match key {
            Key::Ec(k) => {
                let raw = backend::ec_sign_raw(k, payload)?;
                self.ec_from_native(k, raw)?
            }
            Key::Rsa(k) => rsa_sign(k, payload)?,
            Key::Okp(k) => backend::ed25519_signing(k)?.try_sign(payload).map_err(sign_err)?.to_vec(),
        };
        tracing::debug!(alg = %key.alg(), payload = %hex::encode(payload), len = sig.len(), "Signed payload");
        Ok(sig)
    }

    /// `Ok(false)` for any signature that does not verify, including ones
    /// that cannot be parsed. Errors are reserved for unusable keys.
    pub fn verify(&self, key: &Key, payload: &[u8], signature: &[u8]) -> Result<bool> {
        key.check()?;
        let ok = match key {
            Key::Ec(k) => {
                // an unparseable signature still gets the key validated
                let raw = self.ec_to_native(k, signature).unwrap_or_default();
                backend::ec_verify_raw(k, payload, &raw)?
            }
            Key::Rsa(k) => rsa_verify(k, payload, signature)?,
            Key::Okp(k) => ed25519_verify(k, payload, signature)?,
        };
        tracing::debug!(alg = %key.alg(), ok, "Verified signature");
        Ok(ok)
    }

    fn ec_from_native(&self, key: &EcKey, raw: Vec<u8>) -> Result<Vec<u8>> {
        match (NATIVE_EC_FORMAT, self.ec_format) {
            (a, b) if a == b => Ok(raw),
            (EcSignatureFormat::Raw, EcSignatureFormat::Der) => ecdsa::raw_to_der(&raw, key.crv),
            _ => ecdsa::der_to_raw(&raw, key.crv),
        }
    }

    fn ec_to_native(&self, key: &EcKey, sig: &[u8]) -> Result<Vec<u8>> {
        match (self.ec_format, NATIVE_EC_FORMAT) {
            (a, b) if a == b => Ok(sig.to_vec()),
            (EcSignatureFormat::Der, EcSignatureFormat::Raw) => ecdsa::der_to_raw(sig, key.crv),
            _ => ecdsa::raw_to_der(sig, key.crv),
        }
    }
}

/// Sign with the default engine (DER ECDSA signatures).
pub fn sign(key: &Key, payload: &[u8]) -> Result<Vec<u8>> {
    SignatureEngine::default().sign(key, payload)
}

/// Verify with the default engine (DER ECDSA signatures).
pub fn verify(key: &Key, payload: &[u8], signature: &[u8]) -> Result<bool> {
    SignatureEngine::default().verify(key, payload, signature)
}

/// The bytes an authenticator signs for an assertion:
/// `authenticatorData || SHA-256(clientDataJSON)`.
pub fn assertion_payload(authenticator_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let mut payload = authenticator_data.to_vec();
    payload.extend_from_slice(&Sha256::digest(client_data_json));
    payload
}

fn sign_err(e: signature::Error) -> Error {
    Error::Crypto(format!("sign: {e}"))
}

fn rsa_sign(key: &RsaKey, payload: &[u8]) -> Result<Vec<u8>> {
    use rsa::{pkcs1v15, pss};

    let private = backend::rsa_private(key)?;
    macro_rules! pkcs1 {
        ($digest:ty) => {
            pkcs1v15::SigningKey::<$digest>::new(private)
                .try_sign(payload)
                .map_err(sign_err)?
                .to_vec()
        };
    }
    macro_rules! pss {
        ($digest:ty, $salt:expr) => {
            pss::SigningKey::<$digest>::new_with_salt_len(private, $salt)
                .try_sign_with_rng(&mut OsRng, payload)
                .map_err(sign_err)?
                .to_vec()
        };
    }
    let sig = match key.alg {
        Algorithm::Rs256 => pkcs1!(Sha256),
        Algorithm::Rs384 => pkcs1!(Sha384),
        Algorithm::Rs512 => pkcs1!(Sha512),
        Algorithm::Ps256 => pss!(Sha256, 32),
        Algorithm::Ps384 => pss!(Sha384, 48),
        Algorithm::Ps512 => pss!(Sha512, 64),
        other => return Err(Error::UnsupportedAlgorithm(format!("{other} on RSA key"))),
    };
    Ok(sig)
}

fn rsa_verify(key: &RsaKey, payload: &[u8], signature: &[u8]) -> Result<bool> {
    use rsa::{pkcs1v15, pss};

    let public = backend::rsa_public(key)?;
    macro_rules! pkcs1 {
        ($digest:ty) => {
            match pkcs1v15::Signature::try_from(signature) {
                Ok(sig) => pkcs1v15::VerifyingKey::<$digest>::new(public).verify(payload, &sig).is_ok(),
                Err(_) => false,
            }
        };
    }
    macro_rules! pss {
        ($digest:ty, $salt:expr) => {
            match pss::Signature::try_from(signature) {
                Ok(sig) => pss::VerifyingKey::<$digest>::new_with_salt_len(public, $salt)
                    .verify(payload, &sig)
                    .is_ok(),
                Err(_) => false,
            }
        };
    }
    let ok = match key.alg {
        Algorithm::Rs256 => pkcs1!(Sha256),
        Algorithm::Rs384 => pkcs1!(Sha384),
        Algorithm::Rs512 => pkcs1!(Sha512),
        Algorithm::Ps256 => pss!(Sha256, 32),
        Algorithm::Ps384 => pss!(Sha384, 48),
        Algorithm::Ps512 => pss!(Sha512, 64),
        other => return Err(Error::UnsupportedAlgorithm(format!("{other} on RSA key"))),
    };
    Ok(ok)
}

fn ed25519_verify(key: &OkpKey, payload: &[u8], signature: &[u8]) -> Result<bool> {
    let verifying = backend::ed25519_verifying(key)?;
    let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
        return Ok(false);
    };
    Ok(verifying.verify(payload, &sig).is_ok())
}
