//! Bridges between the structured key form and the RustCrypto key types.
//!
//! ECDSA primitives here produce and accept fixed-width `r || s` signatures;
//! DER conversion lives in the signing engine.

use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};

use super::{Algorithm, EcCurve, EcKey, Key, OkpCurve, OkpKey, RsaKey};
use crate::error::{Error, Result};

pub(crate) use p256::pkcs8::LineEnding;

fn crypto<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> Error {
    move |e| Error::Crypto(format!("{context}: {e}"))
}

// p256, p384 and p521 expose the same surface under different paths; generics
// over the curve would need a pile of bounds that p521 does not satisfy.
macro_rules! ec_curve_ops {
    ($module:ident, $curve:ident) => {
        pub(crate) mod $module {
            use $curve::ecdsa::signature::{Signer, Verifier};
            use $curve::ecdsa::{Signature, SigningKey, VerifyingKey};
            use $curve::elliptic_curve::sec1::ToEncodedPoint as _;
            use $curve::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
            use $curve::{PublicKey, SecretKey};
            use rand::rngs::OsRng;

            use super::{LineEnding, crypto};
            use crate::error::{Error, Result};

            /// Returns `(x, y, d)`.
            pub(crate) fn generate() -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
                let secret = SecretKey::random(&mut OsRng);
                let (x, y) = coordinates(&secret.public_key())?;
                Ok((x, y, secret.to_bytes().to_vec()))
            }

            fn coordinates(public: &PublicKey) -> Result<(Vec<u8>, Vec<u8>)> {
                let point = public.to_encoded_point(false);
                let x = point.x().ok_or_else(|| Error::Crypto("EC point has no x".into()))?;
                let y = point.y().ok_or_else(|| Error::Crypto("EC point has no y".into()))?;
                Ok((x.to_vec(), y.to_vec()))
            }

            fn sec1(x: &[u8], y: &[u8]) -> Vec<u8> {
                let mut out = Vec::with_capacity(1 + x.len() + y.len());
                out.push(0x04);
                out.extend_from_slice(x);
                out.extend_from_slice(y);
                out
            }

            fn public_key(x: &[u8], y: &[u8]) -> Result<PublicKey> {
                PublicKey::from_sec1_bytes(&sec1(x, y)).map_err(crypto("EC public key"))
            }

            pub(crate) fn private_to_pem(d: &[u8]) -> Result<String> {
                let secret = SecretKey::from_slice(d).map_err(crypto("EC private key"))?;
                let pem = secret.to_pkcs8_pem(LineEnding::LF).map_err(crypto("PKCS#8 export"))?;
                Ok(pem.to_string())
            }

            pub(crate) fn public_to_pem(x: &[u8], y: &[u8]) -> Result<String> {
                public_key(x, y)?
                    .to_public_key_pem(LineEnding::LF)
                    .map_err(crypto("SPKI export"))
            }

            /// Returns `(x, y, d)`; `d` is present for private keys.
            pub(crate) fn from_pem(pem: &str) -> Result<(Vec<u8>, Vec<u8>, Option<Vec<u8>>)> {
                let secret = SecretKey::from_pkcs8_pem(pem).or_else(|_| SecretKey::from_sec1_pem(pem));
                if let Ok(secret) = secret {
                    let (x, y) = coordinates(&secret.public_key())?;
                    return Ok((x, y, Some(secret.to_bytes().to_vec())));
                }
                let public = PublicKey::from_public_key_pem(pem).map_err(crypto("EC PEM"))?;
                let (x, y) = coordinates(&public)?;
                Ok((x, y, None))
            }

            pub(crate) fn sign(d: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
                let key = SigningKey::from_slice(d).map_err(crypto("EC signing key"))?;
                let sig: Signature = key.try_sign(payload).map_err(crypto("ECDSA sign"))?;
                Ok(sig.to_bytes().to_vec())
            }

            pub(crate) fn verify(x: &[u8], y: &[u8], payload: &[u8], raw: &[u8]) -> Result<bool> {
                let key = VerifyingKey::from_sec1_bytes(&sec1(x, y)).map_err(crypto("EC verifying key"))?;
                let Ok(sig) = Signature::from_slice(raw) else {
                    return Ok(false);
                };
                Ok(key.verify(payload, &sig).is_ok())
            }
        }
    };
}

ec_curve_ops!(ec_p256, p256);
ec_curve_ops!(ec_p384, p384);
ec_curve_ops!(ec_p521, p521);

macro_rules! per_curve {
    ($crv:expr, $func:ident ( $($arg:expr),* )) => {
        match $crv {
            EcCurve::P256 => ec_p256::$func($($arg),*),
            EcCurve::P384 => ec_p384::$func($($arg),*),
            EcCurve::P521 => ec_p521::$func($($arg),*),
        }
    };
}

pub(crate) fn ec_sign_raw(key: &EcKey, payload: &[u8]) -> Result<Vec<u8>> {
    let d = key.d.as_deref().ok_or_else(|| Error::Crypto("EC key has no private part".into()))?;
    per_curve!(key.crv, sign(d, payload))
}

pub(crate) fn ec_verify_raw(key: &EcKey, payload: &[u8], raw: &[u8]) -> Result<bool> {
    per_curve!(key.crv, verify(&key.x, &key.y, payload, raw))
}

pub(crate) fn ec_to_pem(key: &EcKey, private: bool) -> Result<String> {
    match (&key.d, private) {
        (Some(d), true) => per_curve!(key.crv, private_to_pem(d)),
        _ => per_curve!(key.crv, public_to_pem(&key.x, &key.y)),
    }
}

pub(crate) fn ec_from_pem(pem: &str, crv: EcCurve) -> Result<EcKey> {
    let (x, y, d) = per_curve!(crv, from_pem(pem))?;
    Ok(EcKey { alg: crv.algorithm(), crv, x, y, d })
}

// RSA

fn biguint(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

pub(crate) fn rsa_private(key: &RsaKey) -> Result<RsaPrivateKey> {
    let d = key.d.as_deref().ok_or_else(|| Error::Crypto("RSA key has no private part".into()))?;
    let primes = match (&key.p, &key.q) {
        (Some(p), Some(q)) => vec![biguint(p), biguint(q)],
        _ => Vec::new(),
    };
    RsaPrivateKey::from_components(biguint(&key.n), biguint(&key.e), biguint(d), primes)
        .map_err(crypto("RSA private key"))
}

pub(crate) fn rsa_public(key: &RsaKey) -> Result<RsaPublicKey> {
    RsaPublicKey::new(biguint(&key.n), biguint(&key.e)).map_err(crypto("RSA public key"))
}

pub(crate) fn rsa_key_from_private(alg: Algorithm, private: &RsaPrivateKey) -> RsaKey {
    let primes = private.primes();
    RsaKey {
        alg,
        n:  private.n().to_bytes_be(),
        e:  private.e().to_bytes_be(),
        d:  Some(private.d().to_bytes_be()),
        p:  primes.first().map(BigUint::to_bytes_be),
        q:  primes.get(1).map(BigUint::to_bytes_be),
        dp: private.dp().map(BigUint::to_bytes_be),
        dq: private.dq().map(BigUint::to_bytes_be),
        qi: private.qinv().map(|v| v.to_bytes_be().1),
    }
}

pub(crate) fn rsa_key_from_public(alg: Algorithm, public: &RsaPublicKey) -> RsaKey {
    RsaKey {
        alg,
        n:  public.n().to_bytes_be(),
        e:  public.e().to_bytes_be(),
        d:  None,
        p:  None,
        q:  None,
        dp: None,
        dq: None,
        qi: None,
    }
}

pub(crate) fn rsa_to_pem(key: &RsaKey, private: bool) -> Result<String> {
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};

    if private && key.d.is_some() {
        let pem = rsa_private(key)?
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(crypto("PKCS#8 export"))?;
        Ok(pem.to_string())
    } else {
        rsa_public(key)?
            .to_public_key_pem(LineEnding::LF)
            .map_err(crypto("SPKI export"))
    }
}

pub(crate) fn rsa_from_pem(pem: &str, alg: Algorithm) -> Result<RsaKey> {
    use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
    use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};

    if let Ok(private) = RsaPrivateKey::from_pkcs8_pem(pem).or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem)) {
        return Ok(rsa_key_from_private(alg, &private));
    }
    let public = RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(crypto("RSA PEM"))?;
    Ok(rsa_key_from_public(alg, &public))
}

// Ed25519

fn array32(bytes: &[u8], what: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| Error::Crypto(format!("Ed25519 {what} must be 32 bytes, got {}", bytes.len())))
}

pub(crate) fn ed25519_signing(key: &OkpKey) -> Result<ed25519_dalek::SigningKey> {
    let d = key.d.as_deref().ok_or_else(|| Error::Crypto("Ed25519 key has no private part".into()))?;
    Ok(ed25519_dalek::SigningKey::from_bytes(&array32(d, "seed")?))
}

pub(crate) fn ed25519_verifying(key: &OkpKey) -> Result<ed25519_dalek::VerifyingKey> {
    ed25519_dalek::VerifyingKey::from_bytes(&array32(&key.x, "public key")?)
        .map_err(crypto("Ed25519 public key"))
}

fn okp_from_signing(signing: &ed25519_dalek::SigningKey) -> OkpKey {
    OkpKey {
        alg: Algorithm::EdDsa,
        crv: OkpCurve::Ed25519,
        x:   signing.verifying_key().to_bytes().to_vec(),
        d:   Some(signing.to_bytes().to_vec()),
    }
}

pub(crate) fn okp_to_pem(key: &OkpKey, private: bool) -> Result<String> {
    use ed25519_dalek::pkcs8::{EncodePrivateKey, EncodePublicKey};

    if private && key.d.is_some() {
        let pem = ed25519_signing(key)?
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(crypto("PKCS#8 export"))?;
        Ok(pem.to_string())
    } else {
        ed25519_verifying(key)?
            .to_public_key_pem(LineEnding::LF)
            .map_err(crypto("SPKI export"))
    }
}

pub(crate) fn okp_from_pem(pem: &str) -> Result<OkpKey> {
    use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey};

    if let Ok(signing) = ed25519_dalek::SigningKey::from_pkcs8_pem(pem) {
        return Ok(okp_from_signing(&signing));
    }
    let verifying = ed25519_dalek::VerifyingKey::from_public_key_pem(pem).map_err(crypto("Ed25519 PEM"))?;
    Ok(OkpKey {
        alg: Algorithm::EdDsa,
        crv: OkpCurve::Ed25519,
        x:   verifying.to_bytes().to_vec(),
        d:   None,
    })
}

/// Generate a fresh private key for `alg`. RSA moduli use `rsa_bits`.
pub fn generate_keypair(alg: Algorithm, rsa_bits: usize) -> Result<Key> {
    let key = match alg {
        Algorithm::Es256 | Algorithm::Es384 | Algorithm::Es512 => {
            let crv = alg
                .ec_curve()
                .ok_or_else(|| Error::UnsupportedAlgorithm(alg.to_string()))?;
            let (x, y, d) = per_curve!(crv, generate())?;
            Key::Ec(EcKey { alg, crv, x, y, d: Some(d) })
        }
        Algorithm::Ps256
        | Algorithm::Ps384
        | Algorithm::Ps512
        | Algorithm::Rs256
        | Algorithm::Rs384
        | Algorithm::Rs512 => {
            let private = RsaPrivateKey::new(&mut OsRng, rsa_bits).map_err(crypto("RSA keygen"))?;
            Key::Rsa(rsa_key_from_private(alg, &private))
        }
        Algorithm::EdDsa => {
            let signing = ed25519_dalek::SigningKey::generate(&mut OsRng);
            Key::Okp(okp_from_signing(&signing))
        }
    };
    tracing::debug!(alg = %alg, "Generated key pair");
    Ok(key)
}
