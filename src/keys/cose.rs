use ciborium::value::Value;

use super::{Algorithm, EcCurve, EcKey, Key, OkpCurve, OkpKey, RsaKey};
use crate::encoding::cbor::{cbor_bytes, cbor_get, cbor_int, cbor_map, decode_first, to_vec};
use crate::error::{Error, Result};

const KTY: i64 = 1;
const ALG: i64 = 3;

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

fn int(v: i64) -> Value {
    Value::Integer(v.into())
}

fn push_bytes(map: &mut Vec<(Value, Value)>, label: i64, bytes: &[u8]) {
    map.push((int(label), Value::Bytes(bytes.to_vec())));
}

fn push_opt(map: &mut Vec<(Value, Value)>, label: i64, bytes: &Option<Vec<u8>>) {
    if let Some(b) = bytes {
        push_bytes(map, label, b);
    }
}

/// Encode `key` as a COSE_Key map. Labels are emitted in canonical CBOR order
/// (1, 3, -1, -2, ...), the same order authenticators use.
pub fn key_to_cose(key: &Key) -> Result<Vec<u8>> {
    key.check()?;
    let mut map = Vec::with_capacity(10);
    match key {
        Key::Ec(k) => {
            map.push((int(KTY), int(KTY_EC2)));
            map.push((int(ALG), int(k.alg.cose_id())));
            map.push((int(-1), int(k.crv.cose_id())));
            push_bytes(&mut map, -2, &k.x);
            push_bytes(&mut map, -3, &k.y);
            push_opt(&mut map, -4, &k.d);
        }
        Key::Okp(k) => {
            map.push((int(KTY), int(KTY_OKP)));
            map.push((int(ALG), int(k.alg.cose_id())));
            map.push((int(-1), int(k.crv.cose_id())));
            push_bytes(&mut map, -2, &k.x);
            push_opt(&mut map, -4, &k.d);
        }
        Key::Rsa(k) => {
            map.push((int(KTY), int(KTY_RSA)));
            map.push((int(ALG), int(k.alg.cose_id())));
            push_bytes(&mut map, -1, &k.n);
            push_bytes(&mut map, -2, &k.e);
            push_opt(&mut map, -3, &k.d);
            push_opt(&mut map, -4, &k.p);
            push_opt(&mut map, -5, &k.q);
            push_opt(&mut map, -6, &k.dp);
            push_opt(&mut map, -7, &k.dq);
            push_opt(&mut map, -8, &k.qi);
        }
    }
    to_vec(&Value::Map(map))
}

/// Decode a complete COSE_Key; trailing bytes are rejected.
pub fn cose_to_key(bytes: &[u8]) -> Result<Key> {
    let (key, used) = decode_cose_key(bytes)?;
    if used != bytes.len() {
        return Err(Error::MalformedBinary(format!(
            "{} trailing bytes after COSE key",
            bytes.len() - used
        )));
    }
    Ok(key)
}

/// Decode the COSE_Key at the start of `bytes`, returning the key and the
/// number of bytes it occupied.
pub fn decode_cose_key(bytes: &[u8]) -> Result<(Key, usize)> {
    let (value, used) = decode_first("credentialPublicKey", bytes)?;
    let map = cbor_map(&value)
        .ok_or_else(|| Error::MalformedBinary("COSE key is not a map".into()))?;

    let kty = require_int(map, KTY, "kty")?;
    let alg_id = require_int(map, ALG, "alg")?;
    let alg = Algorithm::from_cose_id(alg_id)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("COSE alg {alg_id}")))?;

    let key = match kty {
        KTY_EC2 => {
            let crv_id = require_int(map, -1, "crv")?;
            let crv = EcCurve::from_cose_id(crv_id)
                .ok_or_else(|| Error::UnsupportedAlgorithm(format!("COSE EC curve {crv_id}")))?;
            Key::Ec(EcKey {
                alg,
                crv,
                x: require_bytes(map, -2, "x")?,
                y: require_bytes(map, -3, "y")?,
                d: optional_bytes(map, -4, "d")?,
            })
        }
        KTY_OKP => {
            let crv_id = require_int(map, -1, "crv")?;
            let crv = OkpCurve::from_cose_id(crv_id)
                .ok_or_else(|| Error::UnsupportedAlgorithm(format!("COSE OKP curve {crv_id}")))?;
            Key::Okp(OkpKey {
                alg,
                crv,
                x: require_bytes(map, -2, "x")?,
                d: optional_bytes(map, -4, "d")?,
            })
        }
        KTY_RSA => Key::Rsa(RsaKey {
            alg,
            n:  require_bytes(map, -1, "n")?,
            e:  require_bytes(map, -2, "e")?,
            d:  optional_bytes(map, -3, "d")?,
            p:  optional_bytes(map, -4, "p")?,
            q:  optional_bytes(map, -5, "q")?,
            dp: optional_bytes(map, -6, "dP")?,
            dq: optional_bytes(map, -7, "dQ")?,
            qi: optional_bytes(map, -8, "qInv")?,
        }),
        other => return Err(Error::UnsupportedAlgorithm(format!("COSE kty {other}"))),
    };
    key.check()?;
    tracing::trace!(kty = key.kty(), alg = %key.alg(), consumed = used, "Decoded COSE key");
    Ok((key, used))
}

fn require_int(map: &[(Value, Value)], label: i64, name: &str) -> Result<i64> {
    let v = cbor_get(map, label)
        .ok_or_else(|| Error::MalformedBinary(format!("COSE key missing {name} ({label})")))?;
    cbor_int(v).ok_or_else(|| Error::MalformedBinary(format!("COSE {name} is not an integer")))
}

fn optional_bytes(map: &[(Value, Value)], label: i64, name: &str) -> Result<Option<Vec<u8>>> {
    match cbor_get(map, label) {
        None => Ok(None),
        Some(v) => cbor_bytes(v)
            .map(|b| Some(b.to_vec()))
            .ok_or_else(|| Error::MalformedBinary(format!("COSE {name} is not a byte string"))),
    }
}

fn require_bytes(map: &[(Value, Value)], label: i64, name: &str) -> Result<Vec<u8>> {
    optional_bytes(map, label, name)?
        .ok_or_else(|| Error::MalformedBinary(format!("COSE key missing {name} ({label})")))
}
