use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use super::authenticator_data::{AuthenticatorData, decode_authenticator_data, encode_authenticator_data};
use crate::encoding::cbor::{cbor_array, cbor_bytes, cbor_get_str, cbor_int, cbor_map, cbor_text, decode_first, to_vec};
use crate::encoding::{self, Codec};
use crate::error::{Error, Result};

pub const FMT_NONE:   &str = "none";
pub const FMT_PACKED: &str = "packed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedStatement {
    /// COSE algorithm identifier of `sig`.
    pub alg: i64,
    pub sig: Vec<u8>,
    pub x5c: Option<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatement {
    None,
    Packed(PackedStatement),
}

impl AttestationStatement {
    pub fn fmt(&self) -> &'static str {
        match self {
            AttestationStatement::None => FMT_NONE,
            AttestationStatement::Packed(_) => FMT_PACKED,
        }
    }
}

/// `{fmt, attStmt, authData}`. In JSON form the statement is split into
/// `fmt` and `attStmt` with byte fields as hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AttestationObjectRepr", into = "AttestationObjectRepr")]
pub struct AttestationObject {
    pub statement: AttestationStatement,
    pub auth_data: AuthenticatorData,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestationObjectRepr {
    fmt:       String,
    #[serde(default)]
    att_stmt:  StatementRepr,
    auth_data: AuthenticatorData,
}

#[derive(Default, Serialize, Deserialize)]
struct StatementRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x5c: Option<Vec<String>>,
}

impl TryFrom<AttestationObjectRepr> for AttestationObject {
    type Error = Error;

    fn try_from(repr: AttestationObjectRepr) -> Result<Self> {
        let statement = match repr.fmt.as_str() {
            FMT_NONE => AttestationStatement::None,
            FMT_PACKED => {
                let stmt = repr.att_stmt;
                AttestationStatement::Packed(PackedStatement {
                    alg: stmt
                        .alg
                        .ok_or_else(|| Error::MalformedBinary("packed attStmt missing alg".into()))?,
                    sig: encoding::hex_to_bytes(stmt.sig.as_deref().unwrap_or_default())?,
                    x5c: stmt
                        .x5c
                        .map(|certs| {
                            certs
                                .iter()
                                .map(|c| encoding::hex_to_bytes(c))
                                .collect::<Result<Vec<_>>>()
                        })
                        .transpose()?,
                })
            }
            other => return Err(Error::UnsupportedFormat(other.to_string())),
        };
        Ok(Self {
            statement,
            auth_data: repr.auth_data,
        })
    }
}

impl From<AttestationObject> for AttestationObjectRepr {
    fn from(obj: AttestationObject) -> Self {
        let att_stmt = match &obj.statement {
            AttestationStatement::None => StatementRepr::default(),
            AttestationStatement::Packed(p) => StatementRepr {
                alg: Some(p.alg),
                sig: Some(encoding::bytes_to_hex(&p.sig)),
                x5c: p
                    .x5c
                    .as_ref()
                    .map(|certs| certs.iter().map(|c| encoding::bytes_to_hex(c)).collect()),
            },
        };
        Self {
            fmt: obj.statement.fmt().to_string(),
            att_stmt,
            auth_data: obj.auth_data,
        }
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn encode_attestation_object(obj: &AttestationObject) -> Result<Vec<u8>> {
    let att_stmt = match &obj.statement {
        AttestationStatement::None => Vec::new(),
        AttestationStatement::Packed(p) => {
            let mut stmt = vec![
                (text("alg"), Value::Integer(p.alg.into())),
                (text("sig"), Value::Bytes(p.sig.clone())),
            ];
            if let Some(certs) = &p.x5c {
                let certs = certs.iter().map(|c| Value::Bytes(c.clone())).collect();
                stmt.push((text("x5c"), Value::Array(certs)));
            }
            stmt
        }
    };
    let map = Value::Map(vec![
        (text("fmt"), text(obj.statement.fmt())),
        (text("attStmt"), Value::Map(att_stmt)),
        (text("authData"), Value::Bytes(encode_authenticator_data(&obj.auth_data)?)),
    ]);
    to_vec(&map)
}

pub fn decode_attestation_object(bytes: &[u8]) -> Result<AttestationObject> {
    let (value, used) = decode_first("attestationObject", bytes)?;
    if used != bytes.len() {
        return Err(Error::MalformedBinary(format!(
            "{} trailing bytes after attestation object",
            bytes.len() - used
        )));
    }
    let map = cbor_map(&value)
        .ok_or_else(|| Error::MalformedBinary("attestation object is not a map".into()))?;

    let fmt = cbor_get_str(map, "fmt")
        .and_then(cbor_text)
        .ok_or_else(|| Error::MalformedBinary("attestation object missing fmt".into()))?;
    let att_stmt = cbor_get_str(map, "attStmt")
        .and_then(cbor_map)
        .ok_or_else(|| Error::MalformedBinary("attestation object missing attStmt".into()))?;
    let auth_data = cbor_get_str(map, "authData")
        .and_then(cbor_bytes)
        .ok_or_else(|| Error::MalformedBinary("attestation object missing authData".into()))?;

    let statement = match fmt {
        FMT_NONE => {
            if !att_stmt.is_empty() {
                return Err(Error::MalformedBinary("none attStmt must be empty".into()));
            }
            AttestationStatement::None
        }
        FMT_PACKED => AttestationStatement::Packed(decode_packed(att_stmt)?),
        other => return Err(Error::UnsupportedFormat(other.to_string())),
    };

    let (auth_data, _) = decode_authenticator_data(auth_data)?;
    tracing::debug!(fmt, "Decoded attestation object");
    Ok(AttestationObject { statement, auth_data })
}

fn decode_packed(stmt: &[(Value, Value)]) -> Result<PackedStatement> {
    let alg = cbor_get_str(stmt, "alg")
        .and_then(cbor_int)
        .ok_or_else(|| Error::MalformedBinary("packed attStmt missing alg".into()))?;
    let sig = cbor_get_str(stmt, "sig")
        .and_then(cbor_bytes)
        .ok_or_else(|| Error::MalformedBinary("packed attStmt missing sig".into()))?
        .to_vec();
    let x5c = match cbor_get_str(stmt, "x5c") {
        None => None,
        Some(v) => {
            let certs = cbor_array(v)
                .ok_or_else(|| Error::MalformedBinary("x5c is not an array".into()))?;
            let certs = certs
                .iter()
                .map(|c| {
                    cbor_bytes(c)
                        .map(<[u8]>::to_vec)
                        .ok_or_else(|| Error::MalformedBinary("x5c entry is not a byte string".into()))
                })
                .collect::<Result<Vec<_>>>()?;
            Some(certs)
        }
    };
    Ok(PackedStatement { alg, sig, x5c })
}

pub fn encode_attestation_object_text(obj: &AttestationObject, codec: Codec) -> Result<String> {
    Ok(encoding::encode(&encode_attestation_object(obj)?, codec))
}

pub fn decode_attestation_object_text(text: &str, codec: Codec) -> Result<AttestationObject> {
    decode_attestation_object(&encoding::decode(text, codec)?)
}

/// Just the inner authenticator data bytes, in `codec`.
pub fn encode_auth_data_only(obj: &AttestationObject, codec: Codec) -> Result<String> {
    Ok(encoding::encode(&encode_authenticator_data(&obj.auth_data)?, codec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::authenticator_data::AuthenticatorFlags;

    fn auth_data() -> AuthenticatorData {
        AuthenticatorData {
            rp_id_hash:               [0; 32],
            flags:                    AuthenticatorFlags { up: true, ..Default::default() },
            sign_count:               1,
            attested_credential_data: None,
            extensions:               vec![],
        }
    }

    fn packed() -> AttestationObject {
        AttestationObject {
            statement: AttestationStatement::Packed(PackedStatement {
                alg: -7,
                sig: vec![0x30, 0x44, 0x02],
                x5c: Some(vec![vec![0x30, 0x82], vec![0x30, 0x81]]),
            }),
            auth_data: auth_data(),
        }
    }

    #[test]
    fn test_packed_roundtrip() {
        let bytes = encode_attestation_object(&packed()).unwrap();
        assert_eq!(decode_attestation_object(&bytes).unwrap(), packed());
    }

    #[test]
    fn test_packed_sig_is_byte_string() {
        let bytes = encode_attestation_object(&packed()).unwrap();
        let (value, _) = decode_first("test", &bytes).unwrap();
        let map = cbor_map(&value).unwrap();
        let stmt = cbor_get_str(map, "attStmt").and_then(cbor_map).unwrap();
        assert!(matches!(cbor_get_str(stmt, "sig"), Some(Value::Bytes(_))));
        assert_eq!(cbor_get_str(stmt, "alg").and_then(cbor_int), Some(-7));
    }

    #[test]
    fn test_key_order() {
        let obj = AttestationObject { statement: AttestationStatement::None, auth_data: auth_data() };
        let bytes = encode_attestation_object(&obj).unwrap();
        // map(3), "fmt", "none", "attStmt", {}, ...
        assert_eq!(&bytes[..5], &[0xA3, 0x63, b'f', b'm', b't']);
        assert_eq!(&bytes[5..10], &[0x64, b'n', b'o', b'n', b'e']);
        assert_eq!(&bytes[10..18], &[0x67, b'a', b't', b't', b'S', b't', b'm', b't']);
        assert_eq!(bytes[18], 0xA0);
    }

    #[test]
    fn test_unknown_fmt_rejected() {
        let map = Value::Map(vec![
            (text("fmt"), text("tpm")),
            (text("attStmt"), Value::Map(vec![])),
            (text("authData"), Value::Bytes(vec![0; 37])),
        ]);
        let bytes = to_vec(&map).unwrap();
        match decode_attestation_object(&bytes) {
            Err(Error::UnsupportedFormat(fmt)) => assert_eq!(fmt, "tpm"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_json_form() {
        let json = serde_json::to_value(packed()).unwrap();
        assert_eq!(json["fmt"], "packed");
        assert_eq!(json["attStmt"]["alg"], -7);
        assert_eq!(json["attStmt"]["sig"], "304402");
        assert_eq!(json["attStmt"]["x5c"][1], "3081");
        let back: AttestationObject = serde_json::from_value(json).unwrap();
        assert_eq!(back, packed());
    }

    #[test]
    fn test_json_unknown_fmt_rejected() {
        let json = serde_json::json!({
            "fmt": "android-key",
            "attStmt": {},
            "authData": serde_json::to_value(auth_data()).unwrap(),
        });
        assert!(serde_json::from_value::<AttestationObject>(json).is_err());
    }

    #[test]
    fn test_auth_data_only() {
        let obj = packed();
        let hex = encode_auth_data_only(&obj, Codec::Hex).unwrap();
        assert_eq!(hex.len(), 74);
        assert!(hex.ends_with("0100000001"));
    }
}
