use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::{self, Codec, Reader};
use crate::error::{Error, Result};
use crate::keys::{Key, decode_cose_key, key_to_cose};

const FLAG_UP:   u8 = 0b0000_0001;
const FLAG_RFU1: u8 = 0b0000_0010;
const FLAG_UV:   u8 = 0b0000_0100;
const FLAG_BE:   u8 = 0b0000_1000;
const FLAG_BS:   u8 = 0b0001_0000;
const FLAG_RFU2: u8 = 0b0010_0000;
const FLAG_AT:   u8 = 0b0100_0000;
const FLAG_ED:   u8 = 0b1000_0000;

/// The authenticator data flags byte, one named bit per field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorFlags {
    pub up:   bool,
    pub rfu1: bool,
    pub uv:   bool,
    pub be:   bool,
    pub bs:   bool,
    pub rfu2: bool,
    pub at:   bool,
    pub ed:   bool,
}

impl AuthenticatorFlags {
    pub fn to_byte(self) -> u8 {
        [
            (self.up, FLAG_UP),
            (self.rfu1, FLAG_RFU1),
            (self.uv, FLAG_UV),
            (self.be, FLAG_BE),
            (self.bs, FLAG_BS),
            (self.rfu2, FLAG_RFU2),
            (self.at, FLAG_AT),
            (self.ed, FLAG_ED),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }

    pub fn from_byte(b: u8) -> Self {
        Self {
            up:   b & FLAG_UP != 0,
            rfu1: b & FLAG_RFU1 != 0,
            uv:   b & FLAG_UV != 0,
            be:   b & FLAG_BE != 0,
            bs:   b & FLAG_BS != 0,
            rfu2: b & FLAG_RFU2 != 0,
            at:   b & FLAG_AT != 0,
            ed:   b & FLAG_ED != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestedCredentialData {
    #[serde(with = "hex::serde")]
    pub aaguid:                [u8; 16],
    pub credential_id_length:  u16,
    #[serde(with = "hex::serde")]
    pub credential_id:         Vec<u8>,
    pub credential_public_key: Key,
}

impl AttestedCredentialData {
    /// Attested data with `credential_id_length` taken from the id.
    pub fn new(aaguid: [u8; 16], credential_id: Vec<u8>, credential_public_key: Key) -> Result<Self> {
        let credential_id_length = u16::try_from(credential_id.len()).map_err(|_| {
            Error::MalformedBinary(format!("credential id of {} bytes", credential_id.len()))
        })?;
        Ok(Self {
            aaguid,
            credential_id_length,
            credential_id,
            credential_public_key,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorData {
    #[serde(with = "hex::serde")]
    pub rp_id_hash:               [u8; 32],
    pub flags:                    AuthenticatorFlags,
    pub sign_count:               u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attested_credential_data: Option<AttestedCredentialData>,
    #[serde(default, with = "hex::serde")]
    pub extensions:               Vec<u8>,
}

/// SHA-256 of a relying party identifier.
pub fn rp_id_hash(rp_id: &str) -> [u8; 32] {
    Sha256::digest(rp_id.as_bytes()).into()
}

/// Serialize authenticator data. The rpIdHash is written as given.
pub fn encode_authenticator_data(data: &AuthenticatorData) -> Result<Vec<u8>> {
    if data.flags.at != data.attested_credential_data.is_some() {
        return Err(Error::MalformedBinary(format!(
            "at flag is {} but attested credential data is {}",
            data.flags.at,
            if data.attested_credential_data.is_some() { "present" } else { "absent" }
        )));
    }

    let mut out = Vec::with_capacity(37);
    out.extend_from_slice(&data.rp_id_hash);
    out.push(data.flags.to_byte());
    out.extend_from_slice(&data.sign_count.to_be_bytes());

    if let Some(acd) = &data.attested_credential_data {
        if acd.credential_id_length as usize != acd.credential_id.len() {
            return Err(Error::MalformedBinary(format!(
                "credentialIdLength {} does not match credential id of {} bytes",
                acd.credential_id_length,
                acd.credential_id.len()
            )));
        }
        out.extend_from_slice(&acd.aaguid);
        out.extend_from_slice(&acd.credential_id_length.to_be_bytes());
        out.extend_from_slice(&acd.credential_id);
        out.extend_from_slice(&key_to_cose(&acd.credential_public_key)?);
    }

    out.extend_from_slice(&data.extensions);
    Ok(out)
}

/// Parse authenticator data, returning the structure and the bytes consumed.
/// Everything after the attested credential data is taken as extensions.
pub fn decode_authenticator_data(bytes: &[u8]) -> Result<(AuthenticatorData, usize)> {
    let mut r = Reader::new(bytes);
    let rp_id_hash = r.take_array::<32>("rpIdHash")?;
    let flags = AuthenticatorFlags::from_byte(r.read_u8("flags")?);
    let sign_count = r.read_u32("signCount")?;

    let attested_credential_data = if flags.at {
        let aaguid = r.take_array::<16>("aaguid")?;
        let credential_id_length = r.read_u16("credentialIdLength")?;
        let credential_id = r.take("credentialId", credential_id_length as usize)?.to_vec();
        let (credential_public_key, used) = decode_cose_key(r.remaining())?;
        r.take("credentialPublicKey", used)?;
        Some(AttestedCredentialData {
            aaguid,
            credential_id_length,
            credential_id,
            credential_public_key,
        })
    } else {
        None
    };

    let extensions = r.rest().to_vec();
    let data = AuthenticatorData {
        rp_id_hash,
        flags,
        sign_count,
        attested_credential_data,
        extensions,
    };
    tracing::debug!(
        flags = format_args!("{:#04x}", flags.to_byte()),
        sign_count,
        attested = data.attested_credential_data.is_some(),
        extensions = data.extensions.len(),
        "Decoded authenticator data"
    );
    Ok((data, r.position()))
}

pub fn encode_authenticator_data_text(data: &AuthenticatorData, codec: Codec) -> Result<String> {
    Ok(encoding::encode(&encode_authenticator_data(data)?, codec))
}

pub fn decode_authenticator_data_text(text: &str, codec: Codec) -> Result<AuthenticatorData> {
    let (data, _) = decode_authenticator_data(&encoding::decode(text, codec)?)?;
    Ok(data)
}
