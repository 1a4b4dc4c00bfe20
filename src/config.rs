use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::Algorithm;
use crate::signing::{EcSignatureFormat, SignatureEngine};

/// Google Password Manager.
pub const DEFAULT_AAGUID: [u8; 16] = [
    0xea, 0x9b, 0x8d, 0x66, 0x4d, 0x01, 0x1d, 0x21, 0x3c, 0xe4, 0xb6, 0xb4, 0x8c, 0xb5, 0x75, 0xd4,
];
pub const CREDENTIAL_ID_LEN: usize = 32;
pub const PROFILE_MODES: [&str; 2] = ["profile1", "profile2"];
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::Es256;
pub const RSA_MODULUS_BITS: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    #[serde(with = "hex::serde")]
    pub aaguid:              [u8; 16],
    pub rsa_modulus_bits:    usize,
    /// Modes whose keys are shared across relying parties.
    pub profile_modes:       Vec<String>,
    pub ec_signature_format: EcSignatureFormat,
    /// Where a disk-backed key store keeps its files.
    pub key_dir:             Option<PathBuf>,
    /// Log verbosity for [`crate::logging::init`]; 0 is warnings only.
    pub verbose:             u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aaguid:              DEFAULT_AAGUID,
            rsa_modulus_bits:    RSA_MODULUS_BITS,
            profile_modes:       PROFILE_MODES.iter().map(|m| m.to_string()).collect(),
            ec_signature_format: EcSignatureFormat::default(),
            key_dir:             None,
            verbose:             0,
        }
    }
}

impl Config {
    /// Parse a JSON config; absent members take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_profile_mode(&self, mode: &str) -> bool {
        self.profile_modes.iter().any(|m| m == mode)
    }

    pub fn signature_engine(&self) -> SignatureEngine {
        SignatureEngine::new(self.ec_signature_format)
    }
}
