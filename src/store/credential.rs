use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::CREDENTIAL_ID_LEN;
use crate::error::{Error, Result};
use crate::keys::{Algorithm, Key, generate_keypair};

/// Name under which a credential record is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyHandle(String);

impl KeyHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    #[serde(with = "hex::serde")]
    pub credential_id: Vec<u8>,     // 32 bytes random
    pub public_key:    Key,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key:   Option<Key>,
}

impl CredentialRecord {
    /// Fresh key pair for `alg` plus a random credential id.
    pub fn generate(alg: Algorithm, rsa_bits: usize) -> Result<Self> {
        let private = generate_keypair(alg, rsa_bits)?;
        let mut credential_id = vec![0u8; CREDENTIAL_ID_LEN];
        rand::thread_rng().fill_bytes(&mut credential_id);
        Ok(Self {
            credential_id,
            public_key: private.to_public(),
            private_key: Some(private),
        })
    }

    /// [`CredentialRecord::generate`] on the blocking pool; RSA key
    /// generation takes long enough to stall a runtime worker.
    pub async fn generate_async(alg: Algorithm, rsa_bits: usize) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::generate(alg, rsa_bits))
            .await
            .map_err(|e| Error::Crypto(format!("keygen task: {e}")))?
    }

    pub fn algorithm(&self) -> Algorithm {
        self.public_key.alg()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_record() {
        let record = CredentialRecord::generate(Algorithm::Es256, 2048).unwrap();
        assert_eq!(record.credential_id.len(), 32);
        assert_eq!(record.algorithm(), Algorithm::Es256);
        assert!(!record.public_key.is_private());
        assert_eq!(record.private_key.as_ref().map(Key::to_public), Some(record.public_key.clone()));
    }

    #[test]
    fn test_record_json_shape() {
        let record = CredentialRecord::generate(Algorithm::EdDsa, 0).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["credentialId"].as_str().map(str::len), Some(64));
        assert_eq!(json["publicKey"]["kty"], "OKP");
        assert!(json["privateKey"]["d"].is_string());
    }

    #[test]
    fn test_handle_serializes_as_string() {
        let handle = KeyHandle::new("profile1 | ES256");
        assert_eq!(serde_json::to_string(&handle).unwrap(), "\"profile1 | ES256\"");
        assert_eq!(handle.to_string(), "profile1 | ES256");
    }

    #[tokio::test]
    async fn test_generate_async() {
        let record = CredentialRecord::generate_async(Algorithm::Es384, 2048).await.unwrap();
        assert_eq!(record.algorithm(), Algorithm::Es384);
    }
}
