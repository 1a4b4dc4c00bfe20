use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::{handle_for, profile_handle};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::keys::{Algorithm, Key};
use crate::store::{CredentialRecord, DiskKeyStore, KeyHandle, KeyStore, MemoryKeyStore, StoreError};

/// Counts reported by [`CredentialManager::import_keys`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported:    usize,
    pub new:         usize,
    pub overwritten: usize,
}

/// Owns a key store and serialises check-then-create per handle, so two
/// callers racing on the same handle end up with the same record.
pub struct CredentialManager<S: KeyStore> {
    store:  Mutex<S>,
    locks:  Mutex<HashMap<KeyHandle, Arc<tokio::sync::Mutex<()>>>>,
    config: Config,
}

impl CredentialManager<MemoryKeyStore> {
    pub fn in_memory(config: Config) -> Self {
        Self::new(MemoryKeyStore::new(), config)
    }
}

impl CredentialManager<DiskKeyStore> {
    /// Disk-backed manager rooted at `config.key_dir`.
    pub fn open(config: Config) -> Result<Self> {
        let dir = config
            .key_dir
            .clone()
            .ok_or_else(|| StoreError::NotFound("key_dir is not configured".into()))?;
        Ok(Self::new(DiskKeyStore::open(dir)?, config))
    }
}

impl<S: KeyStore> CredentialManager<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self {
            store: Mutex::new(store),
            locks: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle for a request under this manager's profile modes.
    pub fn resolve_handle(&self, rp_id: &str, user_name: &str, mode: &str, alg: Algorithm) -> KeyHandle {
        handle_for(self.config.is_profile_mode(mode), rp_id, user_name, mode, alg)
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut S) -> Result<T, StoreError>) -> Result<T> {
        let mut store = self.store.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut *store)?)
    }

    fn handle_lock(&self, handle: &KeyHandle) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(locks.entry(handle.clone()).or_default().clone())
    }

    /// Drop the map entry for `handle` once no caller holds its lock.
    fn release_handle_lock(&self, handle: &KeyHandle, lock: Arc<tokio::sync::Mutex<()>>) -> Result<()> {
        drop(lock);
        let mut locks = self.locks.lock().map_err(|_| StoreError::Poisoned)?;
        if locks.get(handle).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(handle);
        }
        Ok(())
    }

    async fn remove_locked(&self, handle: &KeyHandle) -> Result<bool> {
        let lock = self.handle_lock(handle)?;
        let removed = {
            let _guard = lock.lock().await;
            self.with_store(|s| s.remove(handle))?
        };
        self.release_handle_lock(handle, lock)?;
        Ok(removed)
    }

    /// The record stored under `handle`, generating and storing a fresh
    /// key pair for `alg` if there is none.
    pub async fn get_or_create_key(&self, handle: &KeyHandle, alg: Algorithm) -> Result<CredentialRecord> {
        let lock = self.handle_lock(handle)?;
        let _guard = lock.lock().await;

        if let Some(record) = self.with_store(|s| s.get(handle))? {
            tracing::debug!(handle = %handle, "Reusing stored key");
            return Ok(record);
        }
        let record = CredentialRecord::generate_async(alg, self.config.rsa_modulus_bits).await?;
        self.with_store(|s| s.put(handle.clone(), record.clone()))?;
        tracing::info!(
            handle = %handle,
            alg = %alg,
            credential_id = %hex::encode(&record.credential_id),
            "Created credential"
        );
        Ok(record)
    }

    /// Store `record` under `handle`, replacing any existing record.
    pub async fn store_key(&self, handle: &KeyHandle, record: CredentialRecord) -> Result<Option<CredentialRecord>> {
        check_record(&record)?;
        let lock = self.handle_lock(handle)?;
        let _guard = lock.lock().await;
        self.with_store(|s| s.put(handle.clone(), record))
    }

    pub async fn delete_key(&self, handle: &KeyHandle) -> Result<bool> {
        let removed = self.remove_locked(handle).await?;
        if removed {
            tracing::info!(handle = %handle, "Deleted credential");
        }
        Ok(removed)
    }

    pub fn get_key(&self, handle: &KeyHandle) -> Result<Option<CredentialRecord>> {
        self.with_store(|s| s.get(handle))
    }

    pub fn list_keys(&self) -> Result<Vec<(KeyHandle, CredentialRecord)>> {
        self.with_store(|s| s.entries())
    }

    pub fn find_handle_by_credential_id(&self, credential_id: &[u8]) -> Result<Option<KeyHandle>> {
        self.with_store(|s| s.find_by_credential_id(credential_id))
    }

    /// First handle whose public key equals `public_key` (private parts ignored).
    pub fn find_handle_by_public_key(&self, public_key: &Key) -> Result<Option<KeyHandle>> {
        let wanted = public_key.to_public();
        Ok(self
            .list_keys()?
            .into_iter()
            .find(|(_, record)| record.public_key.to_public() == wanted)
            .map(|(handle, _)| handle))
    }

    /// Make sure every profile mode in `modes` has a key for every algorithm.
    /// Returns how many keys were created.
    pub async fn generate_mode_keys(&self, modes: &[&str]) -> Result<usize> {
        let mut created = 0;
        for mode in modes {
            for alg in Algorithm::ALL {
                let handle = profile_handle(mode, alg);
                if self.get_key(&handle)?.is_none() {
                    self.get_or_create_key(&handle, alg).await?;
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    /// Remove every record, each under its handle lock. Returns how many
    /// were removed.
    pub async fn clear_keys(&self) -> Result<usize> {
        let mut removed = 0;
        for (handle, _) in self.list_keys()? {
            if self.remove_locked(&handle).await? {
                removed += 1;
            }
        }
        tracing::info!(removed, "Cleared all credentials");
        Ok(removed)
    }

    /// Every record as a pretty-printed JSON object keyed by handle.
    pub fn export_keys(&self) -> Result<String> {
        let keys: BTreeMap<KeyHandle, CredentialRecord> = self.list_keys()?.into_iter().collect();
        Ok(serde_json::to_string_pretty(&keys)?)
    }

    /// Store every record of an [`export_keys`](Self::export_keys) document,
    /// replacing records under the same handle. Each write holds that
    /// handle's lock, like [`store_key`](Self::store_key).
    pub async fn import_keys(&self, json: &str) -> Result<ImportSummary> {
        let keys: BTreeMap<KeyHandle, CredentialRecord> = serde_json::from_str(json)?;
        for record in keys.values() {
            check_record(record)?;
        }
        let imported = keys.len();
        let mut overwritten = 0;
        for (handle, record) in keys {
            let lock = self.handle_lock(&handle)?;
            let _guard = lock.lock().await;
            if self.with_store(|s| s.put(handle.clone(), record))?.is_some() {
                overwritten += 1;
            }
        }
        let summary = ImportSummary {
            imported,
            new: imported - overwritten,
            overwritten,
        };
        tracing::info!(imported, overwritten, "Imported credentials");
        Ok(summary)
    }

    /// Sign `payload` with the private key stored under `handle`.
    pub fn sign_with_key(&self, handle: &KeyHandle, payload: &[u8]) -> Result<Vec<u8>> {
        let record = self
            .get_key(handle)?
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))?;
        let key = record
            .private_key
            .as_ref()
            .ok_or_else(|| Error::Crypto(format!("{handle} has no private key")))?;
        self.config.signature_engine().sign(key, payload)
    }
}

fn check_record(record: &CredentialRecord) -> Result<()> {
    record.public_key.check()?;
    if let Some(private) = &record.private_key {
        private.check()?;
        if private.to_public() != record.public_key.to_public() {
            return Err(Error::MalformedBinary("private key does not match public key".into()));
        }
    }
    Ok(())
}
