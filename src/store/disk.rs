use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::index::MemoryKeyStore;
use super::{CredentialRecord, KeyHandle, KeyStore, StoreError};

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    handle: KeyHandle,
    record: CredentialRecord,
}

/// Handles are free text, so files are named by their SHA-256.
fn entry_path(dir: &Path, handle: &KeyHandle) -> PathBuf {
    let digest = Sha256::digest(handle.as_str().as_bytes());
    dir.join(format!("{}.bin", hex::encode(digest)))
}

/// CBOR-encode and write the record to `dir/{sha256(handle)}.bin`.
pub(crate) fn write_entry(
    dir: &Path,
    handle: &KeyHandle,
    record: &CredentialRecord,
) -> Result<(), StoreError> {
    let entry = StoredEntry {
        handle: handle.clone(),
        record: record.clone(),
    };
    let mut buf = Vec::new();
    ciborium::into_writer(&entry, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    std::fs::write(entry_path(dir, handle), buf)?;
    Ok(())
}

pub(crate) fn read_entry(path: &Path) -> Result<(KeyHandle, CredentialRecord), StoreError> {
    let bytes = std::fs::read(path)?;
    let entry: StoredEntry = ciborium::from_reader(bytes.as_slice())
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    if entry_path(path.parent().unwrap_or(Path::new("")), &entry.handle) != path {
        return Err(StoreError::Corrupt(format!(
            "file name does not match handle {}",
            entry.handle
        )));
    }
    Ok((entry.handle, entry.record))
}

pub(crate) fn delete_entry(dir: &Path, handle: &KeyHandle) -> Result<(), StoreError> {
    match std::fs::remove_file(entry_path(dir, handle)) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => Ok(other?),
    }
}

/// Load all valid entries from `dir`. Logs and skips corrupt files.
pub(crate) fn load_all(dir: &Path) -> Result<Vec<(KeyHandle, CredentialRecord)>, StoreError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bin") {
            continue;
        }
        match read_entry(&path) {
            Ok(e) => entries.push(e),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt key file");
            }
        }
    }
    Ok(entries)
}

/// Write-through store: one CBOR file per handle, mirrored in memory.
pub struct DiskKeyStore {
    dir:   PathBuf,
    index: MemoryKeyStore,
}

impl DiskKeyStore {
    /// Open (creating if needed) the store at `dir` and load every entry.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let mut index = MemoryKeyStore::new();
        for (handle, record) in load_all(&dir)? {
            index.insert(handle, record);
        }
        tracing::info!(dir = %dir.display(), keys = index.len(), "Opened key store");
        Ok(Self { dir, index })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl KeyStore for DiskKeyStore {
    fn get(&self, handle: &KeyHandle) -> Result<Option<CredentialRecord>, StoreError> {
        self.index.get(handle)
    }

    fn put(
        &mut self,
        handle: KeyHandle,
        record: CredentialRecord,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        write_entry(&self.dir, &handle, &record)?;
        Ok(self.index.insert(handle, record))
    }

    fn remove(&mut self, handle: &KeyHandle) -> Result<bool, StoreError> {
        if self.index.take(handle).is_some() {
            delete_entry(&self.dir, handle)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn entries(&self) -> Result<Vec<(KeyHandle, CredentialRecord)>, StoreError> {
        self.index.entries()
    }

    fn find_by_credential_id(&self, credential_id: &[u8]) -> Result<Option<KeyHandle>, StoreError> {
        self.index.find_by_credential_id(credential_id)
    }
}
