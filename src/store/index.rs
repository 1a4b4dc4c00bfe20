use std::collections::{BTreeMap, HashMap};

use super::{CredentialRecord, KeyHandle, KeyStore, StoreError};

/// In-memory store indexed by handle and by credential id.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    by_handle:        BTreeMap<KeyHandle, CredentialRecord>,
    by_credential_id: HashMap<Vec<u8>, KeyHandle>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    pub(crate) fn insert(&mut self, handle: KeyHandle, record: CredentialRecord) -> Option<CredentialRecord> {
        self.by_credential_id
            .insert(record.credential_id.clone(), handle.clone());
        let previous = self.by_handle.insert(handle.clone(), record);
        if let Some(prev) = &previous {
            self.unindex(&handle, &prev.credential_id);
        }
        previous
    }

    pub(crate) fn take(&mut self, handle: &KeyHandle) -> Option<CredentialRecord> {
        let record = self.by_handle.remove(handle)?;
        self.unindex(handle, &record.credential_id);
        Some(record)
    }

    // Imported records may share a credential id; only drop the index entry
    // if it still points at `handle`, and the new record did not reuse it.
    fn unindex(&mut self, handle: &KeyHandle, credential_id: &[u8]) {
        let still_used = self
            .by_handle
            .get(handle)
            .is_some_and(|r| r.credential_id == credential_id);
        if !still_used && self.by_credential_id.get(credential_id) == Some(handle) {
            self.by_credential_id.remove(credential_id);
        }
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, handle: &KeyHandle) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.by_handle.get(handle).cloned())
    }

    fn put(
        &mut self,
        handle: KeyHandle,
        record: CredentialRecord,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.insert(handle, record))
    }

    fn remove(&mut self, handle: &KeyHandle) -> Result<bool, StoreError> {
        Ok(self.take(handle).is_some())
    }

    fn entries(&self) -> Result<Vec<(KeyHandle, CredentialRecord)>, StoreError> {
        Ok(self
            .by_handle
            .iter()
            .map(|(h, r)| (h.clone(), r.clone()))
            .collect())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.by_handle.clear();
        self.by_credential_id.clear();
        Ok(())
    }

    fn find_by_credential_id(&self, credential_id: &[u8]) -> Result<Option<KeyHandle>, StoreError> {
        Ok(self.by_credential_id.get(credential_id).cloned())
    }
}
