pub mod credential;
pub mod disk;
pub mod index;

pub use credential::{CredentialRecord, KeyHandle};
pub use disk::DiskKeyStore;
pub use index::MemoryKeyStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("Corrupt: {0}")]
    Corrupt(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Lock poisoned")]
    Poisoned,
}

/// Keyed storage for credential records. Records are returned by value;
/// implementations decide where they live.
pub trait KeyStore: Send {
    fn get(&self, handle: &KeyHandle) -> Result<Option<CredentialRecord>, StoreError>;

    /// Store `record` under `handle`, returning the record it replaced.
    fn put(
        &mut self,
        handle: KeyHandle,
        record: CredentialRecord,
    ) -> Result<Option<CredentialRecord>, StoreError>;

    /// Returns whether a record was removed.
    fn remove(&mut self, handle: &KeyHandle) -> Result<bool, StoreError>;

    /// All records, ordered by handle.
    fn entries(&self) -> Result<Vec<(KeyHandle, CredentialRecord)>, StoreError>;

    fn clear(&mut self) -> Result<(), StoreError> {
        for (handle, _) in self.entries()? {
            self.remove(&handle)?;
        }
        Ok(())
    }

    fn find_by_credential_id(&self, credential_id: &[u8]) -> Result<Option<KeyHandle>, StoreError> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|(_, record)| record.credential_id == credential_id)
            .map(|(handle, _)| handle))
    }
}
