use passkey_forge::config::Config;
use passkey_forge::keys::Algorithm;
use passkey_forge::policy::CredentialManager;
use passkey_forge::store::{CredentialRecord, DiskKeyStore, KeyHandle, KeyStore};

fn bin_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "bin"))
        .count()
}

#[test]
fn test_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let handle = KeyHandle::new("example.com | alice | ES256");
    let record = CredentialRecord::generate(Algorithm::Es256, 0).unwrap();

    {
        let mut store = DiskKeyStore::open(dir.path()).unwrap();
        assert!(store.put(handle.clone(), record.clone()).unwrap().is_none());
    }

    // Reload from disk
    let store = DiskKeyStore::open(dir.path()).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&handle).unwrap(), Some(record.clone()));
    assert_eq!(store.find_by_credential_id(&record.credential_id).unwrap(), Some(handle));
}

#[test]
fn test_store_replace_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let handle = KeyHandle::new("profile1 | EdDSA");
    let first = CredentialRecord::generate(Algorithm::EdDsa, 0).unwrap();
    let second = CredentialRecord::generate(Algorithm::EdDsa, 0).unwrap();

    let mut store = DiskKeyStore::open(dir.path()).unwrap();
    store.put(handle.clone(), first.clone()).unwrap();
    assert_eq!(store.put(handle.clone(), second.clone()).unwrap(), Some(first));
    assert_eq!(bin_files(dir.path()), 1);

    assert!(store.remove(&handle).unwrap());
    assert!(!store.remove(&handle).unwrap());
    assert_eq!(bin_files(dir.path()), 0);
    assert!(DiskKeyStore::open(dir.path()).unwrap().is_empty());
}

#[test]
fn test_corrupt_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let handle = KeyHandle::new("a.example | alice | ES256");
    {
        let mut store = DiskKeyStore::open(dir.path()).unwrap();
        store
            .put(handle.clone(), CredentialRecord::generate(Algorithm::Es256, 0).unwrap())
            .unwrap();
    }
    std::fs::write(dir.path().join("deadbeef.bin"), b"not cbor").unwrap();

    let store = DiskKeyStore::open(dir.path()).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.get(&handle).unwrap().is_some());
}

#[tokio::test]
async fn test_manager_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        key_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    let handle = KeyHandle::new("profile2 | ES256");

    let created = {
        let mgr = CredentialManager::open(config.clone()).unwrap();
        mgr.get_or_create_key(&handle, Algorithm::Es256).await.unwrap()
    };

    let mgr = CredentialManager::open(config).unwrap();
    assert_eq!(mgr.get_key(&handle).unwrap(), Some(created));
    assert_eq!(mgr.clear_keys().await.unwrap(), 1);
    assert_eq!(bin_files(dir.path()), 0);
}
