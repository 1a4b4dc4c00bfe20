pub mod config;
pub mod encoding;
pub mod error;
pub mod keys;
pub mod logging;
pub mod policy;
pub mod signing;
pub mod store;
pub mod webauthn;

pub use config::Config;
pub use encoding::Codec;
pub use error::{Error, Result};
pub use keys::{Algorithm, Key, KeyFormat};
pub use policy::{CredentialManager, resolve_key_handle, supported_algorithm};
pub use signing::{EcSignatureFormat, SignatureEngine, sign, verify};
pub use store::{CredentialRecord, DiskKeyStore, KeyHandle, KeyStore, MemoryKeyStore};
