#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decode: {0}")]
    Decode(String),
    #[error("truncated {what}: need {expected} bytes, have {available}")]
    TruncatedInput {
        what:      &'static str,
        expected:  usize,
        available: usize,
    },
    #[error("malformed: {0}")]
    MalformedBinary(String),
    #[error("unsupported attestation format: {0}")]
    UnsupportedFormat(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("crypto: {0}")]
    Crypto(String),
    #[error("cbor: {0}")]
    Cbor(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store: {0}")]
    Store(#[from] crate::store::StoreError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
