//! Which stored key a request should use.

pub mod manager;

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_ALGORITHM, PROFILE_MODES};
use crate::keys::Algorithm;
use crate::store::KeyHandle;

pub use manager::{CredentialManager, ImportSummary};

/// One entry of `pubKeyCredParams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyCredParam {
    #[serde(rename = "type", default = "public_key_type")]
    pub kind: String,
    pub alg:  i64,
}

fn public_key_type() -> String {
    "public-key".to_string()
}

/// First algorithm in request order that the engine supports, else ES256.
pub fn supported_algorithm(params: &[PubKeyCredParam]) -> Algorithm {
    params
        .iter()
        .find_map(|p| Algorithm::from_cose_id(p.alg))
        .unwrap_or(DEFAULT_ALGORITHM)
}

/// Handle for the key a request should use. Profile modes share one key per
/// algorithm across every relying party; any other mode gets one key per
/// relying party and user.
pub fn resolve_key_handle(rp_id: &str, user_name: &str, mode: &str, alg: Algorithm) -> KeyHandle {
    handle_for(PROFILE_MODES.contains(&mode), rp_id, user_name, mode, alg)
}

pub(crate) fn handle_for(
    profile: bool,
    rp_id: &str,
    user_name: &str,
    mode: &str,
    alg: Algorithm,
) -> KeyHandle {
    if profile {
        profile_handle(mode, alg)
    } else {
        KeyHandle::new(format!("{} | {} | {alg}", escape_field(rp_id), escape_field(user_name)))
    }
}

pub(crate) fn profile_handle(mode: &str, alg: Algorithm) -> KeyHandle {
    KeyHandle::new(format!("{} | {alg}", escape_field(mode)))
}

/// Backslash-escape `\` and `|`; every unescaped `|` in a handle is a
/// field separator.
fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if matches!(c, '\\' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
