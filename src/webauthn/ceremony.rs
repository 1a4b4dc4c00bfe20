//! Build the responses a passkey provider would return for creation and
//! request options, and sign or verify assertions.

use serde::{Deserialize, Serialize};

use super::attestation::{AttestationObject, AttestationStatement};
use super::authenticator_data::{AttestedCredentialData, AuthenticatorData, AuthenticatorFlags, rp_id_hash};
use super::client_data::{ClientData, TYPE_CREATE, TYPE_GET};
use crate::encoding::{self, Codec};
use crate::error::{Error, Result};
use crate::keys::Key;
use crate::policy::{CredentialManager, PubKeyCredParam, supported_algorithm};
use crate::signing;
use crate::store::{KeyHandle, KeyStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingParty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id:   Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id:           Option<String>,
    #[serde(default)]
    pub name:         String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// PublicKeyCredentialCreationOptions in JSON form (binary members as base64url).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationOptions {
    pub challenge:           String,
    #[serde(default)]
    pub rp:                  RelyingParty,
    #[serde(default)]
    pub user:                UserEntity,
    #[serde(default)]
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
}

/// PublicKeyCredentialRequestOptions in JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_id:     Option<String>,
}

/// Where the ceremony runs and how keys are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub origin:       String,
    pub mode:         String,
    pub cross_origin: Option<bool>,
    pub top_origin:   Option<String>,
}

impl CallerContext {
    pub fn new(origin: &str, mode: &str) -> Self {
        Self {
            origin:       origin.to_string(),
            mode:         mode.to_string(),
            cross_origin: None,
            top_origin:   None,
        }
    }

    fn client_data(&self, kind: &str, challenge: &str) -> ClientData {
        let mut cd = ClientData::new(kind, challenge, &self.origin);
        cd.cross_origin = self.cross_origin;
        cd.top_origin = self.top_origin.clone();
        cd
    }

    /// The origin's host, used when the options name no RP ID.
    pub fn origin_host(&self) -> Result<String> {
        let url = url::Url::parse(&self.origin)
            .map_err(|e| Error::Decode(format!("origin {}: {e}", self.origin)))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Decode(format!("origin {} has no host", self.origin)))
    }
}

/// Output of [`attestation_for_creation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Attestation {
    pub client_data:        ClientData,
    pub attestation_object: AttestationObject,
    pub key_handle:         KeyHandle,
}

/// Output of [`assertion_for_request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub client_data:        ClientData,
    pub authenticator_data: AuthenticatorData,
}

fn provider_flags() -> AuthenticatorFlags {
    AuthenticatorFlags {
        up: true,
        uv: true,
        be: true,
        bs: true,
        ..Default::default()
    }
}

/// Answer creation options with a "none" attestation for the key the policy
/// picks, creating that key on first use.
pub async fn attestation_for_creation<S: KeyStore>(
    manager: &CredentialManager<S>,
    options: &CreationOptions,
    ctx: &CallerContext,
) -> Result<Attestation> {
    let rp_id = match &options.rp.id {
        Some(id) => id.clone(),
        None => ctx.origin_host()?,
    };
    let alg = supported_algorithm(&options.pub_key_cred_params);
    let handle = manager.resolve_handle(&rp_id, &options.user.name, &ctx.mode, alg);
    let record = manager.get_or_create_key(&handle, alg).await?;

    let attested = AttestedCredentialData::new(
        manager.config().aaguid,
        record.credential_id.clone(),
        record.public_key.clone(),
    )?;
    let auth_data = AuthenticatorData {
        rp_id_hash:               rp_id_hash(&rp_id),
        flags:                    AuthenticatorFlags { at: true, ..provider_flags() },
        sign_count:               0,
        attested_credential_data: Some(attested),
        extensions:               Vec::new(),
    };
    tracing::debug!(rp_id = %rp_id, handle = %handle, alg = %alg, "Built attestation");
    Ok(Attestation {
        client_data: ctx.client_data(TYPE_CREATE, &options.challenge),
        attestation_object: AttestationObject {
            statement: AttestationStatement::None,
            auth_data,
        },
        key_handle: handle,
    })
}

/// Answer request options with client data and authenticator data; the
/// caller signs with whichever stored key it chooses.
pub fn assertion_for_request(options: &RequestOptions, ctx: &CallerContext) -> Result<Assertion> {
    let rp_id = match &options.rp_id {
        Some(id) => id.clone(),
        None => ctx.origin_host()?,
    };
    Ok(Assertion {
        client_data:        ctx.client_data(TYPE_GET, &options.challenge),
        authenticator_data: AuthenticatorData {
            rp_id_hash:               rp_id_hash(&rp_id),
            flags:                    provider_flags(),
            sign_count:               0,
            attested_credential_data: None,
            extensions:               Vec::new(),
        },
    })
}

fn payload(client_data_hash_hex: &str, authenticator_data_hex: &str) -> Result<Vec<u8>> {
    let mut payload = encoding::hex_to_bytes(authenticator_data_hex.trim())?;
    payload.extend_from_slice(&encoding::hex_to_bytes(client_data_hash_hex.trim())?);
    tracing::debug!(payload = %hex::encode(&payload), "Assertion payload");
    Ok(payload)
}

/// Sign `authenticatorData || clientDataHash`, both given as hex, and
/// return the signature as text in `codec`.
pub fn sign_assertion(
    client_data_hash_hex: &str,
    authenticator_data_hex: &str,
    key: &Key,
    codec: Codec,
) -> Result<String> {
    let signature = signing::sign(key, &payload(client_data_hash_hex, authenticator_data_hex)?)?;
    Ok(encoding::encode(&signature, codec))
}

/// Verify a signature, given as text in `codec`, over
/// `authenticatorData || clientDataHash`. Text outside the codec's alphabet
/// is a `Decode` error; a signature that does not verify is `Ok(false)`.
pub fn verify_assertion(
    client_data_hash_hex: &str,
    authenticator_data_hex: &str,
    signature: &str,
    codec: Codec,
    key: &Key,
) -> Result<bool> {
    let signature = encoding::decode(signature, codec)?;
    signing::verify(key, &payload(client_data_hash_hex, authenticator_data_hex)?, &signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::keys::Algorithm;
    use crate::webauthn::authenticator_data::encode_authenticator_data;

    fn creation(rp_id: Option<&str>, user: &str) -> CreationOptions {
        CreationOptions {
            challenge:           "Y2hhbGxlbmdl".into(),
            rp:                  RelyingParty { id: rp_id.map(str::to_string), name: None },
            user:                UserEntity { name: user.into(), ..Default::default() },
            pub_key_cred_params: vec![PubKeyCredParam { kind: "public-key".into(), alg: -8 }],
        }
    }

    #[tokio::test]
    async fn test_creation_uses_origin_host_without_rp_id() {
        let mgr = CredentialManager::in_memory(Config::default());
        let ctx = CallerContext::new("https://login.example.com:8443/path", "default");
        let att = attestation_for_creation(&mgr, &creation(None, "alice"), &ctx).await.unwrap();
        let auth = &att.attestation_object.auth_data;
        assert_eq!(auth.rp_id_hash, rp_id_hash("login.example.com"));
        assert_eq!(auth.flags.to_byte(), 0x5d);
        assert_eq!(att.key_handle.as_str(), "login.example.com | alice | EdDSA");
        assert_eq!(att.client_data.kind, TYPE_CREATE);
        let acd = auth.attested_credential_data.as_ref().unwrap();
        assert_eq!(hex::encode(acd.aaguid), "ea9b8d664d011d213ce4b6b48cb575d4");
        assert_eq!(acd.credential_id_length, 32);
        assert_eq!(acd.credential_public_key.alg(), Algorithm::EdDsa);
    }

    #[tokio::test]
    async fn test_profile_mode_shares_key_across_rps() {
        let mgr = CredentialManager::in_memory(Config::default());
        let ctx = CallerContext::new("https://a.example", "profile1");
        let a = attestation_for_creation(&mgr, &creation(Some("a.example"), "alice"), &ctx).await.unwrap();
        let b = attestation_for_creation(&mgr, &creation(Some("b.example"), "bob"), &ctx).await.unwrap();
        assert_eq!(a.key_handle, b.key_handle);
        let key_a = &a.attestation_object.auth_data.attested_credential_data.as_ref().unwrap().credential_id;
        let key_b = &b.attestation_object.auth_data.attested_credential_data.as_ref().unwrap().credential_id;
        assert_eq!(key_a, key_b);
        assert_ne!(a.attestation_object.auth_data.rp_id_hash, b.attestation_object.auth_data.rp_id_hash);
    }

    #[test]
    fn test_assertion_flags_and_client_data() {
        let mut ctx = CallerContext::new("https://example.com", "default");
        ctx.cross_origin = Some(true);
        ctx.top_origin = Some("https://top.example".into());
        let options = RequestOptions { challenge: "abc".into(), rp_id: Some("example.com".into()) };
        let assertion = assertion_for_request(&options, &ctx).unwrap();
        assert_eq!(assertion.authenticator_data.flags.to_byte(), 0x1d);
        assert_eq!(assertion.client_data.kind, TYPE_GET);
        assert_eq!(assertion.client_data.cross_origin, Some(true));
        assert_eq!(assertion.client_data.top_origin.as_deref(), Some("https://top.example"));
    }

    #[test]
    fn test_sign_and_verify_assertion_hex() {
        let key = crate::keys::generate_keypair(Algorithm::Es256, 0).unwrap();
        let ctx = CallerContext::new("https://example.com", "default");
        let options = RequestOptions { challenge: "abc".into(), rp_id: None };
        let assertion = assertion_for_request(&options, &ctx).unwrap();
        let auth_hex = hex::encode(encode_authenticator_data(&assertion.authenticator_data).unwrap());
        let hash_hex = hex::encode(assertion.client_data.hash().unwrap());

        let sig_hex = sign_assertion(&hash_hex, &auth_hex, &key, Codec::Hex).unwrap();
        assert!(verify_assertion(&hash_hex, &auth_hex, &sig_hex, Codec::Hex, &key.to_public()).unwrap());
        assert!(!verify_assertion(&hash_hex, "00", &sig_hex, Codec::Hex, &key).unwrap());
    }

    #[test]
    fn test_assertion_signature_base64url() {
        let key = crate::keys::generate_keypair(Algorithm::EdDsa, 0).unwrap();
        let auth_hex = format!("{}1d00000000", "00".repeat(32));
        let hash_hex = "11".repeat(32);

        let sig = sign_assertion(&hash_hex, &auth_hex, &key, Codec::Base64Url).unwrap();
        assert_eq!(sig.len(), 86, "64 bytes, unpadded");
        assert!(!sig.contains('='));
        assert!(verify_assertion(&hash_hex, &auth_hex, &sig, Codec::Base64Url, &key).unwrap());

        let as_hex = encoding::encode(&encoding::decode(&sig, Codec::Base64Url).unwrap(), Codec::Hex);
        assert!(verify_assertion(&hash_hex, &auth_hex, &as_hex, Codec::Hex, &key).unwrap());
        assert!(matches!(
            verify_assertion(&hash_hex, &auth_hex, "zz!", Codec::Hex, &key),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_bad_origin() {
        let ctx = CallerContext::new("not a url", "default");
        let options = RequestOptions { challenge: "abc".into(), rp_id: None };
        assert!(matches!(assertion_for_request(&options, &ctx), Err(Error::Decode(_))));
    }
}
