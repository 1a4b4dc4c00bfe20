//! WebAuthn wire structures: authenticator data, attestation objects and
//! clientDataJSON, plus the ceremony builders that assemble them.

pub mod attestation;
pub mod authenticator_data;
pub mod ceremony;
pub mod client_data;

pub use attestation::{
    AttestationObject, AttestationStatement, PackedStatement, decode_attestation_object,
    decode_attestation_object_text, encode_attestation_object, encode_attestation_object_text,
    encode_auth_data_only,
};
pub use authenticator_data::{
    AttestedCredentialData, AuthenticatorData, AuthenticatorFlags, decode_authenticator_data,
    decode_authenticator_data_text, encode_authenticator_data, encode_authenticator_data_text,
    rp_id_hash,
};
pub use ceremony::{
    Assertion, Attestation, CallerContext, CreationOptions, RequestOptions, assertion_for_request,
    attestation_for_creation, sign_assertion, verify_assertion,
};
pub use client_data::{ClientData, decode_client_data, encode_client_data};
