//! Byte-level helpers shared by every codec in the crate.

pub(crate) mod cbor;
pub mod reader;
pub mod text;

pub use reader::{Reader, decode_uint, encode_uint};
pub use text::{
    Codec, base64url_to_bytes, bytes_to_base64url, bytes_to_hex, decode, encode, hex_to_bytes,
};
