//! Hex and base64url byte-string codecs.
//!
//! Everything crossing the wire is text: challenges arrive hex-encoded,
//! attestation objects and assertions leave base64url-encoded (no padding).
//! Decoding failures surface as [`ProtocolError::Decode`] so a malformed
//! payload is rejected before any protocol submission happens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::ProtocolError;

/// Decode a hex string (either case) into bytes.
///
/// Odd-length input or any non-hex character is a `Decode` error.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, ProtocolError> {
    hex::decode(s.trim()).map_err(|e| ProtocolError::Decode(format!("invalid hex: {e}")))
}

/// Encode bytes as lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Encode bytes as base64url without padding.
///
/// The output alphabet never contains `+`, `/`, or `=`.
pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode an unpadded base64url string into bytes.
pub fn decode_base64url(s: &str) -> Result<Vec<u8>, ProtocolError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| ProtocolError::Decode(format!("invalid base64url: {e}")))
}
