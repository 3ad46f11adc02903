//! Error taxonomy for the attestation SDK.
//!
//! Errors are split along the spec's two natural layers: transport-level
//! failures ([`ProtocolError`]) and attestation-lifecycle failures
//! ([`AttestError`]). Configuration validation gets its own small enum so
//! misconfiguration is a typed, recoverable error rather than a panic.

use thiserror::Error;

/// Failures of the wire protocol layer (transport, status, decoding).
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Transport-level failure (connect, TLS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered with a non-2xx status. The machine-readable `code`
    /// from the error body is kept for classification and logging; the
    /// human `message` is logged only.
    #[error("HTTP status {status} [{}]", .code.as_deref().unwrap_or("-"))]
    HttpStatus {
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },

    /// Malformed response envelope or payload (bad JSON, bad hex).
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProtocolError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProtocolError::Decode(e.to_string())
        } else {
            ProtocolError::Network(e.to_string())
        }
    }
}

/// Failures of the attestation lifecycle.
#[derive(Error, Debug)]
pub enum AttestError {
    /// The challenge's expiry had passed by the time of use. No
    /// cryptographic operation was performed with it.
    #[error("challenge expired before use")]
    ChallengeExpired,

    /// The device or OS lacks the secure-hardware capability. Logged once;
    /// attestation is skipped for the lifetime of the process.
    #[error("hardware attestation not supported on this device")]
    HardwareUnsupported,

    /// The stored key identifier is unknown or unusable, reported either by
    /// the secure hardware or by the backend. The only error that mutates
    /// stored state (via the recovery path).
    #[error("key identifier invalid or unknown")]
    KeyInvalid,

    /// Any other secure-hardware failure (treated as transient).
    #[error("hardware error: {0}")]
    Hardware(String),

    /// Key material storage failure.
    #[error("key store error: {0}")]
    Store(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl AttestError {
    /// Whether this error means the registered key must be discarded.
    ///
    /// Covers both the hardware-reported form and backend rejections whose
    /// status or machine code names an unknown key.
    pub fn indicates_invalid_key(&self) -> bool {
        match self {
            AttestError::KeyInvalid => true,
            AttestError::Protocol(ProtocolError::HttpStatus { status, code, .. }) => {
                if matches!(status, 404 | 410) {
                    return true;
                }
                matches!(
                    code.as_deref(),
                    Some("KEY_NOT_FOUND" | "KEY_INVALID" | "DEVICE_KEY_NOT_FOUND")
                )
            }
            _ => false,
        }
    }
}

/// Configuration validation failure.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required configuration field missing or empty: {0}")]
    MissingField(&'static str),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Failure constructing the SDK facade.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T, E = AttestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_invalid_from_hardware() {
        assert!(AttestError::KeyInvalid.indicates_invalid_key());
    }

    #[test]
    fn test_key_invalid_from_status() {
        let not_found = AttestError::Protocol(ProtocolError::HttpStatus {
            status: 404,
            code: None,
            message: None,
        });
        let gone = AttestError::Protocol(ProtocolError::HttpStatus {
            status: 410,
            code: None,
            message: None,
        });
        assert!(not_found.indicates_invalid_key());
        assert!(gone.indicates_invalid_key());
    }

    #[test]
    fn test_key_invalid_from_machine_code() {
        let err = AttestError::Protocol(ProtocolError::HttpStatus {
            status: 400,
            code: Some("KEY_NOT_FOUND".into()),
            message: Some("no such key".into()),
        });
        assert!(err.indicates_invalid_key());
    }

    #[test]
    fn test_transient_errors_do_not_invalidate_key() {
        let server = AttestError::Protocol(ProtocolError::HttpStatus {
            status: 500,
            code: None,
            message: None,
        });
        let network = AttestError::Protocol(ProtocolError::Network("connection reset".into()));
        let expired = AttestError::ChallengeExpired;
        assert!(!server.indicates_invalid_key());
        assert!(!network.indicates_invalid_key());
        assert!(!expired.indicates_invalid_key());
    }
}
