//! Secure-hardware capability interface.

use async_trait::async_trait;

use crate::error::Result;

/// Consumed capability: the platform's secure execution environment.
///
/// The SDK never implements this itself; the host supplies the
/// platform-specific implementation (Secure Enclave / App Attest on iOS,
/// StrongBox-backed keystore on Android). Implementations must be
/// thread-safe (`Send + Sync`) and must report an unknown or unusable key
/// identifier as [`AttestError::KeyInvalid`](crate::AttestError::KeyInvalid)
/// so the service can run its recovery path.
#[async_trait]
pub trait HardwareKeyProvider: Send + Sync {
    /// Whether this device and OS support hardware attestation.
    async fn is_supported(&self) -> bool;

    /// Generate a new hardware-resident key and return its opaque
    /// identifier.
    async fn generate_key(&self) -> Result<String>;

    /// Produce an attestation statement binding `key_id` to
    /// `client_data_hash`. Produced once, at registration.
    async fn attest_key(&self, key_id: &str, client_data_hash: &[u8; 32]) -> Result<Vec<u8>>;

    /// Sign `client_data_hash` with the previously attested key.
    async fn generate_assertion(
        &self,
        key_id: &str,
        client_data_hash: &[u8; 32],
    ) -> Result<Vec<u8>>;
}
