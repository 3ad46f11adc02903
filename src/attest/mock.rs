//! Mock hardware key provider for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::HardwareKeyProvider;
use crate::error::{AttestError, Result};

/// Deterministic mock of the secure hardware.
/// WARNING: Do not use in production - no actual hardware is involved!
///
/// Outputs are derived by hashing a seed, so the same seed always yields the
/// same key identifier, statements, and assertions. Call counters make it
/// usable as a spy: tests can assert that an expired challenge never reached
/// the signing step, or that single-flight produced exactly one key.
pub struct MockKeyProvider {
    seed: u64,
    supported: AtomicBool,
    key_invalid: AtomicBool,
    generate_key_calls: AtomicUsize,
    attest_calls: AtomicUsize,
    assertion_calls: AtomicUsize,
}

impl MockKeyProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            supported: AtomicBool::new(true),
            key_invalid: AtomicBool::new(false),
            generate_key_calls: AtomicUsize::new(0),
            attest_calls: AtomicUsize::new(0),
            assertion_calls: AtomicUsize::new(0),
        }
    }

    /// Make `is_supported` report `false`.
    pub fn set_unsupported(&self) {
        self.supported.store(false, Ordering::SeqCst);
    }

    /// Make subsequent attest/assertion calls fail with `KeyInvalid`, as
    /// real hardware does when the key was evicted.
    pub fn set_key_invalid(&self, invalid: bool) {
        self.key_invalid.store(invalid, Ordering::SeqCst);
    }

    pub fn generate_key_calls(&self) -> usize {
        self.generate_key_calls.load(Ordering::SeqCst)
    }

    pub fn attest_calls(&self) -> usize {
        self.attest_calls.load(Ordering::SeqCst)
    }

    pub fn assertion_calls(&self) -> usize {
        self.assertion_calls.load(Ordering::SeqCst)
    }

    /// Total sign/attest invocations (the "zero cryptographic operations"
    /// spy check for expired challenges).
    pub fn signing_calls(&self) -> usize {
        self.attest_calls() + self.assertion_calls()
    }

    fn derive(&self, label: &str, input: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(label.as_bytes());
        hasher.update(input);
        hasher.finalize().to_vec()
    }
}

impl Default for MockKeyProvider {
    fn default() -> Self {
        Self::new(0xA77E57_u64)
    }
}

#[async_trait]
impl HardwareKeyProvider for MockKeyProvider {
    async fn is_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    async fn generate_key(&self) -> Result<String> {
        self.generate_key_calls.fetch_add(1, Ordering::SeqCst);
        let count = self.generate_key_calls.load(Ordering::SeqCst);
        let digest = self.derive("key", &count.to_le_bytes());
        Ok(format!("mock-key-{}", hex::encode(&digest[..8])))
    }

    async fn attest_key(&self, key_id: &str, client_data_hash: &[u8; 32]) -> Result<Vec<u8>> {
        if self.key_invalid.load(Ordering::SeqCst) {
            return Err(AttestError::KeyInvalid);
        }
        self.attest_calls.fetch_add(1, Ordering::SeqCst);
        let mut input = key_id.as_bytes().to_vec();
        input.extend_from_slice(client_data_hash);
        Ok(self.derive("attest", &input))
    }

    async fn generate_assertion(
        &self,
        key_id: &str,
        client_data_hash: &[u8; 32],
    ) -> Result<Vec<u8>> {
        if self.key_invalid.load(Ordering::SeqCst) {
            return Err(AttestError::KeyInvalid);
        }
        self.assertion_calls.fetch_add(1, Ordering::SeqCst);
        let mut input = key_id.as_bytes().to_vec();
        input.extend_from_slice(client_data_hash);
        Ok(self.derive("assert", &input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_deterministic_for_same_inputs() {
        let p1 = MockKeyProvider::new(42);
        let p2 = MockKeyProvider::new(42);
        let hash = [7u8; 32];
        let a1 = p1.attest_key("key-x", &hash).await.unwrap();
        let a2 = p2.attest_key("key-x", &hash).await.unwrap();
        assert_eq!(a1, a2, "same seed and inputs should produce same output");
    }

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let provider = MockKeyProvider::default();
        let hash = [0u8; 32];
        provider.generate_key().await.unwrap();
        provider.attest_key("k", &hash).await.unwrap();
        provider.generate_assertion("k", &hash).await.unwrap();
        provider.generate_assertion("k", &hash).await.unwrap();
        assert_eq!(provider.generate_key_calls(), 1);
        assert_eq!(provider.attest_calls(), 1);
        assert_eq!(provider.assertion_calls(), 2);
        assert_eq!(provider.signing_calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_key_invalid_switch() {
        let provider = MockKeyProvider::default();
        provider.set_key_invalid(true);
        let hash = [0u8; 32];
        let err = provider.generate_assertion("k", &hash).await.unwrap_err();
        assert!(matches!(err, AttestError::KeyInvalid));
        assert_eq!(provider.assertion_calls(), 0, "failed call must not count");
    }

    #[tokio::test]
    async fn test_mock_unsupported_switch() {
        let provider = MockKeyProvider::default();
        assert!(provider.is_supported().await);
        provider.set_unsupported();
        assert!(!provider.is_supported().await);
    }
}
