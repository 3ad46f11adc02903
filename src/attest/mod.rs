//! Device attestation lifecycle.
//!
//! Binds a hardware-backed key to a backend-issued identity and produces
//! single-use signed proofs ("assertions") for sensitive API calls. The
//! flow is challenge-response throughout:
//!
//! 1. [`AttestationService::ensure_ready`] provisions a hardware key,
//!    persists its identifier, and registers an attestation statement with
//!    the backend against a fresh server challenge.
//! 2. [`AttestationService::assert_for_call`] fetches a fresh challenge per
//!    protected call, signs `hash(challenge ‖ purpose)` with the registered
//!    key, and submits the assertion for verification.
//!
//! Challenges are single-use and expire; a challenge past its expiry is
//! rejected before any cryptographic operation. A key the hardware or
//! backend no longer recognizes is deleted and re-registered exactly once
//! (recovery path), with the triggering call reported as unverified.
//!
//! Secure hardware is consumed through [`HardwareKeyProvider`], so the whole
//! lifecycle is testable against [`MockKeyProvider`].

mod mock;
mod protocol;
mod provider;
mod service;

pub use mock::MockKeyProvider;
pub use protocol::{Challenge, ChallengeApi, ChallengeProtocolClient};
pub use provider::HardwareKeyProvider;
pub use service::{AttestationService, Readiness};

use sha2::{Digest, Sha256};

/// Client data hash binding a registration to its challenge.
pub fn registration_hash(challenge: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(challenge);
    hasher.finalize().into()
}

/// Client data hash binding an assertion to its challenge and the caller's
/// declared purpose. Different purposes over the same challenge bytes yield
/// different hashes, so a signature cannot be replayed for another
/// operation.
pub fn assertion_hash(challenge: &[u8], purpose: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(challenge);
    hasher.update(purpose.as_bytes());
    hasher.finalize().into()
}
