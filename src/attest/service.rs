//! Attestation lifecycle orchestrator.
//!
//! Owns the registration state machine (`NoKey -> Registering -> Ready`),
//! the per-call assertion algorithm, and the stale-key recovery path. All
//! registration and recovery work runs under one async mutex, so concurrent
//! callers share a single in-flight registration instead of generating
//! duplicate keys (single-flight).

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::protocol::ChallengeApi;
use super::provider::HardwareKeyProvider;
use super::{assertion_hash, registration_hash};
use crate::codec;
use crate::error::{AttestError, Result};
use crate::store::KeyMaterialStore;

/// Outcome of [`AttestationService::ensure_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A key identifier is registered and persisted locally.
    Ready,
    /// The device lacks hardware attestation; the SDK operates without it.
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NoKey,
    Registering,
    Ready,
    Unsupported,
}

/// Orchestrates key provisioning, registration, per-call assertions, and
/// stale-key recovery.
///
/// Every failure mode of [`assert_for_call`](Self::assert_for_call)
/// collapses to `false` ("not verified for this call"): the host denies or
/// retries, it never has to catch errors around business logic.
pub struct AttestationService {
    api: Arc<dyn ChallengeApi>,
    provider: Arc<dyn HardwareKeyProvider>,
    store: Arc<dyn KeyMaterialStore>,
    /// Guards registration and recovery; also holds the lifecycle state so
    /// state transitions only happen with the flight lock held.
    state: Mutex<State>,
}

impl AttestationService {
    /// Wire up the service. The initial state is probed from the store: a
    /// persisted key identifier means a registration previously completed
    /// its local write.
    pub fn new(
        api: Arc<dyn ChallengeApi>,
        provider: Arc<dyn HardwareKeyProvider>,
        store: Arc<dyn KeyMaterialStore>,
    ) -> Self {
        let initial = match store.load() {
            Ok(Some(_)) => State::Ready,
            Ok(None) => State::NoKey,
            Err(e) => {
                warn!(error = %e, "key store unreadable at startup; assuming no key");
                State::NoKey
            }
        };
        Self {
            api,
            provider,
            store,
            state: Mutex::new(initial),
        }
    }

    /// Whether a registered key is available locally.
    pub async fn is_ready(&self) -> bool {
        *self.state.lock().await == State::Ready
    }

    /// Provision and register a hardware key if none exists. Idempotent and
    /// safe to call on every app launch.
    ///
    /// Concurrent callers before the key exists await the same in-flight
    /// registration. An unsupported device is `Ok(Unsupported)`, not an
    /// error. Failures after the key identifier is persisted are returned
    /// but leave the key in place; the backend tolerates an unconfirmed
    /// registration until the recovery path replaces the key.
    #[instrument(level = "info", skip(self))]
    pub async fn ensure_ready(&self) -> Result<Readiness> {
        let mut state = self.state.lock().await;
        match *state {
            State::Ready => Ok(Readiness::Ready),
            State::Unsupported => Ok(Readiness::Unsupported),
            State::NoKey | State::Registering => self.run_registration(&mut state).await,
        }
    }

    /// Produce and submit a single-use proof for one protected call.
    ///
    /// Returns `true` only when the backend accepted the assertion. Any
    /// failure yields `false` and the caller must treat the call as
    /// unverified. A missing key triggers registration (the current call
    /// still fails); a key reported invalid triggers delete-then-re-register
    /// exactly once even under concurrent detection.
    #[instrument(level = "info", skip(self))]
    pub async fn assert_for_call(&self, purpose: &str) -> bool {
        let key_id = match self.store.load() {
            Ok(Some(key_id)) => key_id,
            Ok(None) => {
                warn!("no stored key identifier; registering instead of asserting");
                if let Err(e) = self.ensure_ready().await {
                    warn!(error = %e, "registration triggered by assert failed");
                }
                return false;
            }
            Err(e) => {
                warn!(error = %e, "key store unavailable; call remains unverified");
                return false;
            }
        };

        match self.try_assert(&key_id, purpose).await {
            Ok(()) => true,
            Err(e) if e.indicates_invalid_key() => {
                warn!(error = %e, "stored key reported invalid; entering recovery");
                self.recover(&key_id).await;
                false
            }
            Err(e) => {
                // Transient: network, server, or undeciphered errors do not
                // invalidate a key that may still be valid.
                warn!(error = %e, purpose, "assertion failed; call remains unverified");
                false
            }
        }
    }

    /// One assertion attempt: fresh challenge, expiry check, purpose-bound
    /// hash, hardware signature, submission.
    async fn try_assert(&self, key_id: &str, purpose: &str) -> Result<()> {
        let challenge = self.api.fetch_challenge().await?;
        if challenge.is_expired() {
            return Err(AttestError::ChallengeExpired);
        }

        let hash = assertion_hash(&challenge.bytes, purpose);
        let assertion = self.provider.generate_assertion(key_id, &hash).await?;

        self.api
            .verify_assertion(
                &challenge.id,
                &codec::encode_hex(&hash),
                key_id,
                &codec::encode_base64url(&assertion),
                purpose,
            )
            .await?;

        debug!(challenge_id = %challenge.id, purpose, "assertion accepted");
        Ok(())
    }

    /// Registration algorithm. Caller must hold the state lock.
    async fn run_registration(&self, state: &mut State) -> Result<Readiness> {
        *state = State::Registering;

        if !self.provider.is_supported().await {
            warn!("hardware attestation not supported on this device; skipping");
            *state = State::Unsupported;
            return Ok(Readiness::Unsupported);
        }

        let key_id = match self.provider.generate_key().await {
            Ok(key_id) => key_id,
            Err(e) => {
                *state = State::NoKey;
                warn!(error = %e, "hardware key generation failed");
                return Err(e);
            }
        };
        if let Err(e) = self.store.save(&key_id) {
            *state = State::NoKey;
            warn!(error = %e, "failed to persist key identifier");
            return Err(e);
        }

        // Durability point: the device now considers itself keyed, whether
        // or not the backend confirms below.
        *state = State::Ready;

        if let Err(e) = self.confirm_registration(&key_id).await {
            warn!(error = %e, "registration confirmation failed; key kept locally");
            return Err(e);
        }

        info!("device attestation registered");
        Ok(Readiness::Ready)
    }

    /// Registration confirmation: challenge, expiry check, attestation
    /// statement, submission.
    async fn confirm_registration(&self, key_id: &str) -> Result<()> {
        let challenge = self.api.fetch_challenge().await?;
        if challenge.is_expired() {
            return Err(AttestError::ChallengeExpired);
        }

        let hash = registration_hash(&challenge.bytes);
        let statement = self.provider.attest_key(key_id, &hash).await?;

        self.api
            .register_attestation(
                &challenge.id,
                &codec::encode_hex(&hash),
                key_id,
                &codec::encode_base64url(&statement),
            )
            .await
            .map_err(AttestError::from)
    }

    /// Stale-key recovery: delete the stored identifier and re-register.
    ///
    /// Runs under the flight lock. If a concurrent call already replaced or
    /// removed `bad_key_id`, this is a no-op so deletion-then-reregistration
    /// executes at most once.
    async fn recover(&self, bad_key_id: &str) {
        let mut state = self.state.lock().await;

        match self.store.load() {
            Ok(Some(current)) if current == bad_key_id => {}
            _ => {
                debug!("invalid key already replaced by a concurrent recovery");
                return;
            }
        }

        if let Err(e) = self.store.delete() {
            warn!(error = %e, "failed to delete invalid key identifier");
            return;
        }
        *state = State::NoKey;

        if let Err(e) = self.run_registration(&mut state).await {
            warn!(error = %e, "re-registration after key invalidation failed");
        }
    }
}
