//! End-to-end attestation lifecycle scenarios against scripted doubles:
//! challenge expiry, missing-key registration, single-flight, and stale-key
//! recovery.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chrono::Utc;

use attestkit::{
    assertion_hash, AttestationService, Challenge, ChallengeApi, HardwareKeyProvider,
    KeyMaterialStore, MemoryKeyStore, MockKeyProvider, ProtocolError, Readiness,
};

/// Route service logs through a subscriber when RUST_LOG is set.
fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

#[derive(Debug, Clone, Copy)]
enum VerifyMode {
    Accept,
    KeyInvalid,
    ServerError,
}

#[derive(Debug, Clone, Default)]
struct VerifyCall {
    challenge_id: String,
    client_data_hash_hex: String,
    key_id: String,
    purpose: String,
}

/// Scripted backend double. Challenges expire `challenge_ttl_ms` from issue
/// time (negative means already expired); assertion verification responds
/// per a queue of [`VerifyMode`]s, defaulting to accept.
struct ScriptedApi {
    challenge_ttl_ms: i64,
    fail_challenge_decode: bool,
    verify_modes: Mutex<VecDeque<VerifyMode>>,
    challenges: AtomicUsize,
    registers: AtomicUsize,
    verifies: AtomicUsize,
    last_verify: Mutex<Option<VerifyCall>>,
    last_challenge_bytes: Mutex<Vec<u8>>,
}

impl ScriptedApi {
    fn new() -> Self {
        Self {
            challenge_ttl_ms: 60_000,
            fail_challenge_decode: false,
            verify_modes: Mutex::new(VecDeque::new()),
            challenges: AtomicUsize::new(0),
            registers: AtomicUsize::new(0),
            verifies: AtomicUsize::new(0),
            last_verify: Mutex::new(None),
            last_challenge_bytes: Mutex::new(Vec::new()),
        }
    }

    fn with_expired_challenges() -> Self {
        Self {
            challenge_ttl_ms: -1_000,
            ..Self::new()
        }
    }

    fn with_undecodable_challenges() -> Self {
        Self {
            fail_challenge_decode: true,
            ..Self::new()
        }
    }

    fn queue_verify(&self, mode: VerifyMode) {
        self.verify_modes.lock().unwrap().push_back(mode);
    }

    fn challenges_fetched(&self) -> usize {
        self.challenges.load(Ordering::SeqCst)
    }

    fn registrations(&self) -> usize {
        self.registers.load(Ordering::SeqCst)
    }

    fn verifications(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeApi for ScriptedApi {
    async fn fetch_challenge(&self) -> Result<Challenge, ProtocolError> {
        if self.fail_challenge_decode {
            // What ChallengeProtocolClient raises when the backend sends a
            // malformed hex payload such as "zz".
            return Err(ProtocolError::Decode("invalid hex: zz".into()));
        }
        let n = self.challenges.fetch_add(1, Ordering::SeqCst);
        let bytes = vec![0x10 + n as u8; 16];
        *self.last_challenge_bytes.lock().unwrap() = bytes.clone();
        Ok(Challenge {
            id: format!("chal-{n}"),
            bytes,
            expires_at_ms: Utc::now().timestamp_millis() + self.challenge_ttl_ms,
        })
    }

    async fn register_attestation(
        &self,
        _challenge_id: &str,
        _client_data_hash_hex: &str,
        _key_id: &str,
        _attestation_object_b64url: &str,
    ) -> Result<(), ProtocolError> {
        self.registers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn verify_assertion(
        &self,
        challenge_id: &str,
        client_data_hash_hex: &str,
        key_id: &str,
        _assertion_b64url: &str,
        purpose: &str,
    ) -> Result<(), ProtocolError> {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        *self.last_verify.lock().unwrap() = Some(VerifyCall {
            challenge_id: challenge_id.to_string(),
            client_data_hash_hex: client_data_hash_hex.to_string(),
            key_id: key_id.to_string(),
            purpose: purpose.to_string(),
        });
        let mode = self
            .verify_modes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(VerifyMode::Accept);
        match mode {
            VerifyMode::Accept => Ok(()),
            VerifyMode::KeyInvalid => Err(ProtocolError::HttpStatus {
                status: 404,
                code: Some("KEY_NOT_FOUND".into()),
                message: Some("key identifier unknown to backend".into()),
            }),
            VerifyMode::ServerError => Err(ProtocolError::HttpStatus {
                status: 500,
                code: None,
                message: None,
            }),
        }
    }
}

struct Harness {
    api: Arc<ScriptedApi>,
    provider: Arc<MockKeyProvider>,
    store: Arc<MemoryKeyStore>,
    service: Arc<AttestationService>,
}

fn harness(api: ScriptedApi) -> Harness {
    init_tracing();
    let api = Arc::new(api);
    let provider = Arc::new(MockKeyProvider::default());
    let store = Arc::new(MemoryKeyStore::new());
    let service = Arc::new(AttestationService::new(
        Arc::clone(&api) as Arc<dyn ChallengeApi>,
        Arc::clone(&provider) as Arc<dyn HardwareKeyProvider>,
        Arc::clone(&store) as Arc<dyn KeyMaterialStore>,
    ));
    Harness {
        api,
        provider,
        store,
        service,
    }
}

/// Pre-seed the store so the service starts registered.
fn registered_harness(api: ScriptedApi, key_id: &str) -> Harness {
    init_tracing();
    let api = Arc::new(api);
    let provider = Arc::new(MockKeyProvider::default());
    let store = Arc::new(MemoryKeyStore::new());
    store.save(key_id).unwrap();
    let service = Arc::new(AttestationService::new(
        Arc::clone(&api) as Arc<dyn ChallengeApi>,
        Arc::clone(&provider) as Arc<dyn HardwareKeyProvider>,
        Arc::clone(&store) as Arc<dyn KeyMaterialStore>,
    ));
    Harness {
        api,
        provider,
        store,
        service,
    }
}

#[tokio::test]
async fn test_expired_challenge_blocks_registration_before_any_signing() {
    let h = harness(ScriptedApi::with_expired_challenges());

    let err = h.service.ensure_ready().await.unwrap_err();
    assert!(matches!(err, attestkit::AttestError::ChallengeExpired));

    // The key was provisioned and persisted before the challenge step, but
    // no attestation statement was ever produced or submitted.
    assert!(h.store.load().unwrap().is_some());
    assert_eq!(h.provider.signing_calls(), 0);
    assert_eq!(h.api.registrations(), 0);
}

#[tokio::test]
async fn test_expired_challenge_fails_assertion_before_any_signing() {
    let h = registered_harness(ScriptedApi::with_expired_challenges(), "key-1");

    assert!(!h.service.assert_for_call("send_message").await);
    assert_eq!(h.provider.signing_calls(), 0);
    assert_eq!(h.api.verifications(), 0);
    // Transient failure: the key stays
    assert_eq!(h.store.load().unwrap().as_deref(), Some("key-1"));
}

#[tokio::test]
async fn test_assert_without_key_registers_once_and_fails_the_call() {
    let h = harness(ScriptedApi::new());

    assert!(!h.service.assert_for_call("send_message").await);

    // Exactly one registration attempt, and the only challenge fetched was
    // the registration one: no assertion challenge, no verification.
    assert_eq!(h.provider.generate_key_calls(), 1);
    assert_eq!(h.api.registrations(), 1);
    assert_eq!(h.api.verifications(), 0);
    assert_eq!(h.api.challenges_fetched(), 1);
    assert!(h.store.load().unwrap().is_some());

    // The next call, now registered, verifies
    assert!(h.service.assert_for_call("send_message").await);
    assert_eq!(h.api.verifications(), 1);
}

#[tokio::test]
async fn test_concurrent_ensure_ready_is_single_flight() {
    let h = harness(ScriptedApi::new());

    let (a, b) = tokio::join!(h.service.ensure_ready(), h.service.ensure_ready());
    assert_eq!(a.unwrap(), Readiness::Ready);
    assert_eq!(b.unwrap(), Readiness::Ready);

    assert_eq!(h.provider.generate_key_calls(), 1);
    assert_eq!(h.api.registrations(), 1);
}

#[tokio::test]
async fn test_backend_key_invalid_deletes_key_and_reregisters() {
    let h = registered_harness(ScriptedApi::new(), "key-stale");
    h.api.queue_verify(VerifyMode::KeyInvalid);

    // The triggering call is unverified
    assert!(!h.service.assert_for_call("send_message").await);

    // Recovery replaced the stale identifier with a freshly registered one
    let current = h.store.load().unwrap().expect("a key must be present");
    assert_ne!(current, "key-stale");
    assert_eq!(h.provider.generate_key_calls(), 1);
    assert_eq!(h.api.registrations(), 1);

    // And the next assertion with the new key is accepted
    assert!(h.service.assert_for_call("send_message").await);
    let verify = h.api.last_verify.lock().unwrap().clone().unwrap();
    assert_eq!(verify.key_id, current);
}

#[tokio::test]
async fn test_hardware_key_invalid_also_triggers_recovery() {
    let h = registered_harness(ScriptedApi::new(), "key-evicted");
    h.provider.set_key_invalid(true);

    assert!(!h.service.assert_for_call("send_message").await);
    // Recovery regenerates through hardware, which still refuses; the stale
    // key is gone either way and no assertion was submitted.
    assert_ne!(h.store.load().unwrap().as_deref(), Some("key-evicted"));
    assert_eq!(h.api.verifications(), 0);

    // Hardware recovers; the following calls re-register and then verify
    h.provider.set_key_invalid(false);
    if h.store.load().unwrap().is_none() {
        assert!(!h.service.assert_for_call("send_message").await);
    }
    assert!(h.service.assert_for_call("send_message").await);
}

#[tokio::test]
async fn test_concurrent_key_invalid_recovers_at_most_once() {
    let h = registered_harness(ScriptedApi::new(), "key-stale");
    h.api.queue_verify(VerifyMode::KeyInvalid);
    h.api.queue_verify(VerifyMode::KeyInvalid);

    let (a, b) = tokio::join!(
        h.service.assert_for_call("send_message"),
        h.service.assert_for_call("delete_account"),
    );
    assert!(!a);
    assert!(!b);

    // Deletion-then-reregistration executed exactly once
    assert_eq!(h.provider.generate_key_calls(), 1);
    assert_eq!(h.api.registrations(), 1);
    assert!(h.store.load().unwrap().is_some());
}

#[tokio::test]
async fn test_server_error_leaves_key_untouched() {
    let h = registered_harness(ScriptedApi::new(), "key-1");
    h.api.queue_verify(VerifyMode::ServerError);

    assert!(!h.service.assert_for_call("send_message").await);
    assert_eq!(h.store.load().unwrap().as_deref(), Some("key-1"));
    assert_eq!(h.provider.generate_key_calls(), 0);
}

#[tokio::test]
async fn test_undecodable_challenge_fails_before_any_submission() {
    let h = registered_harness(ScriptedApi::with_undecodable_challenges(), "key-1");

    assert!(!h.service.assert_for_call("send_message").await);
    assert_eq!(h.provider.signing_calls(), 0);
    assert_eq!(h.api.registrations(), 0);
    assert_eq!(h.api.verifications(), 0);
}

#[tokio::test]
async fn test_assertion_hash_binds_challenge_and_purpose() {
    let h = registered_harness(ScriptedApi::new(), "key-1");

    assert!(h.service.assert_for_call("send_message").await);

    let verify = h.api.last_verify.lock().unwrap().clone().unwrap();
    let challenge_bytes = h.api.last_challenge_bytes.lock().unwrap().clone();
    let expected = assertion_hash(&challenge_bytes, "send_message");
    assert_eq!(verify.client_data_hash_hex, hex::encode(expected));
    assert_eq!(verify.purpose, "send_message");
    assert_eq!(verify.challenge_id, "chal-0");
}
