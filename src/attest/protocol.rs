//! Wire-protocol adapter for the device attestation endpoints.
//!
//! Three authenticated JSON POSTs against the configured backend: fetch a
//! challenge, submit an attestation statement, submit an assertion.
//! Register and verify share one logical endpoint; the `flow` field
//! discriminates the assertion flow.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::codec;
use crate::config::SdkConfig;
use crate::error::ProtocolError;

const CHALLENGE_PATH: &str = "/api/v1/sdk/v1/device/challenge";
const REGISTER_PATH: &str = "/api/v1/sdk/v1/device/register";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server-issued, single-use nonce context.
///
/// Must be consumed (hashed, signed, submitted) strictly before
/// `expires_at_ms` and never reused across two protocol steps.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: String,
    pub bytes: Vec<u8>,
    /// Absolute expiry, epoch milliseconds.
    pub expires_at_ms: i64,
}

impl Challenge {
    /// Whether the expiry has passed as of `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Whether the expiry has passed as of now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis())
    }
}

/// The backend operations the attestation lifecycle needs.
///
/// [`ChallengeProtocolClient`] is the production implementation; tests
/// substitute a scripted double.
#[async_trait]
pub trait ChallengeApi: Send + Sync {
    /// Fetch a fresh single-use challenge.
    async fn fetch_challenge(&self) -> Result<Challenge, ProtocolError>;

    /// Submit an attestation statement for a newly generated key.
    /// Confirm-by-status: any 2xx means accepted, no body is required.
    async fn register_attestation(
        &self,
        challenge_id: &str,
        client_data_hash_hex: &str,
        key_id: &str,
        attestation_object_b64url: &str,
    ) -> Result<(), ProtocolError>;

    /// Submit an assertion for verification. Same confirm-by-status
    /// contract as registration.
    async fn verify_assertion(
        &self,
        challenge_id: &str,
        client_data_hash_hex: &str,
        key_id: &str,
        assertion_b64url: &str,
        purpose: &str,
    ) -> Result<(), ProtocolError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeResponse {
    challenge_id: String,
    /// Hex-encoded nonce bytes.
    challenge: String,
    /// Epoch milliseconds.
    expires_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentityFields<'a> {
    public_sdk_key: &'a str,
    tenant_id: &'a str,
    platform: &'a str,
    bundle_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    #[serde(flatten)]
    identity: IdentityFields<'a>,
    challenge_id: &'a str,
    client_data_hash: &'a str,
    key_id: &'a str,
    attestation_object: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssertRequest<'a> {
    #[serde(flatten)]
    identity: IdentityFields<'a>,
    /// Discriminates assertion verification from registration at the same
    /// endpoint.
    flow: &'static str,
    challenge_id: &'a str,
    client_data_hash: &'a str,
    key_id: &'a str,
    assertion: &'a str,
    purpose: &'a str,
}

/// Machine-readable error body, read for logging and key-invalid
/// classification only.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Production [`ChallengeApi`] over HTTPS.
pub struct ChallengeProtocolClient {
    client: Client,
    config: SdkConfig,
}

impl ChallengeProtocolClient {
    /// Build the HTTP client. Fails with `Network` if the TLS backend
    /// cannot be initialized.
    pub fn new(config: SdkConfig) -> Result<Self, ProtocolError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .https_only(true)
            .build()
            .map_err(|e| ProtocolError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Turn a decoded envelope into a usable challenge. Malformed hex in
    /// the nonce payload is a `Decode` error, raised before anything is
    /// submitted to the register/verify endpoints.
    fn decode_challenge(dto: ChallengeResponse) -> Result<Challenge, ProtocolError> {
        let bytes = codec::decode_hex(&dto.challenge)?;
        Ok(Challenge {
            id: dto.challenge_id,
            bytes,
            expires_at_ms: dto.expires_at,
        })
    }

    fn identity(&self) -> IdentityFields<'_> {
        IdentityFields {
            public_sdk_key: &self.config.public_sdk_key,
            tenant_id: &self.config.tenant_id,
            platform: &self.config.platform,
            bundle_id: &self.config.bundle_id,
        }
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProtocolError> {
        let url = format!("{}{}", self.config.base_url(), path);
        let mut request = self.client.post(&url).json(body);
        for (name, value) in self.config.default_headers() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(ProtocolError::from)?;
        let status = response.status();
        debug!(path, status = %status, "device endpoint response");

        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            warn!(
                path,
                status = status.as_u16(),
                code = body.code.as_deref().unwrap_or("-"),
                message = body.message.as_deref().unwrap_or("-"),
                "device endpoint rejected request"
            );
            return Err(ProtocolError::HttpStatus {
                status: status.as_u16(),
                code: body.code,
                message: body.message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChallengeApi for ChallengeProtocolClient {
    async fn fetch_challenge(&self) -> Result<Challenge, ProtocolError> {
        let response = self.post_json(CHALLENGE_PATH, &self.identity()).await?;

        let dto: ChallengeResponse = response
            .json()
            .await
            .map_err(|e| ProtocolError::Decode(format!("malformed challenge envelope: {e}")))?;

        let challenge = Self::decode_challenge(dto)?;
        debug!(
            challenge_id = %challenge.id,
            expires_at = challenge.expires_at_ms,
            "fetched device challenge"
        );
        Ok(challenge)
    }

    async fn register_attestation(
        &self,
        challenge_id: &str,
        client_data_hash_hex: &str,
        key_id: &str,
        attestation_object_b64url: &str,
    ) -> Result<(), ProtocolError> {
        let request = RegisterRequest {
            identity: self.identity(),
            challenge_id,
            client_data_hash: client_data_hash_hex,
            key_id,
            attestation_object: attestation_object_b64url,
        };
        self.post_json(REGISTER_PATH, &request).await?;
        Ok(())
    }

    async fn verify_assertion(
        &self,
        challenge_id: &str,
        client_data_hash_hex: &str,
        key_id: &str,
        assertion_b64url: &str,
        purpose: &str,
    ) -> Result<(), ProtocolError> {
        let request = AssertRequest {
            identity: self.identity(),
            flow: "assertion",
            challenge_id,
            client_data_hash: client_data_hash_hex,
            key_id,
            assertion: assertion_b64url,
            purpose,
        };
        self.post_json(REGISTER_PATH, &request).await?;
        Ok(())
    }
}
