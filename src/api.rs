//! Generic authenticated REST client for the non-attestation endpoints
//! (login, token refresh, license verification).

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SdkConfig;
use crate::error::ProtocolError;

const LOGIN_PATH: &str = "/api/v1/sdk/v1/auth/login";
const REFRESH_PATH: &str = "/api/v1/sdk/v1/auth/refresh";
const LICENSE_VERIFY_PATH: &str = "/api/v1/sdk/v1/license/verify";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Standard response envelope used by enveloped endpoints.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// License verification result.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatus {
    pub valid: bool,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    tenant_id: &'a str,
    platform: &'a str,
    bundle_id: &'a str,
    public_sdk_key: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    tenant_id: &'a str,
    platform: &'a str,
    bundle_id: &'a str,
    public_sdk_key: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LicenseVerifyRequest<'a> {
    license_key: &'a str,
}

/// Authenticated JSON client sharing the SDK's identity headers.
pub struct ApiClient {
    client: Client,
    config: SdkConfig,
}

impl ApiClient {
    pub fn new(config: SdkConfig) -> Result<Self, ProtocolError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .https_only(true)
            .build()
            .map_err(|e| ProtocolError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        bearer_token: Option<&str>,
    ) -> Result<T, ProtocolError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url(), path);
        let mut request = self.client.post(&url).json(body);
        for (name, value) in self.config.default_headers() {
            request = request.header(name, value);
        }
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ProtocolError::from)?;
        let status = response.status();
        debug!(path, status = %status, "api response");

        if !status.is_success() {
            warn!(path, status = status.as_u16(), "api request rejected");
            return Err(ProtocolError::HttpStatus {
                status: status.as_u16(),
                code: None,
                message: None,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProtocolError::Decode(format!("malformed response from {path}: {e}")))
    }

    /// Authenticate a user and return the issued token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ProtocolError> {
        let body = LoginRequest {
            email,
            password,
            tenant_id: &self.config.tenant_id,
            platform: &self.config.platform,
            bundle_id: &self.config.bundle_id,
            public_sdk_key: &self.config.public_sdk_key,
        };
        self.post_json(LOGIN_PATH, &body, None).await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ProtocolError> {
        let body = RefreshRequest {
            refresh_token,
            tenant_id: &self.config.tenant_id,
            platform: &self.config.platform,
            bundle_id: &self.config.bundle_id,
            public_sdk_key: &self.config.public_sdk_key,
        };
        let response: RefreshResponse = self.post_json(REFRESH_PATH, &body, None).await?;
        Ok(response.access_token)
    }

    /// Verify a license key against the backend.
    pub async fn verify_license(&self, license_key: &str) -> Result<LicenseStatus, ProtocolError> {
        let body = LicenseVerifyRequest { license_key };
        let envelope: ApiEnvelope<LicenseStatus> =
            self.post_json(LICENSE_VERIFY_PATH, &body, None).await?;
        envelope.data.ok_or_else(|| {
            ProtocolError::Decode(format!(
                "license verify returned no data [{}]: {}",
                envelope.code.as_deref().unwrap_or("-"),
                envelope.message.as_deref().unwrap_or("-"),
            ))
        })
    }
}
