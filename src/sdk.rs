//! SDK facade: explicit construction and wiring of the SDK's services.
//!
//! There is no global instance. The host constructs one [`Sdk`], which owns
//! its API client, auth manager, and attestation service, and passes it (or
//! the attestation handle) to the call sites that need it.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::api::ApiClient;
use crate::attest::{
    AttestationService, ChallengeProtocolClient, HardwareKeyProvider, Readiness,
};
use crate::auth::{AuthManager, TokenStore};
use crate::config::SdkConfig;
use crate::error::{AttestError, Result, SdkError};
use crate::store::KeyMaterialStore;

/// One configured SDK instance.
pub struct Sdk {
    config: SdkConfig,
    api: Arc<ApiClient>,
    auth: AuthManager,
    attestation: Arc<AttestationService>,
}

impl Sdk {
    /// Validate the configuration and wire every service.
    ///
    /// The host supplies the platform implementations of secure key storage
    /// and secure hardware. Registration is not started here; call
    /// [`ensure_attestation_ready`](Self::ensure_attestation_ready) or
    /// [`spawn_attestation_registration`](Self::spawn_attestation_registration)
    /// to run it; the asynchronous contract is explicit, never
    /// fire-and-forget.
    pub fn new(
        config: SdkConfig,
        key_store: Arc<dyn KeyMaterialStore>,
        key_provider: Arc<dyn HardwareKeyProvider>,
        token_store: Arc<dyn TokenStore>,
    ) -> Result<Self, SdkError> {
        config.validate()?;

        let api = Arc::new(ApiClient::new(config.clone())?);
        let auth = AuthManager::new(Arc::clone(&api), token_store);
        let protocol = Arc::new(ChallengeProtocolClient::new(config.clone())?);
        let attestation = Arc::new(AttestationService::new(protocol, key_provider, key_store));

        info!(environment = %config.environment, "SDK configured");
        Ok(Self {
            config,
            api,
            auth,
            attestation,
        })
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn attestation(&self) -> &Arc<AttestationService> {
        &self.attestation
    }

    /// Run attestation registration to completion on the current task.
    pub async fn ensure_attestation_ready(&self) -> Result<Readiness, AttestError> {
        self.attestation.ensure_ready().await
    }

    /// Start attestation registration in the background and hand the host a
    /// handle it can await or drop.
    pub fn spawn_attestation_registration(&self) -> JoinHandle<Result<Readiness, AttestError>> {
        let attestation = Arc::clone(&self.attestation);
        tokio::spawn(async move { attestation.ensure_ready().await })
    }
}
