//! SDK configuration.
//!
//! Configuration is plain data passed to constructors. There is no global
//! singleton and no fail-fast crash on a missing field: [`SdkConfig::validate`]
//! returns a typed [`ConfigError`] that the host can handle.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Backend environment the SDK talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkEnvironment {
    Development,
    Staging,
    Production,
}

impl SdkEnvironment {
    /// Default base URL for this environment.
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Development => "https://global-api-development.devotel.io",
            Self::Staging => "https://global-api-staging.devotel.io",
            Self::Production => "https://global-api.devotel.io",
        }
    }
}

impl std::fmt::Display for SdkEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Identity and routing configuration shared by every backend request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    pub environment: SdkEnvironment,
    /// Backend tenant this installation belongs to.
    pub tenant_id: String,
    /// Public (non-secret) SDK key identifying the integrating application.
    pub public_sdk_key: String,
    /// Application bundle / package identifier.
    pub bundle_id: String,
    /// Client platform label sent with every request (e.g. "ios", "android").
    pub platform: String,
    /// Overrides the environment's base URL when set.
    pub custom_base_url: Option<String>,
}

impl SdkConfig {
    pub fn new(
        environment: SdkEnvironment,
        tenant_id: impl Into<String>,
        public_sdk_key: impl Into<String>,
        bundle_id: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            tenant_id: tenant_id.into(),
            public_sdk_key: public_sdk_key.into(),
            bundle_id: bundle_id.into(),
            platform: platform.into(),
            custom_base_url: None,
        }
    }

    /// Effective base URL (custom override or environment default).
    pub fn base_url(&self) -> &str {
        self.custom_base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    /// Default identity headers attached to every request.
    pub fn default_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("X-SDK-Key", self.public_sdk_key.clone()),
            ("X-Tenant-ID", self.tenant_id.clone()),
            ("X-Platform", self.platform.clone()),
            ("X-Bundle-ID", self.bundle_id.clone()),
        ]
    }

    /// Check that every required field is present and the base URL is https.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ConfigError::MissingField("tenant_id"));
        }
        if self.public_sdk_key.trim().is_empty() {
            return Err(ConfigError::MissingField("public_sdk_key"));
        }
        if self.bundle_id.trim().is_empty() {
            return Err(ConfigError::MissingField("bundle_id"));
        }
        if self.platform.trim().is_empty() {
            return Err(ConfigError::MissingField("platform"));
        }
        if !self.base_url().starts_with("https://") {
            return Err(ConfigError::InvalidBaseUrl(self.base_url().to_string()));
        }
        Ok(())
    }
}
