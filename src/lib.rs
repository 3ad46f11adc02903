//! Attestkit - device attestation client SDK
//!
//! This crate lets a mobile client prove to a backend that API calls
//! originate from a genuine, unmodified installation on genuine hardware,
//! without sending long-term secrets over the wire. A hardware-backed key is
//! bound to a backend-issued identity once (registration), then each
//! sensitive call carries a single-use signed proof over a short-lived
//! server challenge and a caller-declared purpose (assertion).
//!
//! # Design
//!
//! - Secure hardware and secure storage are consumed through traits
//!   ([`HardwareKeyProvider`], [`KeyMaterialStore`]); the host supplies the
//!   platform implementations, tests supply deterministic doubles.
//! - Verification results are booleans: any failure collapses to "this call
//!   is unverified" (fail closed), never a crash of the host application.
//! - Registration is single-flight: concurrent callers share one in-flight
//!   registration instead of generating duplicate keys.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use attestkit::{
//!     InMemoryTokenStore, MemoryKeyStore, MockKeyProvider, Sdk, SdkConfig, SdkEnvironment,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SdkConfig::new(
//!     SdkEnvironment::Development,
//!     "tenant-1",
//!     "pk_abc123",
//!     "com.example.app",
//!     "ios",
//! );
//!
//! // In production the host passes its keychain-backed store and the
//! // platform secure-hardware provider instead of these test doubles.
//! let sdk = Sdk::new(
//!     config,
//!     Arc::new(MemoryKeyStore::new()),
//!     Arc::new(MockKeyProvider::default()),
//!     Arc::new(InMemoryTokenStore::new()),
//! )?;
//!
//! // Provision and register the device key (idempotent).
//! sdk.ensure_attestation_ready().await?;
//!
//! // Before a protected operation: prove device identity for this call.
//! if sdk.attestation().assert_for_call("send_message").await {
//!     // proceed with the protected call
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod attest;
pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod sdk;
pub mod store;

// Re-export main types for convenience
pub use api::{ApiClient, ApiEnvelope, LicenseStatus, LoginResponse};
pub use attest::{
    assertion_hash, registration_hash, AttestationService, Challenge, ChallengeApi,
    ChallengeProtocolClient, HardwareKeyProvider, MockKeyProvider, Readiness,
};
pub use auth::{AuthManager, InMemoryTokenStore, TokenStore};
pub use config::{SdkConfig, SdkEnvironment};
pub use error::{AttestError, ConfigError, ProtocolError, Result, SdkError};
pub use sdk::Sdk;
pub use store::{KeyMaterialStore, MemoryKeyStore};
