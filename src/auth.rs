//! Session token management.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::api::{ApiClient, LoginResponse};
use crate::error::ProtocolError;

/// Storage for the session's access and refresh tokens.
///
/// The default [`InMemoryTokenStore`] keeps tokens for the process lifetime;
/// hosts wanting persistence across launches supply their own
/// implementation.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn set_access_token(&self, token: Option<String>);
    fn set_refresh_token(&self, token: Option<String>);
}

#[derive(Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Process-lifetime token store.
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<Tokens>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.tokens.lock().ok().and_then(|t| t.access.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens.lock().ok().and_then(|t| t.refresh.clone())
    }

    fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.access = token;
        }
    }

    fn set_refresh_token(&self, token: Option<String>) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.refresh = token;
        }
    }
}

/// Logs users in and keeps the access token fresh.
pub struct AuthManager {
    api: Arc<ApiClient>,
    tokens: Arc<dyn TokenStore>,
}

impl AuthManager {
    pub fn new(api: Arc<ApiClient>, tokens: Arc<dyn TokenStore>) -> Self {
        Self { api, tokens }
    }

    /// Authenticate and store the issued tokens.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ProtocolError> {
        let response = self.api.login(email, password).await?;
        self.tokens
            .set_access_token(Some(response.access_token.clone()));
        self.tokens.set_refresh_token(response.refresh_token.clone());
        Ok(response)
    }

    /// Refresh the access token. No-op when no refresh token is held.
    pub async fn refresh(&self) -> Result<(), ProtocolError> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            debug!("no refresh token held; skipping refresh");
            return Ok(());
        };
        let access_token = self.api.refresh(&refresh_token).await?;
        self.tokens.set_access_token(Some(access_token));
        Ok(())
    }

    /// Current access token, if a session is active.
    pub fn access_token(&self) -> Option<String> {
        self.tokens.access_token()
    }
}
