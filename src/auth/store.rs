//! Bearer credential storage and refresh.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Source of the bearer credential used by the live channels and REST calls.
/// Token issuance itself is an external collaborator; this side only caches
/// and refreshes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Currently cached access token, if any.
    async fn access_token(&self) -> Option<String>;

    /// Exchange the refresh token for a new access token and cache it.
    /// Returns `None` when no refresh is possible; the cached token is left
    /// untouched so callers can degrade to it.
    async fn refresh_access_token(&self) -> Option<String>;
}

/// In-memory store for tests and for processes handed a token at startup.
/// Refresh re-issues the cached token unchanged.
pub struct MemoryCredentialStore {
    access: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new(access: Option<String>) -> Self {
        Self {
            access: RwLock::new(access),
        }
    }

    pub async fn set(&self, access: Option<String>) {
        *self.access.write().await = access;
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn access_token(&self) -> Option<String> {
        self.access.read().await.clone()
    }

    async fn refresh_access_token(&self) -> Option<String> {
        self.access.read().await.clone()
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Store backed by the credential service's refresh endpoint.
pub struct RestCredentialStore {
    http: reqwest::Client,
    refresh_url: String,
    access: RwLock<Option<String>>,
    refresh: RwLock<Option<String>>,
}

impl RestCredentialStore {
    pub fn new(api_base_url: &str, access: Option<String>, refresh: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            refresh_url: format!(
                "{}/api/users/login/refresh/",
                api_base_url.trim_end_matches('/')
            ),
            access: RwLock::new(access),
            refresh: RwLock::new(refresh),
        }
    }

    pub async fn set_tokens(&self, access: Option<String>, refresh: Option<String>) {
        *self.access.write().await = access;
        *self.refresh.write().await = refresh;
    }
}

#[async_trait]
impl CredentialStore for RestCredentialStore {
    async fn access_token(&self) -> Option<String> {
        self.access.read().await.clone()
    }

    async fn refresh_access_token(&self) -> Option<String> {
        let refresh = self.refresh.read().await.clone()?;

        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<RefreshResponse>().await {
                Ok(body) => {
                    debug!("access token refreshed");
                    *self.access.write().await = Some(body.access.clone());
                    Some(body.access)
                }
                Err(e) => {
                    warn!(error = %e, "refresh response unreadable");
                    None
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "token refresh rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                None
            }
        }
    }
}
