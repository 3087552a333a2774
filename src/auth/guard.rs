//! Credential resolution policy for live-channel connections.

use std::sync::Arc;

use tracing::debug;

use crate::auth::store::CredentialStore;
use crate::channels::ChannelKey;

/// Decides which credential, if any, a connection attempt gets.
///
/// No cached credential means no connection at all: the endpoint is never
/// hammered with anonymous handshakes. Chat channels refresh before every
/// attempt, not just on expiry, so a session cannot start on a token that
/// dies mid-conversation; a failed refresh degrades to the cached token.
#[derive(Clone)]
pub struct LiveChannelAuthGuard {
    store: Arc<dyn CredentialStore>,
}

impl LiveChannelAuthGuard {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Credential for one connection attempt, or `None` to skip connecting.
    pub async fn resolve(&self, key: &ChannelKey) -> Option<String> {
        if key.is_chat() {
            if let Some(fresh) = self.store.refresh_access_token().await {
                return Some(fresh);
            }
            debug!(channel = %key, "refresh failed, using cached credential");
        }
        self.store.access_token().await
    }
}
