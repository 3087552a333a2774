//! Channel registry: one manager per channel identity, handed out by
//! reference instead of hiding behind module-level globals.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::auth::LiveChannelAuthGuard;
use crate::channels::key::ChannelKey;
use crate::channels::manager::{ChannelManager, Subscription};
use crate::config::Config;
use crate::error::{ClientError, ClientResult};

/// Owns every live channel in the process. Constructed once at startup and
/// shared; global channels live as long as the registry, chat channels are
/// dropped once their last subscriber leaves.
pub struct ChannelRegistry {
    ws_base: String,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    guard: LiveChannelAuthGuard,
    managers: RwLock<HashMap<ChannelKey, ChannelManager>>,
}

impl ChannelRegistry {
    pub fn new(config: &Config, guard: LiveChannelAuthGuard) -> Self {
        Self {
            ws_base: config.ws_base_url(),
            reconnect_delay: config.reconnect_delay,
            max_reconnect_attempts: config.max_reconnect_attempts,
            guard,
            managers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a channel, connecting it if needed. Fails with
    /// [`ClientError::AuthRequired`] when no credential is available: the
    /// endpoint is never contacted anonymously.
    pub async fn subscribe(&self, key: ChannelKey) -> ClientResult<Subscription> {
        let token = self
            .guard
            .resolve(&key)
            .await
            .ok_or(ClientError::AuthRequired)?;

        let manager = self.manager(key).await;
        let subscription = manager.subscribe();
        manager.connect(Some(token));
        Ok(subscription)
    }

    /// The manager for a key, created lazily. A retired manager (chat channel
    /// whose last subscriber left) is replaced by a fresh one.
    pub async fn manager(&self, key: ChannelKey) -> ChannelManager {
        {
            let managers = self.managers.read().await;
            if let Some(manager) = managers.get(&key) {
                if !manager.is_retired() {
                    return manager.clone();
                }
            }
        }

        let mut managers = self.managers.write().await;
        if let Some(manager) = managers.get(&key) {
            if !manager.is_retired() {
                return manager.clone();
            }
            debug!(channel = %key, "replacing retired channel");
        }
        let manager = ChannelManager::new(
            key,
            self.ws_base.clone(),
            self.reconnect_delay,
            self.max_reconnect_attempts,
        );
        managers.insert(key, manager.clone());
        manager
    }

    /// Disconnect everything and forget all managers. Logout path.
    pub async fn shutdown(&self) {
        let managers: Vec<ChannelManager> = {
            let mut map = self.managers.write().await;
            map.drain().map(|(_, manager)| manager).collect()
        };
        for manager in managers {
            manager.disconnect().await;
        }
    }
}
