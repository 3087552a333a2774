//! Entry point: a live-channel monitor. Connects to the bookings and matches
//! channels and logs every push event until Ctrl-C. Doubles as the wiring
//! example for library consumers.

use std::sync::Arc;

use courtsync::auth::{CredentialStore, LiveChannelAuthGuard, RestCredentialStore};
use courtsync::channels::{ChannelKey, ChannelRegistry};
use courtsync::config::Config;
use courtsync::models::event::PushEvent;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn CredentialStore> = Arc::new(RestCredentialStore::new(
        &config.api_base_url,
        std::env::var("ACCESS_TOKEN").ok(),
        std::env::var("REFRESH_TOKEN").ok(),
    ));
    let guard = LiveChannelAuthGuard::new(store);
    let registry = Arc::new(ChannelRegistry::new(&config, guard));

    let mut bookings = registry.subscribe(ChannelKey::Bookings).await?;
    let mut matches = registry.subscribe(ChannelKey::Matches).await?;
    tracing::info!(api = %config.api_base_url, "watching bookings and matches");

    let log_event = |channel: &str, event: &PushEvent| {
        tracing::info!(channel, kind = event.kind(), "push event");
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = bookings.recv() => match event {
                Some(event) => log_event("bookings", &event),
                None => break,
            },
            event = matches.recv() => match event {
                Some(event) => log_event("matches", &event),
                None => break,
            },
        }
    }

    tracing::info!("shutting down");
    registry.shutdown().await;
    Ok(())
}
