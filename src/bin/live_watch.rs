//! Follows the live update channel and logs every snapshot.
//!
//! Usage: `live-watch [target]`. The target defaults to the configured
//! channel path, resolved against `LIVE_ORIGIN`.

use batch_live::client::{ChannelEvent, LiveChannelClient, LocalView};
use batch_live::config::Config;
use batch_live::models::{BatchStatus, ServerMessage};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let loaded = Config::load();
    let log_level = loaded
        .as_ref()
        .map(|config| config.log_level.clone())
        .unwrap_or_else(|_| Config::default().log_level);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("live_watch={level},batch_live={level},info", level = log_level).into()
        }))
        .init();

    let config = loaded.unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    let target = std::env::args().nth(1).unwrap_or_else(|| config.ws_path.clone());
    let client = LiveChannelClient::websocket(config.live_origin.clone(), config.reconnect_options());
    let mut events = client.subscribe();

    if let Err(e) = client.connect(&target) {
        error!("Cannot open live channel: {}", e);
        std::process::exit(2);
    }

    let mut view = LocalView::new();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ChannelEvent::Open) => info!("Live channel open"),
                Ok(ChannelEvent::Message(message)) => {
                    if let ServerMessage::Welcome { message } = &message {
                        info!("Server says: {}", message);
                    }
                    if view.apply(&message) {
                        let completed = view
                            .batches()
                            .iter()
                            .filter(|batch| batch.status == BatchStatus::Completed)
                            .count();
                        info!(
                            "Snapshot with {} batches ({} completed)",
                            view.len(),
                            completed
                        );
                    }
                }
                Ok(ChannelEvent::Error(e)) => warn!("Live channel error: {}", e),
                Ok(ChannelEvent::Close) => info!("Live channel closed"),
                Ok(ChannelEvent::ReconnectExhausted { attempts }) => {
                    error!("Server unreachable after {} reconnect attempts, exiting", attempts);
                    std::process::exit(1);
                }
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} live channel events", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing live channel");
                client.close();
                break;
            }
        }
    }
}
