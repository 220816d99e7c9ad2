//! Reconnecting client for the live update channel.
//!
//! One supervisor task owns the transport of the current channel. Every call
//! to [`LiveChannelClient::connect`] that opens a new channel starts a new
//! generation; state changes and events from older generations are discarded
//! so a torn-down channel can never publish after its replacement.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::connector::{Connector, LiveTransport, WsConnector};
use super::target::resolve_channel_url;
use super::ClientError;
use crate::models::ServerMessage;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Events observable by application code
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Open,
    Message(ServerMessage),
    Close,
    Error(String),
    /// The retry budget ran out; no further attempts until `connect` is called again
    ReconnectExhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct ReconnectOptions {
    pub enabled: bool,
    /// Fixed delay before each reconnect attempt
    pub interval: Duration,
    /// Consecutive failed reconnects tolerated before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

struct Shared {
    generation: Mutex<u64>,
    attempts: AtomicU32,
    state: watch::Sender<ReadyState>,
    events: broadcast::Sender<ChannelEvent>,
}

impl Shared {
    fn current(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new generation and return its number
    fn advance(&self) -> u64 {
        let mut current = self.current();
        *current += 1;
        self.attempts.store(0, Ordering::Release);
        self.state.send_replace(ReadyState::Connecting);
        *current
    }

    /// End the current generation without starting another. `Close` is only
    /// emitted for a channel that existed and was not already closed.
    fn retire(&self, had_channel: bool) {
        let mut current = self.current();
        *current += 1;
        let previous = self.state.send_replace(ReadyState::Closing);
        self.state.send_replace(ReadyState::Closed);
        if had_channel && previous != ReadyState::Closed {
            let _ = self.events.send(ChannelEvent::Close);
        }
    }

    fn set_state(&self, generation: u64, state: ReadyState) {
        let current = self.current();
        if *current == generation {
            self.state.send_replace(state);
        }
    }

    fn set_attempts(&self, generation: u64, attempts: u32) {
        let current = self.current();
        if *current == generation {
            self.attempts.store(attempts, Ordering::Release);
        }
    }

    fn emit(&self, generation: u64, event: ChannelEvent) {
        let current = self.current();
        if *current == generation {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

struct ActiveChannel {
    url: String,
    outbound: mpsc::UnboundedSender<String>,
    supervisor: JoinHandle<()>,
}

/// Client side of the live update channel
pub struct LiveChannelClient<C: Connector> {
    connector: Arc<C>,
    page_origin: String,
    options: ReconnectOptions,
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveChannel>>,
}

impl LiveChannelClient<WsConnector> {
    /// Client using real WebSocket connections
    pub fn websocket(page_origin: impl Into<String>, options: ReconnectOptions) -> Self {
        Self::new(Arc::new(WsConnector), page_origin, options)
    }
}

impl<C: Connector> LiveChannelClient<C> {
    /// `page_origin` is the `http(s)://host` bare channel paths are resolved against
    pub fn new(connector: Arc<C>, page_origin: impl Into<String>, options: ReconnectOptions) -> Self {
        let (state, _) = watch::channel(ReadyState::Connecting);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connector,
            page_origin: page_origin.into(),
            options,
            shared: Arc::new(Shared {
                generation: Mutex::new(0),
                attempts: AtomicU32::new(0),
                state,
                events,
            }),
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveChannel>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the channel to `target`.
    ///
    /// A no-op when a channel to the same URL is already open. Otherwise any
    /// previous channel is torn down first, its reconnect timer included, and
    /// the retry budget starts over.
    pub fn connect(&self, target: &str) -> Result<(), ClientError> {
        let url = resolve_channel_url(target, &self.page_origin)?;
        let mut active = self.active();

        if let Some(channel) = active.as_ref() {
            if channel.url == url && self.ready_state() == ReadyState::Open {
                debug!("Live channel to {} already open, reusing it", url);
                return Ok(());
            }
        }

        if let Some(previous) = active.take() {
            debug!("Tearing down previous live channel to {}", previous.url);
            previous.supervisor.abort();
        }

        let generation = self.shared.advance();
        let (outbound, queue) = mpsc::unbounded_channel();
        let supervisor = tokio::spawn(supervise(
            Arc::clone(&self.connector),
            url.clone(),
            self.options.clone(),
            Arc::clone(&self.shared),
            generation,
            queue,
        ));

        info!("Opening live channel to {}", url);
        *active = Some(ActiveChannel {
            url,
            outbound,
            supervisor,
        });
        Ok(())
    }

    /// Queue a text frame. Returns `false` when no channel is open.
    pub fn send(&self, payload: impl Into<String>) -> bool {
        if self.ready_state() != ReadyState::Open {
            return false;
        }
        match self.active().as_ref() {
            Some(channel) => channel.outbound.send(payload.into()).is_ok(),
            None => false,
        }
    }

    /// Close the channel and cancel any scheduled reconnect
    pub fn close(&self) {
        let previous = self.active().take();
        let had_channel = previous.is_some();
        if let Some(previous) = previous {
            info!("Closing live channel to {}", previous.url);
            previous.supervisor.abort();
        }
        self.shared.retire(had_channel);
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ReadyState> {
        self.shared.state.subscribe()
    }

    /// Subscribe to channel events. Subscribe before `connect` to observe the first `Open`.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.shared.events.subscribe()
    }

    /// Consecutive reconnect attempts since the last successful open
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::Acquire)
    }

    /// Resolved URL of the current channel, if any
    pub fn url(&self) -> Option<String> {
        self.active().as_ref().map(|channel| channel.url.clone())
    }
}

impl<C: Connector> Drop for LiveChannelClient<C> {
    fn drop(&mut self) {
        if let Some(previous) = self.active().take() {
            previous.supervisor.abort();
        }
    }
}

async fn supervise<C: Connector>(
    connector: Arc<C>,
    url: String,
    options: ReconnectOptions,
    shared: Arc<Shared>,
    generation: u64,
    mut queue: mpsc::UnboundedReceiver<String>,
) {
    let mut attempts: u32 = 0;
    loop {
        shared.set_state(generation, ReadyState::Connecting);

        match connector.connect(&url).await {
            Ok(transport) => {
                attempts = 0;
                shared.set_attempts(generation, 0);
                info!("Live channel connected to {}", url);
                shared.set_state(generation, ReadyState::Open);
                shared.emit(generation, ChannelEvent::Open);
                run_session(transport, &shared, generation, &mut queue).await;
            }
            Err(e) => {
                error!("Live channel connection to {} failed: {}", url, e);
                shared.emit(generation, ChannelEvent::Error(e.to_string()));
            }
        }

        shared.set_state(generation, ReadyState::Closed);
        shared.emit(generation, ChannelEvent::Close);

        if !options.enabled {
            debug!("Reconnect disabled, live channel to {} stays closed", url);
            return;
        }
        if attempts >= options.max_attempts {
            warn!(
                "Giving up on live channel to {} after {} reconnect attempts",
                url, attempts
            );
            shared.emit(generation, ChannelEvent::ReconnectExhausted { attempts });
            return;
        }

        attempts += 1;
        shared.set_attempts(generation, attempts);
        info!(
            "Attempting to reconnect live channel in {:?} ({}/{})",
            options.interval, attempts, options.max_attempts
        );
        tokio::time::sleep(options.interval).await;
    }
}

/// Pump one open transport until either side closes it
async fn run_session(
    transport: LiveTransport,
    shared: &Shared,
    generation: u64,
    queue: &mut mpsc::UnboundedReceiver<String>,
) {
    let LiveTransport {
        mut incoming,
        mut outgoing,
    } = transport;

    // Frames queued for a previous session are stale
    while queue.try_recv().is_ok() {}

    loop {
        tokio::select! {
            frame = incoming.next() => match frame {
                Some(Ok(text)) => match ServerMessage::from_frame(&text) {
                    Ok(message) => shared.emit(generation, ChannelEvent::Message(message)),
                    Err(e) => {
                        warn!("Skipping malformed live message: {}", e);
                        shared.emit(generation, ChannelEvent::Error(e.to_string()));
                    }
                },
                Some(Err(e)) => {
                    error!("Live channel read failed: {}", e);
                    shared.emit(generation, ChannelEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    debug!("Live channel closed by server");
                    break;
                }
            },
            Some(payload) = queue.recv() => {
                if let Err(e) = outgoing.send(payload).await {
                    error!("Live channel write failed: {}", e);
                    shared.emit(generation, ChannelEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    }

    shared.set_state(generation, ReadyState::Closing);
    if let Err(e) = outgoing.close().await {
        debug!("Ignoring error while closing live channel: {}", e);
    }
}
