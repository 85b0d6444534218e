//! Relay access for the reply loop.
//!
//! [`RelayHandle`] is the seam the pipeline talks to; [`RelayClient`] backs
//! it with a `nostr-sdk` relay pool keyed by relay URL. The pool serializes
//! access to each socket internally, so one client is shared by `Arc`
//! between the router, the resolver and the publisher.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use nostr_sdk::prelude::*;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Lazy sequence of events delivered by a subscription or lookup.
pub type EventStream = BoxStream<'static, Event>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("subscription rejected: {0}")]
    Subscribe(String),
    #[error("lookup failed: {0}")]
    Lookup(String),
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Per-relay outcome of publishing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub event_id: EventId,
    pub accepted: Vec<String>,
    /// `(relay, reason)` pairs.
    pub rejected: Vec<(String, String)>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        !self.accepted.is_empty()
    }
}

/// What the reply pipeline needs from the relay side.
#[async_trait]
pub trait RelayHandle: Send + Sync {
    /// Open a live subscription. The stream stays open until the relay
    /// connection shuts down.
    async fn subscribe(&self, filter: Filter) -> Result<EventStream, RelayError>;

    /// One-shot query against the listen relay; the stream ends once stored
    /// events are replayed or `timeout` elapses.
    async fn lookup(&self, filter: Filter, timeout: Duration) -> Result<EventStream, RelayError>;

    /// Send a signed event to every connected relay.
    async fn publish(&self, event: &Event) -> Result<PublishReport, RelayError>;
}

/// Relay pool wrapper owning the bot's connections.
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    keys: Keys,
    relays: Vec<String>,
    listen_relay: String,
}

impl RelayClient {
    /// Connect to each relay in turn.
    ///
    /// `listen_relay` carries the mention subscription, so failing to reach it
    /// is fatal. Any other unreachable relay is dropped from the pool and
    /// left out of publishing.
    pub async fn connect(
        keys: Keys,
        relay_urls: &[String],
        listen_relay: &str,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = Client::new(keys.clone());
        let mut connected = Vec::with_capacity(relay_urls.len());

        for url in relay_urls {
            client
                .add_relay(url.as_str())
                .await
                .map_err(|e| RelayError::Connect {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

            match client.try_connect_relay(url.as_str(), timeout).await {
                Ok(()) => {
                    info!("Connected to relay {}", url);
                    connected.push(url.clone());
                }
                Err(e) if url == listen_relay => {
                    return Err(RelayError::Connect {
                        url: url.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Relay {} unreachable, excluding it from publishing: {}", url, e);
                    if let Err(e) = client.remove_relay(url.as_str()).await {
                        debug!("Failed to remove relay {}: {}", url, e);
                    }
                }
            }
        }

        info!(
            "Relay client connected to {} of {} relay(s)",
            connected.len(),
            relay_urls.len()
        );

        Ok(Self {
            client,
            keys,
            relays: connected,
            listen_relay: listen_relay.to_string(),
        })
    }

    /// Get the underlying nostr-sdk Client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// Relays that accepted a connection, in configuration order.
    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    pub fn listen_relay(&self) -> &str {
        &self.listen_relay
    }

    /// Close every subscription and socket.
    pub async fn shutdown(&self) {
        info!("Disconnecting from {} relay(s)", self.relays.len());
        self.client.disconnect().await;
    }
}

#[async_trait]
impl RelayHandle for RelayClient {
    async fn subscribe(&self, filter: Filter) -> Result<EventStream, RelayError> {
        // Listen before sending REQ so the backlog event is not missed.
        let notifications = self.client.notifications();
        let output = self
            .client
            .subscribe_to([self.listen_relay.as_str()], filter, None)
            .await
            .map_err(|e| RelayError::Subscribe(e.to_string()))?;

        info!("Subscribed {} on {}", output.val, self.listen_relay);
        Ok(subscription_events(notifications, output.val))
    }

    async fn lookup(&self, filter: Filter, timeout: Duration) -> Result<EventStream, RelayError> {
        // Bounded by `timeout`; whatever arrived before it elapses is kept.
        let events = self
            .client
            .fetch_events_from([self.listen_relay.as_str()], filter, timeout)
            .await
            .map_err(|e| RelayError::Lookup(e.to_string()))?;

        let events: Vec<Event> = events.into_iter().collect();
        debug!("Lookup returned {} event(s)", events.len());
        Ok(stream::iter(events).boxed())
    }

    async fn publish(&self, event: &Event) -> Result<PublishReport, RelayError> {
        let output = self
            .client
            .send_event(event)
            .await
            .map_err(|e| RelayError::Publish(e.to_string()))?;

        let mut accepted: Vec<String> = output.success.iter().map(|url| url.to_string()).collect();
        let mut rejected: Vec<(String, String)> = output
            .failed
            .iter()
            .map(|(url, reason)| (url.to_string(), reason.to_string()))
            .collect();
        accepted.sort();
        rejected.sort();

        Ok(PublishReport {
            event_id: output.val,
            accepted,
            rejected,
        })
    }
}

/// Events of one subscription, picked out of the pool's notification feed.
fn subscription_events(
    notifications: broadcast::Receiver<RelayPoolNotification>,
    sub_id: SubscriptionId,
) -> EventStream {
    stream::unfold((notifications, sub_id), |(mut rx, sub_id)| async move {
        loop {
            match rx.recv().await {
                Ok(RelayPoolNotification::Event {
                    subscription_id,
                    event,
                    ..
                }) => {
                    if subscription_id == sub_id {
                        return Some((*event, (rx, sub_id)));
                    }
                }
                Ok(RelayPoolNotification::Message {
                    relay_url,
                    message:
                        RelayMessage::Closed {
                            subscription_id,
                            message,
                        },
                }) if *subscription_id == sub_id => {
                    warn!(
                        "Relay {} closed subscription {}: {}",
                        relay_url, sub_id, message
                    );
                    return None;
                }
                Ok(RelayPoolNotification::Shutdown) => {
                    info!("Relay pool shut down, closing subscription {}", sub_id);
                    return None;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscription {} lagged, {} notification(s) dropped", sub_id, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
