//! In-memory relay and summarizer doubles for pipeline tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use nostr_core::{EventStream, PublishReport, RelayError, RelayHandle};
use nostr_sdk::prelude::*;
use parking_lot::Mutex;
use sangyou_bot::channels::{MentionRouter, Publisher, ReplyResolver, ResolverSettings};
use sangyou_bot::providers::Summarizer;
use tokio::sync::mpsc;

pub const SUMMARY: &str = "・line1\n・line2\n・line3";
pub const RELAYS: [&str; 2] = ["wss://relay-a.example", "wss://relay-b.example"];

/// Relay double: a live feed driven through a channel, a store for lookups
/// and a log of everything published.
pub struct MockRelay {
    feed: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    stored: Mutex<HashMap<EventId, Vec<Event>>>,
    published: Mutex<Vec<Event>>,
    lookups: Mutex<Vec<Filter>>,
    subscriptions: Mutex<Vec<Filter>>,
}

impl MockRelay {
    /// Returns the relay and the sender that delivers events to its live feed.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let relay = Arc::new(Self {
            feed: Mutex::new(Some(rx)),
            stored: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
        });
        (relay, tx)
    }

    /// Make `event` answer lookups for its own id.
    pub fn store(&self, event: Event) {
        self.stored.lock().entry(event.id).or_default().push(event);
    }

    /// Make `candidates` answer lookups for `id`, in order.
    pub fn store_candidates(&self, id: EventId, candidates: Vec<Event>) {
        self.stored.lock().insert(id, candidates);
    }

    pub fn published(&self) -> Vec<Event> {
        self.published.lock().clone()
    }

    pub fn lookups(&self) -> Vec<Filter> {
        self.lookups.lock().clone()
    }

    pub fn subscriptions(&self) -> Vec<Filter> {
        self.subscriptions.lock().clone()
    }
}

#[async_trait]
impl RelayHandle for MockRelay {
    async fn subscribe(&self, filter: Filter) -> Result<EventStream, RelayError> {
        self.subscriptions.lock().push(filter);
        let rx = self
            .feed
            .lock()
            .take()
            .ok_or_else(|| RelayError::Subscribe("feed already taken".into()))?;

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }

    async fn lookup(&self, filter: Filter, _timeout: Duration) -> Result<EventStream, RelayError> {
        self.lookups.lock().push(filter.clone());
        let stored = self.stored.lock();
        let events: Vec<Event> = filter
            .ids
            .iter()
            .flatten()
            .flat_map(|id| stored.get(id).cloned().unwrap_or_default())
            .collect();
        Ok(stream::iter(events).boxed())
    }

    async fn publish(&self, event: &Event) -> Result<PublishReport, RelayError> {
        self.published.lock().push(event.clone());
        Ok(PublishReport {
            event_id: event.id,
            accepted: RELAYS.iter().map(|url| url.to_string()).collect(),
            rejected: vec![],
        })
    }
}

pub enum Behavior {
    Reply(String),
    Fail,
    Stall,
}

/// Summarizer double recording every input it is given.
pub struct FakeSummarizer {
    behavior: Behavior,
    inputs: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeSummarizer {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            inputs: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn replying(summary: &str) -> Arc<Self> {
        Self::new(Behavior::Reply(summary.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, text: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().push(text.to_string());
        match &self.behavior {
            Behavior::Reply(summary) => Ok(summary.clone()),
            Behavior::Fail => anyhow::bail!("upstream returned 500"),
            Behavior::Stall => std::future::pending().await,
        }
    }
}

pub fn trigger_phrases() -> Vec<String> {
    vec!["3行でまとめて".to_string(), "3行に要約して".to_string()]
}

pub fn settings() -> ResolverSettings {
    ResolverSettings {
        min_content_chars: 30,
        lookup_timeout: Duration::from_secs(1),
        summarize_timeout: Duration::from_millis(200),
    }
}

/// Wire a router over the doubles, signed by `bot`.
pub fn router(relay: Arc<MockRelay>, summarizer: Arc<FakeSummarizer>, bot: &Keys) -> MentionRouter {
    let resolver = ReplyResolver::new(relay.clone(), summarizer, settings());
    let publisher = Publisher::new(relay.clone(), bot.clone());
    MentionRouter::new(relay, resolver, publisher, trigger_phrases())
}

pub fn note(keys: &Keys, content: &str) -> Event {
    EventBuilder::new(Kind::TextNote, content)
        .sign_with_keys(keys)
        .unwrap()
}

/// A mention of `bot` replying to `post`.
pub fn mention(keys: &Keys, bot: &Keys, post: Option<EventId>, content: &str) -> Event {
    let mut builder = EventBuilder::new(Kind::TextNote, content);
    if let Some(post) = post {
        builder = builder.tag(Tag::event(post));
    }
    builder
        .tag(Tag::public_key(bot.public_key()))
        .sign_with_keys(keys)
        .unwrap()
}

/// Tags of `event` as plain string vectors.
pub fn tag_values(event: &Event) -> Vec<Vec<String>> {
    event.tags.iter().map(|tag| tag.as_slice().to_vec()).collect()
}
