//! Mention gating for the reply loop.
//!
//! A relay answers a fresh `REQ` with its stored backlog before any live
//! traffic, so the first event on the mention subscription is an old post.
//! [`MentionGate`] drops that event, then admits mentions that carry a
//! trigger phrase and reference the post being replied to.

use futures_util::future;
use futures_util::stream::{Stream, StreamExt};
use nostr_sdk::{Event, EventId, Filter, Kind, PublicKey};
use tracing::{debug, info, warn};

/// Phrases that arm a summary reply when no others are configured.
pub const DEFAULT_TRIGGER_PHRASES: [&str; 2] = ["3行でまとめて", "3行に要約して"];

/// Per-mention working state handed from the router to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyContext {
    /// Author of the mention; tagged `p` in the reply.
    pub author: PublicKey,
    /// The mention itself; tagged `e` in the reply.
    pub mention_id: EventId,
    /// First `e` tag of the mention: the post to summarize.
    pub referenced_id: EventId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nothing received yet; the next event is the backlog snapshot.
    AwaitingBacklog,
    Live,
}

/// Outcome of running one event through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionVerdict {
    Backlog,
    OwnEvent,
    MissingTrigger,
    MissingReference,
    Qualified(ReplyContext),
}

impl MentionVerdict {
    pub fn into_context(self) -> Option<ReplyContext> {
        match self {
            Self::Qualified(ctx) => Some(ctx),
            _ => None,
        }
    }
}

/// Stateful filter over the primary mention subscription.
#[derive(Debug, Clone)]
pub struct MentionGate {
    state: GateState,
    own_pubkey: PublicKey,
    trigger_phrases: Vec<String>,
}

impl MentionGate {
    pub fn new(own_pubkey: PublicKey, trigger_phrases: Vec<String>) -> Self {
        Self {
            state: GateState::AwaitingBacklog,
            own_pubkey,
            trigger_phrases,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Classify the next event delivered on the subscription.
    ///
    /// The first call always returns [`MentionVerdict::Backlog`], whatever the
    /// event contains.
    pub fn inspect(&mut self, event: &Event) -> MentionVerdict {
        if self.state == GateState::AwaitingBacklog {
            self.state = GateState::Live;
            return MentionVerdict::Backlog;
        }

        if event.pubkey == self.own_pubkey {
            return MentionVerdict::OwnEvent;
        }

        if !contains_trigger(&event.content, &self.trigger_phrases) {
            return MentionVerdict::MissingTrigger;
        }

        match first_referenced_event(event) {
            Some(referenced_id) => MentionVerdict::Qualified(ReplyContext {
                author: event.pubkey,
                mention_id: event.id,
                referenced_id,
            }),
            None => MentionVerdict::MissingReference,
        }
    }
}

/// Check whether `content` contains any of the trigger phrases.
pub fn contains_trigger(content: &str, phrases: &[String]) -> bool {
    phrases
        .iter()
        .any(|phrase| !phrase.is_empty() && content.contains(phrase.as_str()))
}

/// Id carried by the first `e` tag of an event, if it parses.
pub fn first_referenced_event(event: &Event) -> Option<EventId> {
    let tag = event
        .tags
        .iter()
        .find(|tag| tag.as_slice().first().map(|s| s.as_str()) == Some("e"))?;
    tag.as_slice()
        .get(1)
        .and_then(|hex| EventId::from_hex(hex).ok())
}

/// Filter for text notes tagging `pubkey`, as opened by the router.
pub fn mention_filter(pubkey: PublicKey) -> Filter {
    Filter::new().kind(Kind::TextNote).pubkey(pubkey).limit(1)
}

/// Run every event of `events` through `gate`, logging each verdict.
pub fn mention_verdicts<S>(events: S, mut gate: MentionGate) -> impl Stream<Item = MentionVerdict>
where
    S: Stream<Item = Event>,
{
    events.map(move |event| {
        let verdict = gate.inspect(&event);
        log_verdict(&event, &verdict);
        verdict
    })
}

/// Lazy sequence of mentions that should be answered.
pub fn qualifying_mentions<S>(events: S, gate: MentionGate) -> impl Stream<Item = ReplyContext>
where
    S: Stream<Item = Event>,
{
    mention_verdicts(events, gate).filter_map(|verdict| future::ready(verdict.into_context()))
}

fn log_verdict(event: &Event, verdict: &MentionVerdict) {
    match verdict {
        MentionVerdict::Backlog => {
            info!("skipped: first request event {}", event.id);
        }
        MentionVerdict::OwnEvent => {
            debug!("skipped: own event {}", event.id);
        }
        MentionVerdict::MissingTrigger => {
            info!("skipped: mention {} does not contain a command", event.id);
        }
        MentionVerdict::MissingReference => {
            warn!("event not found: mention {} has no e tag", event.id);
        }
        MentionVerdict::Qualified(ctx) => {
            info!(
                "mention {} from {} references {}",
                ctx.mention_id, ctx.author, ctx.referenced_id
            );
        }
    }
}
