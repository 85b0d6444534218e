use std::pin::pin;
use std::sync::Arc;

use futures_util::StreamExt;
use nostr_core::{
    build_reply, mention_filter, mention_verdicts, MentionGate, MentionVerdict, RelayError,
    RelayHandle, ReplyContext,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::publisher::Publisher;
use super::resolver::{ReplyResolver, ResolveError};

/// Counters for one run of the mention loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub received: usize,
    pub skipped: usize,
    pub replied: usize,
    pub failed: usize,
}

impl LoopSummary {
    fn record(&mut self, verdict: &MentionVerdict) {
        self.received += 1;
        if !matches!(verdict, MentionVerdict::Qualified(_)) {
            self.skipped += 1;
        }
    }
}

/// Drives the mention subscription: gate, resolve, reply.
pub struct MentionRouter {
    relay: Arc<dyn RelayHandle>,
    resolver: ReplyResolver,
    publisher: Publisher,
    trigger_phrases: Vec<String>,
}

impl MentionRouter {
    pub fn new(
        relay: Arc<dyn RelayHandle>,
        resolver: ReplyResolver,
        publisher: Publisher,
        trigger_phrases: Vec<String>,
    ) -> Self {
        Self {
            relay,
            resolver,
            publisher,
            trigger_phrases,
        }
    }

    /// Subscribe to mentions of the bot and answer each qualifying one in
    /// delivery order until `cancel` fires or the subscription ends.
    ///
    /// Only the initial subscription can fail; per-mention errors are logged
    /// and the loop moves on.
    pub async fn run(&self, cancel: CancellationToken) -> Result<LoopSummary, RelayError> {
        let own_pubkey = self.publisher.author();
        let events = self.relay.subscribe(mention_filter(own_pubkey)).await?;
        let gate = MentionGate::new(own_pubkey, self.trigger_phrases.clone());
        let mut verdicts = pin!(mention_verdicts(events, gate));
        let mut summary = LoopSummary::default();

        info!("Listening for mentions of {}", own_pubkey);

        loop {
            let verdict = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Mention loop cancelled");
                    break;
                }
                next = verdicts.next() => next,
            };
            let Some(verdict) = verdict else {
                warn!("Mention subscription ended");
                break;
            };

            summary.record(&verdict);
            let Some(ctx) = verdict.into_context() else {
                continue;
            };

            if self.answer(&ctx, &cancel).await {
                summary.replied += 1;
            } else if cancel.is_cancelled() {
                break;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            "Mention loop stopped: {} received, {} skipped, {} replied, {} failed",
            summary.received, summary.skipped, summary.replied, summary.failed
        );
        Ok(summary)
    }

    /// Resolve and publish the reply to one mention. Returns whether a reply
    /// went out.
    async fn answer(&self, ctx: &ReplyContext, cancel: &CancellationToken) -> bool {
        let resolved = match self.resolver.resolve(ctx.referenced_id, cancel).await {
            Ok(resolved) => resolved,
            Err(ResolveError::Cancelled) => return false,
            Err(e) => {
                warn!("Abandoning mention {}: {}", ctx.mention_id, e);
                return false;
            }
        };

        let reply = build_reply(
            self.publisher.author(),
            resolved.post_id,
            ctx,
            &resolved.summary,
        );
        match self.publisher.publish(reply).await {
            Ok(report) => {
                info!(
                    "Replied to {} with summary of {} ({})",
                    ctx.mention_id, resolved.post_id, report.event_id
                );
                true
            }
            Err(e) => {
                warn!("Failed to publish reply to {}: {}", ctx.mention_id, e);
                false
            }
        }
    }
}
