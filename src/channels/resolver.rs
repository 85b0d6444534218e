use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use nostr_core::{content_chars, is_summarizable, referenced_post_filter, RelayError, RelayHandle};
use nostr_sdk::EventId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::providers::Summarizer;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("lookup of {id} failed: {source}")]
    Lookup {
        id: EventId,
        #[source]
        source: RelayError,
    },
    #[error("no post {0} long enough to summarize")]
    NoEligiblePost(EventId),
    #[error("summarization failed: {0:#}")]
    Summarize(anyhow::Error),
    #[error("summarization timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    pub min_content_chars: usize,
    pub lookup_timeout: Duration,
    pub summarize_timeout: Duration,
}

/// A summary ready to be wrapped into a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSummary {
    pub post_id: EventId,
    pub summary: String,
}

/// Fetches the post a mention refers to and summarizes it.
#[derive(Clone)]
pub struct ReplyResolver {
    relay: Arc<dyn RelayHandle>,
    summarizer: Arc<dyn Summarizer>,
    settings: ResolverSettings,
}

impl ReplyResolver {
    pub fn new(
        relay: Arc<dyn RelayHandle>,
        summarizer: Arc<dyn Summarizer>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            relay,
            summarizer,
            settings,
        }
    }

    /// Look up `referenced_id` and summarize the first candidate long enough.
    ///
    /// Short candidates are logged and skipped; the lookup keeps draining
    /// until it ends. The summarizer runs at most once per call.
    pub async fn resolve(
        &self,
        referenced_id: EventId,
        cancel: &CancellationToken,
    ) -> Result<ResolvedSummary, ResolveError> {
        let filter = referenced_post_filter(referenced_id);
        let lookup = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            lookup = self.relay.lookup(filter, self.settings.lookup_timeout) => lookup,
        };
        let mut candidates = lookup.map_err(|source| ResolveError::Lookup {
            id: referenced_id,
            source,
        })?;

        loop {
            let candidate = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                next = candidates.next() => next,
            };
            let Some(post) = candidate else {
                break;
            };

            if !is_summarizable(&post, self.settings.min_content_chars) {
                info!(
                    "content is small: {} has {} chars (minimum {})",
                    post.id,
                    content_chars(&post.content),
                    self.settings.min_content_chars
                );
                continue;
            }

            debug!("Summarizing {} ({} chars)", post.id, content_chars(&post.content));
            let summary = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                result = tokio::time::timeout(
                    self.settings.summarize_timeout,
                    self.summarizer.summarize(&post.content),
                ) => result,
            };

            return match summary {
                Ok(Ok(summary)) => Ok(ResolvedSummary {
                    post_id: post.id,
                    summary,
                }),
                Ok(Err(e)) => {
                    warn!("Summarization of {} failed: {e:#}", post.id);
                    Err(ResolveError::Summarize(e))
                }
                Err(_) => {
                    warn!(
                        "Summarization of {} timed out after {:?}",
                        post.id, self.settings.summarize_timeout
                    );
                    Err(ResolveError::Timeout(self.settings.summarize_timeout))
                }
            };
        }

        Err(ResolveError::NoEligiblePost(referenced_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::stream;
    use nostr_core::{EventStream, PublishReport};
    use nostr_sdk::{Event, EventBuilder, Filter, Keys, Kind};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StoredPosts(Vec<Event>);

    #[async_trait]
    impl RelayHandle for StoredPosts {
        async fn subscribe(&self, _filter: Filter) -> Result<EventStream, RelayError> {
            Err(RelayError::Subscribe("unused".into()))
        }

        async fn lookup(&self, _filter: Filter, _timeout: Duration) -> Result<EventStream, RelayError> {
            Ok(stream::iter(self.0.clone()).boxed())
        }

        async fn publish(&self, _event: &Event) -> Result<PublishReport, RelayError> {
            Err(RelayError::Publish("unused".into()))
        }
    }

    #[derive(Default)]
    struct Recording {
        inputs: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for Recording {
        async fn summarize(&self, text: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.lock().push(text.to_string());
            Ok("・line1\n・line2\n・line3".into())
        }
    }

    struct Stalled;

    #[async_trait]
    impl Summarizer for Stalled {
        async fn summarize(&self, _text: &str) -> anyhow::Result<String> {
            std::future::pending().await
        }
    }

    fn settings() -> ResolverSettings {
        ResolverSettings {
            min_content_chars: 30,
            lookup_timeout: Duration::from_secs(1),
            summarize_timeout: Duration::from_millis(50),
        }
    }

    fn post(content: &str) -> Event {
        EventBuilder::new(Kind::TextNote, content)
            .sign_with_keys(&Keys::generate())
            .unwrap()
    }

    #[tokio::test]
    async fn skips_short_candidates_and_keeps_consuming() {
        let short = post("短い");
        let long = post("Rust の所有権モデルはメモリ安全性をコンパイル時に保証するための仕組みです");
        let summarizer = Arc::new(Recording::default());
        let resolver = ReplyResolver::new(
            Arc::new(StoredPosts(vec![short, long.clone()])),
            summarizer.clone(),
            settings(),
        );

        let resolved = resolver
            .resolve(long.id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolved.post_id, long.id);
        assert_eq!(resolved.summary, "・line1\n・line2\n・line3");
        assert_eq!(*summarizer.inputs.lock(), vec![long.content.clone()]);
    }

    #[tokio::test]
    async fn only_short_candidates_never_reach_summarizer() {
        let short = post("0123456789");
        let summarizer = Arc::new(Recording::default());
        let resolver = ReplyResolver::new(
            Arc::new(StoredPosts(vec![short.clone()])),
            summarizer.clone(),
            settings(),
        );

        let err = resolver
            .resolve(short.id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::NoEligiblePost(id) if id == short.id));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn multibyte_content_is_measured_in_chars() {
        // 29 kana is 87 bytes but still below the threshold.
        let short = post(&"あ".repeat(29));
        let summarizer = Arc::new(Recording::default());
        let resolver = ReplyResolver::new(
            Arc::new(StoredPosts(vec![short.clone()])),
            summarizer.clone(),
            settings(),
        );

        assert!(resolver.resolve(short.id, &CancellationToken::new()).await.is_err());
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stalled_summarizer_times_out() {
        let long = post(&"x".repeat(45));
        let resolver = ReplyResolver::new(
            Arc::new(StoredPosts(vec![long.clone()])),
            Arc::new(Stalled),
            settings(),
        );

        let err = resolver
            .resolve(long.id, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancellation_interrupts_summarization() {
        let long = post(&"x".repeat(45));
        let resolver = ReplyResolver::new(
            Arc::new(StoredPosts(vec![long.clone()])),
            Arc::new(Stalled),
            ResolverSettings {
                summarize_timeout: Duration::from_secs(3600),
                ..settings()
            },
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver.resolve(long.id, &cancel).await.unwrap_err();
        assert!(matches!(err, ResolveError::Cancelled));
    }
}
