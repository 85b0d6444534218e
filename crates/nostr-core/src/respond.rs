//! Reply and profile event construction.

use nostr_sdk::{Event, EventBuilder, EventId, Filter, Kind, PublicKey, Tag, UnsignedEvent};
use serde::{Deserialize, Serialize};

use crate::mention::ReplyContext;

/// Posts shorter than this (in characters) are not worth summarizing.
pub const DEFAULT_MIN_CONTENT_CHARS: usize = 30;

/// Filter for the post a mention refers to: exactly one id, notes or articles.
pub fn referenced_post_filter(id: EventId) -> Filter {
    Filter::new()
        .id(id)
        .kinds([Kind::TextNote, Kind::LongFormTextNote])
        .limit(1)
}

/// Length of `content` in Unicode scalar values.
pub fn content_chars(content: &str) -> usize {
    content.chars().count()
}

/// Whether a candidate post is long enough to summarize.
pub fn is_summarizable(event: &Event, min_chars: usize) -> bool {
    content_chars(&event.content) >= min_chars
}

/// Tags for a summary reply, in the order clients read them positionally:
/// the summarized post, the mention, then the mention's author.
pub fn reply_tags(post_id: EventId, ctx: &ReplyContext) -> Vec<Tag> {
    vec![
        Tag::event(post_id),
        Tag::event(ctx.mention_id),
        Tag::public_key(ctx.author),
    ]
}

/// Unsigned kind-1 reply carrying `summary` verbatim.
///
/// `author` must be the key the reply will be signed with; the signer
/// rejects anything else.
pub fn build_reply(
    author: PublicKey,
    post_id: EventId,
    ctx: &ReplyContext,
    summary: &str,
) -> UnsignedEvent {
    EventBuilder::new(Kind::TextNote, summary)
        .tags(reply_tags(post_id, ctx))
        .build(author)
}

/// Profile descriptor published as kind-0 content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileMetadata {
    pub name: String,
    pub about: String,
    pub picture: String,
}

impl Default for ProfileMetadata {
    fn default() -> Self {
        Self {
            name: "sangyou-bot".to_string(),
            about: "要約してほしい投稿に「3行で要約して」とこのbotにリプライを送ると、3行に要約します"
                .to_string(),
            picture: String::new(),
        }
    }
}

impl ProfileMetadata {
    pub fn to_content(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Unsigned kind-0 event for `author`.
    pub fn to_unsigned(&self, author: PublicKey) -> serde_json::Result<UnsignedEvent> {
        let content = self.to_content()?;
        Ok(EventBuilder::new(Kind::Metadata, content).build(author))
    }
}
