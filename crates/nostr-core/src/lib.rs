//! Shared Nostr protocol functionality for sangyou-bot
//!
//! This crate provides the protocol-level pieces of the reply loop: mention
//! gating, reply and profile event construction, deterministic signing and
//! the relay client the pipeline talks to.

pub mod mention;
pub mod relay;
pub mod respond;
pub mod sign;

// Re-export commonly used types
pub use mention::{
    contains_trigger, first_referenced_event, mention_filter, mention_verdicts,
    qualifying_mentions, GateState, MentionGate, MentionVerdict, ReplyContext,
    DEFAULT_TRIGGER_PHRASES,
};
pub use relay::{EventStream, PublishReport, RelayClient, RelayError, RelayHandle};
pub use respond::{
    build_reply, content_chars, is_summarizable, referenced_post_filter, reply_tags,
    ProfileMetadata, DEFAULT_MIN_CONTENT_CHARS,
};
pub use sign::{sign_event, SigningError};

// Re-export nostr-sdk for convenience
pub use nostr_sdk;
