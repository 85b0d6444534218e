//! Nostr bot that answers mentions with a three-line summary of the
//! referenced post.

pub mod channels;
pub mod config;
pub mod providers;

pub use channels::{LoopSummary, MentionRouter, Publisher, ReplyResolver, ResolverSettings};
pub use config::{Config, ConfigError};
pub use providers::{OpenAiSummarizer, Summarizer};
