//! The mention reply pipeline: router, resolver and publisher.

pub mod publisher;
pub mod resolver;
pub mod router;

pub use publisher::{PublishError, Publisher};
pub use resolver::{ReplyResolver, ResolveError, ResolvedSummary, ResolverSettings};
pub use router::{LoopSummary, MentionRouter};
