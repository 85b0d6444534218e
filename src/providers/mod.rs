//! Text summarization providers.

pub mod openai;

use async_trait::async_trait;

pub use openai::OpenAiSummarizer;

/// System instruction sent with every summarization request.
pub const SUMMARY_SYSTEM_PROMPT: &str = "あなたはユーザーからの入力を受け取り、その内容を3行に要約してください。
それぞれ行の先頭には始まりを示す記号「・」を付けてください。";

/// Condenses a post into a short multi-line summary.
///
/// Calls are stateless: no conversation is carried between requests.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> anyhow::Result<String>;
}
