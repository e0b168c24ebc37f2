//! Conversation summarization for compaction.
//!
//! When a session grows past its context budget, the older part of the
//! history is folded into a single summary message. The summary comes from
//! one auxiliary, non-tool model call with a fixed summarizer prompt; if that
//! call fails, a placeholder noting the omitted count stands in — compaction
//! must never abort the turn that triggered it.

use tracing::warn;

use crate::providers::{ChatOptions, LLMProvider};
use crate::session::Message;

/// System prompt for the auxiliary summarization call.
pub const SUMMARIZER_SYSTEM_PROMPT: &str =
    "You are a concise summarizer. Respond only with the summary.";

const SUMMARY_MAX_TOKENS: u32 = 1024;
const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Render messages as a plain-text transcript for the summarizer.
///
/// # Example
/// ```
/// use tabby::agent::compaction::render_transcript;
/// use tabby::session::Message;
///
/// let text = render_transcript(&[Message::user("hi"), Message::assistant("hello")]);
/// assert_eq!(text, "user: hi\nassistant: hello");
/// ```
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let content = match &m.content {
                Some(c) if !c.is_empty() => c.as_str(),
                _ => "[tool call]",
            };
            format!("{}: {}", m.role, content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fallback summary used when the summarization call fails.
pub fn placeholder_summary(omitted: usize) -> String {
    format!("[{} messages omitted due to context limit]", omitted)
}

/// Summarize messages via one non-tool completion call.
///
/// Returns the model's summary, or a placeholder on any failure.
pub async fn summarize(
    provider: &dyn LLMProvider,
    model: Option<&str>,
    messages: &[Message],
) -> String {
    let transcript = render_transcript(messages);
    let prompt = format!(
        "Summarize this conversation concisely. \
         Preserve key decisions, facts, and context.\n\n{}",
        transcript
    );

    let mut options = ChatOptions::new()
        .with_max_tokens(SUMMARY_MAX_TOKENS)
        .with_temperature(SUMMARY_TEMPERATURE);
    if let Some(model) = model {
        options = options.with_model(model);
    }

    match provider
        .complete(
            &[Message::user(&prompt)],
            Some(SUMMARIZER_SYSTEM_PROMPT),
            &[],
            &options,
        )
        .await
    {
        Ok(response) => match response.content {
            Some(summary) if !summary.is_empty() => summary,
            _ => "No summary available.".to_string(),
        },
        Err(e) => {
            warn!(error = %e, "Compaction summarization failed, using placeholder");
            placeholder_summary(messages.len())
        }
    }
}
