use crate::models::transcript_messages;
use crate::traits::ChatModel;
use crate::{ChatMessage, ProviderError, Turn};
use tracing::debug;

pub const REWRITE_SYSTEM_PROMPT: &str = "You are given a chat history and the user's latest question, \
which may refer to earlier parts of the conversation. Rewrite the latest question so that it can be \
understood on its own without the chat history. Do NOT answer the question. If it already stands on \
its own, return it unchanged. Reply with the question only.";

pub fn rewrite_messages(transcript: &[Turn], question: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len() * 2 + 2);
    messages.push(ChatMessage::system(REWRITE_SYSTEM_PROMPT));
    messages.extend(transcript_messages(transcript));
    messages.push(ChatMessage::user(question));
    messages
}

/// Turns a follow-up question into a standalone one. Without history the
/// question is returned as-is and the model is not called.
pub async fn rewrite_question(
    model: &dyn ChatModel,
    transcript: &[Turn],
    question: &str,
) -> Result<String, ProviderError> {
    if transcript.is_empty() {
        return Ok(question.to_string());
    }

    let rewritten = model.complete(&rewrite_messages(transcript, question)).await?;
    let rewritten = rewritten.trim();
    if rewritten.is_empty() {
        return Ok(question.to_string());
    }

    debug!(original = question, rewritten, "rewrote follow-up question");
    Ok(rewritten.to_string())
}
