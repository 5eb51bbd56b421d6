use crate::models::transcript_messages;
use crate::traits::ChatModel;
use crate::{ChatMessage, ProviderError, RetrievedSegment, Turn};

pub const ANSWER_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Answer the question using only the retrieved context below. If the context does not contain \
the answer, say that you don't know. Use at most three sentences and keep the answer concise.";

pub const CONTEXT_MARKER: &str = "Context:";

pub fn format_context(context: &[RetrievedSegment]) -> String {
    context
        .iter()
        .map(|hit| hit.segment.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn answer_messages(
    transcript: &[Turn],
    question: &str,
    context: &[RetrievedSegment],
) -> Vec<ChatMessage> {
    let system = format!(
        "{ANSWER_SYSTEM_PROMPT}\n\n{CONTEXT_MARKER}\n{}",
        format_context(context)
    );

    let mut messages = Vec::with_capacity(transcript.len() * 2 + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(transcript_messages(transcript));
    messages.push(ChatMessage::user(question));
    messages
}

/// Asks the model to answer from `context`. The reply is returned as-is.
pub async fn synthesize_answer(
    model: &dyn ChatModel,
    transcript: &[Turn],
    question: &str,
    context: &[RetrievedSegment],
) -> Result<String, ProviderError> {
    let answer = model
        .complete(&answer_messages(transcript, question, context))
        .await?;
    Ok(answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, Segment};

    fn hit(text: &str) -> RetrievedSegment {
        RetrievedSegment {
            segment: Segment {
                segment_id: "id".to_string(),
                source: "doc.pdf".to_string(),
                page: 1,
                chunk_index: 0,
                start: 0,
                end: text.chars().count(),
                text: text.to_string(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn context_is_stuffed_into_the_system_prompt() {
        let messages = answer_messages(
            &[],
            "What is the capital of France?",
            &[hit("The capital of France is Paris."), hit("Lyon is large.")],
        );

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("three sentences"));
        assert!(messages[0]
            .content
            .ends_with("Context:\nThe capital of France is Paris.\n\nLyon is large."));
        assert_eq!(messages[1], ChatMessage::user("What is the capital of France?"));
    }

    #[test]
    fn history_sits_between_system_and_question() {
        let transcript = vec![Turn::new("first?", "first.")];
        let messages = answer_messages(&transcript, "second?", &[]);

        let roles: Vec<Role> = messages.iter().map(|message| message.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
    }
}
