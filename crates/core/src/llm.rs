use crate::config::ChatModelConfig;
use crate::http::{build_client, post_json_with_retry, JsonRequest};
use crate::traits::ChatModel;
use crate::{ChatError, ChatMessage, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Client for OpenAI-compatible `chat/completions` endpoints (Groq by default).
pub struct OpenAiCompatibleChatModel {
    config: ChatModelConfig,
    url: String,
    client: Client,
}

impl OpenAiCompatibleChatModel {
    pub fn new(config: ChatModelConfig) -> Result<Self, ChatError> {
        if config.api_key.trim().is_empty() {
            return Err(ChatError::MissingApiKey);
        }
        let url = config.completions_url()?.to_string();
        let client = build_client(config.timeout_secs)?;
        Ok(Self {
            config,
            url,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleChatModel {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
        };

        let response = post_json_with_retry(
            &self.client,
            JsonRequest {
                backend: "chat",
                url: &self.url,
                bearer: &self.config.api_key,
                body: &body,
            },
            self.config.retry,
        )
        .await?;

        let content = parse_completion(&response)?;
        debug!(model = %self.config.model, chars = content.len(), "chat completion");
        Ok(content)
    }
}

fn parse_completion(response: &Value) -> Result<String, ProviderError> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::BackendResponse {
            backend: "chat".to_string(),
            status: 200,
            details: format!("completion has no message content: {response}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::http::stub;
    use serde_json::json;

    #[test]
    fn completion_content_is_extracted() -> Result<(), ProviderError> {
        let response = json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Paris."}, "finish_reason": "stop"}
            ]
        });
        assert_eq!(parse_completion(&response)?, "Paris.");
        Ok(())
    }

    #[test]
    fn completion_without_choices_is_an_error() {
        let response = json!({"error": {"message": "invalid api key"}});
        assert!(parse_completion(&response).is_err());
    }

    #[test]
    fn request_omits_unset_temperature() -> Result<(), serde_json::Error> {
        let messages = vec![ChatMessage::user("hi")];
        let body = CompletionRequest {
            model: "gemma2-9b-it",
            messages: &messages,
            temperature: None,
        };
        let encoded = serde_json::to_value(&body)?;
        assert_eq!(
            encoded,
            json!({"model": "gemma2-9b-it", "messages": [{"role": "user", "content": "hi"}]})
        );
        Ok(())
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let result = OpenAiCompatibleChatModel::new(ChatModelConfig::new(""));
        assert!(matches!(result, Err(ChatError::MissingApiKey)));
    }

    #[tokio::test]
    async fn completion_is_posted_to_chat_completions() -> Result<(), ChatError> {
        let (url, server) = stub::serve(vec![
            (503, r#"{"error":"overloaded"}"#),
            (
                200,
                r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Paris."}}]}"#,
            ),
        ])
        .await;
        let model = OpenAiCompatibleChatModel::new(ChatModelConfig {
            base_url: url,
            retry: RetryPolicy {
                max_retries: 1,
                base_delay_ms: 1,
            },
            ..ChatModelConfig::new("gsk_test")
        })?;

        let answer = model
            .complete(&[ChatMessage::user("What is the capital of France?")])
            .await?;

        assert_eq!(answer, "Paris.");
        let received = server.await.expect("server task");
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].path, "/chat/completions");
        assert_eq!(received[1].authorization.as_deref(), Some("Bearer gsk_test"));
        assert_eq!(
            received[1].body,
            json!({
                "model": "gemma2-9b-it",
                "messages": [{"role": "user", "content": "What is the capital of France?"}]
            })
        );
        Ok(())
    }
}
