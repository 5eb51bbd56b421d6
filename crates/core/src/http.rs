//! Shared request plumbing for the hosted providers: bounded timeouts and
//! retry with exponential backoff.
//!
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors (including timeouts) → retry

use crate::config::RetryPolicy;
use crate::error::ProviderError;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()?)
}

pub(crate) fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub(crate) struct JsonRequest<'a, B: Serialize> {
    pub backend: &'a str,
    pub url: &'a str,
    pub bearer: &'a str,
    pub body: &'a B,
}

pub(crate) async fn post_json_with_retry<B: Serialize>(
    client: &Client,
    request: JsonRequest<'_, B>,
    retry: RetryPolicy,
) -> Result<Value, ProviderError> {
    let mut last_error = String::new();
    let attempts = retry.max_retries.saturating_add(1);

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = retry.delay_for(attempt);
            warn!(
                backend = request.backend,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "retrying provider request"
            );
            tokio::time::sleep(delay).await;
        }

        let response = client
            .post(request.url)
            .bearer_auth(request.bearer)
            .json(request.body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                last_error = error.to_string();
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Value>().await?);
        }

        let details = response.text().await.unwrap_or_default();
        if is_retryable(status) {
            last_error = format!("{status}: {details}");
            continue;
        }

        return Err(ProviderError::BackendResponse {
            backend: request.backend.to_string(),
            status: status.as_u16(),
            details,
        });
    }

    Err(ProviderError::RetriesExhausted {
        backend: request.backend.to_string(),
        attempts,
        last: last_error,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_retried() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn client_errors_are_not_retried() {
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn unreachable_endpoint_exhausts_retries() -> Result<(), ProviderError> {
        let client = build_client(1)?;
        let retry = RetryPolicy {
            max_retries: 1,
            base_delay_ms: 1,
        };
        let body = serde_json::json!({});
        let result = post_json_with_retry(
            &client,
            JsonRequest {
                backend: "test",
                url: "http://127.0.0.1:9/unreachable",
                bearer: "token",
                body: &body,
            },
            retry,
        )
        .await;

        assert!(matches!(
            result,
            Err(ProviderError::RetriesExhausted { attempts: 2, .. })
        ));
        Ok(())
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn rate_limited_request_succeeds_on_retry() -> Result<(), ProviderError> {
        let (url, server) =
            stub::serve(vec![(429, r#"{"error":"slow down"}"#), (200, r#"{"a":1}"#)]).await;
        let client = build_client(5)?;
        let body = serde_json::json!({"inputs": ["x"]});

        let value = post_json_with_retry(
            &client,
            JsonRequest {
                backend: "test",
                url: &url,
                bearer: "secret",
                body: &body,
            },
            fast_retry(),
        )
        .await?;

        assert_eq!(value, serde_json::json!({"a": 1}));
        let received = server.await.expect("server task");
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].body, body);
        assert_eq!(received[1].authorization.as_deref(), Some("Bearer secret"));
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_request_fails_without_retry() -> Result<(), ProviderError> {
        let (url, server) = stub::serve(vec![(401, "bad")]).await;
        let client = build_client(5)?;
        let body = serde_json::json!({});

        let result = post_json_with_retry(
            &client,
            JsonRequest {
                backend: "test",
                url: &url,
                bearer: "wrong",
                body: &body,
            },
            fast_retry(),
        )
        .await;

        match result {
            Err(ProviderError::BackendResponse {
                status, details, ..
            }) => {
                assert_eq!(status, 401);
                assert_eq!(details, "bad");
            }
            other => panic!("expected a 401 backend response, got {other:?}"),
        }
        assert_eq!(server.await.expect("server task").len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn persistent_server_errors_exhaust_retries() -> Result<(), ProviderError> {
        let (url, server) = stub::serve(vec![(503, "down"), (502, "down"), (500, "down")]).await;
        let client = build_client(5)?;
        let body = serde_json::json!({});

        let result = post_json_with_retry(
            &client,
            JsonRequest {
                backend: "test",
                url: &url,
                bearer: "token",
                body: &body,
            },
            fast_retry(),
        )
        .await;

        match result {
            Err(ProviderError::RetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert!(last.contains("500"), "last error was {last}");
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(server.await.expect("server task").len(), 3);
        Ok(())
    }
}
