//! Helpers shared across LLM providers.
//!
//! All vendors are plain JSON-over-HTTPS APIs, so request sending, status
//! classification and the retry loop live here once.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use crate::llms::base_llm::BaseLLMState;
use crate::utilities::errors::ProviderError;
use crate::utilities::string_utils::truncate_chars;

/// Pull a human-readable message out of a vendor error body.
///
/// Handles `{"error": {"message": ...}}` (OpenAI, Groq, Anthropic, Gemini)
/// and `{"error": "..."}` / `{"message": ...}` variants; falls back to the
/// raw body, truncated.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let message = json
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(|m| m.as_str())
            .or_else(|| json.get("message").and_then(|m| m.as_str()));
        if let Some(message) = message {
            return message.to_string();
        }
    }
    truncate_chars(body.trim(), 300)
}

/// Map a non-success HTTP status to a [`ProviderError`].
///
/// 429 (and vendor quota codes hidden in a 400/403 body) is a quota error,
/// 401/403 an authentication error; everything else keeps its status.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let message = extract_error_message(body);
    let lower = body.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS
        || lower.contains("insufficient_quota")
        || lower.contains("resource_exhausted")
        || lower.contains("credit balance")
    {
        return ProviderError::QuotaExceeded(format!("{}: {}", provider, message));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::Authentication(format!("{}: {}", provider, message));
    }
    ProviderError::Api {
        status: status.as_u16(),
        message: format!("{}: {}", provider, message),
    }
}

/// POST a JSON body and return the parsed JSON answer.
///
/// `build` is called once per attempt so headers can be re-applied.
/// Network failures and 5xx answers are retried with exponential backoff
/// (1s, 2s, ...); quota, authentication and other 4xx errors are not.
pub async fn send_json<F>(state: &BaseLLMState, provider: &str, build: F) -> Result<Value, ProviderError>
where
    F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
{
    let mut last_error: Option<ProviderError> = None;
    let mut retry_delay = Duration::from_secs(1);

    for attempt in 0..=state.config.max_retries {
        if attempt > 0 {
            log::warn!("{} API retry attempt {} after {:?}", provider, attempt, retry_delay);
            tokio::time::sleep(retry_delay).await;
            retry_delay *= 2;
        }

        let response = match build(&state.client).send().await {
            Ok(resp) => resp,
            Err(e) => {
                last_error = Some(ProviderError::Network(format!("{}: {}", provider, e)));
                continue;
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                last_error = Some(ProviderError::Network(format!("{}: {}", provider, e)));
                continue;
            }
        };

        if !status.is_success() {
            let error = classify_status(provider, status, &text);
            if error.is_retryable() {
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        return serde_json::from_str(&text).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "{}: {} - body: {}",
                provider,
                e,
                truncate_chars(&text, 200)
            ))
        });
    }

    Err(last_error.unwrap_or_else(|| ProviderError::Network(format!("{}: request failed", provider))))
}
