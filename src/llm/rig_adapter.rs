//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::completion::message::AssistantContent;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

/// Default back-off when the provider does not say how long to wait.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: String,
    /// Provider-specific request parameters (e.g. Gemini `generationConfig`).
    additional_params: Option<serde_json::Value>,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider: provider.to_string(),
            additional_params: None,
        }
    }

    pub fn with_additional_params(mut self, params: serde_json::Value) -> Self {
        self.additional_params = Some(params);
        self
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut builder = self.model.completion_request(request.user_prompt());
        if let Some(preamble) = request.system_prompt() {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if let Some(params) = &self.additional_params {
            builder = builder.additional_params(params.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&self.provider, &e.to_string()))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.clone(),
                reason: "empty completion".into(),
            });
        }

        let output_tokens = u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX);
        Ok(CompletionResponse {
            content,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens,
            finish_reason: finish_reason(output_tokens, request.max_tokens),
        })
    }
}

/// rig does not surface Gemini's finish reason, so infer truncation from usage.
fn finish_reason(output_tokens: u32, max_tokens: Option<u32>) -> FinishReason {
    match max_tokens {
        Some(max) if output_tokens >= max => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

/// Map a provider error message onto our taxonomy.
pub fn classify_error(provider: &str, message: &str) -> LlmError {
    let lower = message.to_lowercase();
    if message.contains("429") || message.contains("RESOURCE_EXHAUSTED") || lower.contains("quota")
    {
        LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: parse_retry_after(message).or(Some(DEFAULT_RETRY_AFTER)),
        }
    } else if message.contains("401")
        || message.contains("403")
        || message.contains("PERMISSION_DENIED")
        || message.contains("UNAUTHENTICATED")
        || lower.contains("api key not valid")
    {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: message.to_string(),
        }
    }
}

/// Gemini quota errors carry `"retryDelay": "17s"`.
fn parse_retry_after(message: &str) -> Option<Duration> {
    let start = message.find("retryDelay")?;
    let digits: String = message[start..]
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_errors_are_rate_limits() {
        let err = classify_error(
            "gemini",
            r#"ProviderError: {"error":{"code":429,"status":"RESOURCE_EXHAUSTED","details":[{"retryDelay":"17s"}]}}"#,
        );
        match err {
            LlmError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(17)));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_without_delay_uses_default() {
        let err = classify_error("gemini", "You exceeded your current quota");
        assert!(matches!(
            err,
            LlmError::RateLimited { retry_after: Some(d), .. } if d == DEFAULT_RETRY_AFTER
        ));
    }

    #[test]
    fn bad_key_is_auth_failure() {
        let err = classify_error("gemini", "400 INVALID_ARGUMENT: API key not valid. Please pass a valid API key.");
        assert!(matches!(err, LlmError::AuthFailed { .. }));
        let err = classify_error("gemini", "HTTP 403 PERMISSION_DENIED");
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[test]
    fn token_ceiling_means_truncated() {
        assert_eq!(finish_reason(1024, Some(1024)), FinishReason::Length);
        assert_eq!(finish_reason(300, Some(1024)), FinishReason::Stop);
        assert_eq!(finish_reason(5000, None), FinishReason::Stop);
    }

    #[test]
    fn other_errors_are_request_failures() {
        let err = classify_error("gemini", "error sending request: connection reset");
        assert!(matches!(err, LlmError::RequestFailed { .. }));
    }
}
