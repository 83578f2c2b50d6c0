//! LLM integration.
//!
//! Uses the rig-core crate for HTTP transport against Google Gemini and the
//! `RigAdapter` to bridge rig's `CompletionModel` trait to our `LlmProvider`
//! trait.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::{RigAdapter, classify_error};

use std::sync::Arc;
use std::time::Duration;

use rig::client::CompletionClient;
use rig::providers::gemini;
use rig::providers::gemini::completion::gemini_api_types::{AdditionalParameters, GenerationConfig};
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Base temperature; the responder adjusts it per category.
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
    /// Upper bound on a single generation call.
    pub timeout: Duration,
}

/// Create the Gemini provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let client = gemini::Client::new(config.api_key.expose_secret()).map_err(|e| {
        LlmError::RequestFailed {
            provider: "gemini".to_string(),
            reason: format!("Failed to create Gemini client: {}", e),
        }
    })?;

    let generation_config = GenerationConfig {
        top_p: Some(config.top_p),
        top_k: Some(i32::try_from(config.top_k).unwrap_or(i32::MAX)),
        ..Default::default()
    };
    let params = serde_json::to_value(AdditionalParameters::default().with_config(generation_config))
        .map_err(|e| LlmError::RequestFailed {
            provider: "gemini".to_string(),
            reason: format!("Failed to encode generation config: {}", e),
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Gemini (model: {})", config.model);
    Ok(Arc::new(
        RigAdapter::new(model, &config.model, "gemini").with_additional_params(params),
    ))
}

/// Cheap request that fails fast on a rejected API key.
///
/// An answer the adapter cannot use still proves the key was accepted.
pub async fn verify_provider(llm: &dyn LlmProvider) -> Result<(), LlmError> {
    let request = CompletionRequest::new(vec![ChatMessage::user("Reply with OK.")])
        .with_temperature(0.0)
        .with_max_tokens(8);
    match llm.complete(request).await {
        Ok(_) | Err(LlmError::InvalidResponse { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}
