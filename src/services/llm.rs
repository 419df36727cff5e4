//! Language-model capability: prompt in, raw text out.
//!
//! [`ProviderModel`] adapts any `edgequake-llm` provider (Ollama, OpenAI,
//! Anthropic, Gemini, …) to the one-call [`LanguageModel`] interface the
//! pipeline needs. Providers are created once and shared behind an `Arc`.

use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::error::StartupError;

/// Environment variable naming the LLM provider.
pub const PROVIDER_ENV: &str = "EDGEQUAKE_LLM_PROVIDER";
/// Environment variable naming the model ID.
pub const MODEL_ENV: &str = "EDGEQUAKE_MODEL";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0}")]
    Provider(String),
}

/// Send one prompt, receive the model's text verbatim.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError>;
}

/// A [`LanguageModel`] backed by an `edgequake-llm` provider.
#[derive(Clone)]
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for ProviderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderModel")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    /// Resolve the provider named in `config` and wrap it.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, StartupError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config.temperature, config.max_tokens))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LanguageModel for ProviderModel {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = self.options();
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelError::Provider(e.to_string()))?;
        debug!(
            "model answered: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, StartupError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        StartupError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Named provider + model** (`config.provider_name`, default `ollama`)
///    with `config.model` (default `llama3`).
/// 2. **Environment pair** [`PROVIDER_ENV`] + [`MODEL_ENV`], when
///    the provider name was cleared.
/// 3. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &ServiceConfig) -> Result<Arc<dyn LLMProvider>, StartupError> {
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("llama3");
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var(PROVIDER_ENV),
        std::env::var(MODEL_ENV),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| StartupError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Start Ollama, set OPENAI_API_KEY / ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
