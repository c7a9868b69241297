//! Narration enhancement through an LLM provider.
//!
//! The prompt text lives in [`crate::prompts`]; this module only resolves the
//! provider, sends one chat request and validates the reply. There is no
//! retry loop: a failed call is reported once and the user decides whether
//! to try again.

use super::{cleanup, TextEnhancer};
use crate::config::NarratorConfig;
use crate::error::PipelineError;
use crate::prompts::{enhance_prompt, ENHANCE_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Model used when a provider is named but no model is given.
const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// [`TextEnhancer`] backed by any `edgequake-llm` provider.
pub struct LlmEnhancer {
    provider: OnceCell<Arc<dyn LLMProvider>>,
    provider_name: Option<String>,
    model: Option<String>,
    prompt_template: Option<String>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmEnhancer {
    pub fn from_config(config: &NarratorConfig) -> Self {
        let provider = OnceCell::new();
        if let Some(ref p) = config.provider {
            let _ = provider.set(Arc::clone(p));
        }
        Self {
            provider,
            provider_name: config.provider_name.clone(),
            model: config.model.clone(),
            prompt_template: config.enhance_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn provider(&self) -> Result<&Arc<dyn LLMProvider>, PipelineError> {
        self.provider
            .get_or_try_init(|| resolve_provider(self.provider_name.as_deref(), self.model.as_deref()))
    }

    fn build_messages(&self, markdown: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(ENHANCE_SYSTEM_PROMPT),
            ChatMessage::user(enhance_prompt(self.prompt_template.as_deref(), markdown)),
        ]
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

impl fmt::Debug for LlmEnhancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmEnhancer")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("resolved", &self.provider.get().is_some())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[async_trait]
impl TextEnhancer for LlmEnhancer {
    async fn enhance(&self, markdown: &str) -> Result<String, PipelineError> {
        let provider = Arc::clone(self.provider()?);
        let messages = self.build_messages(markdown);
        let options = self.build_options();

        let start = Instant::now();
        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| PipelineError::Llm(e.to_string()))?;
        debug!(
            "Enhancement: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        let enhanced = cleanup::clean_enhanced_markdown(&response.content);
        if enhanced.trim().is_empty() {
            return Err(PipelineError::EmptyResult("Enhanced content"));
        }
        info!("Enhanced {} → {} chars", markdown.len(), enhanced.len());
        Ok(enhanced)
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Named provider + model** — `provider_name` (e.g. `"anthropic"`); the
///    factory reads the matching API key from the environment.
/// 2. **Environment pair** — `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 3. **OpenAI key present** — `OPENAI_API_KEY` wins when several keys are set.
/// 4. **Full auto-detection** — `ProviderFactory::from_env`.
///
/// A pre-built provider from the config short-circuits all of this (see
/// [`LlmEnhancer::from_config`]).
pub fn resolve_provider(
    provider_name: Option<&str>,
    model: Option<&str>,
) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(name) = provider_name {
        return create_provider(name, model.unwrap_or(DEFAULT_MODEL));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, model.unwrap_or(&env_model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model.unwrap_or(DEFAULT_MODEL));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    info!("Using LLM provider '{}' with model '{}'", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
