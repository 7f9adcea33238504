//! AI provider boundary: the [`ModelClient`] trait and its edgequake-llm
//! implementation.
//!
//! The orchestrator only needs one capability from a provider: "run this
//! prompt against model X". Unlike `edgequake_llm::LLMProvider`, which is
//! bound to a single model when it is created, [`ModelClient::generate`]
//! takes the model id per call so the orchestrator can switch models between
//! attempts. [`LlmModelClient`] bridges the two by lazily creating (and
//! caching) one provider per candidate model.

use crate::content::Content;
use crate::error::{ImgEditError, ProviderError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One part of a multimodal prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    Inline(Content),
}

impl PromptPart {
    pub fn text(s: impl Into<String>) -> Self {
        PromptPart::Text(s.into())
    }
}

impl From<Content> for PromptPart {
    fn from(c: Content) -> Self {
        PromptPart::Inline(c)
    }
}

/// Anything that can run a prompt against a named model.
///
/// Errors must carry HTTP-status-like signatures ("429", "404", "quota",
/// "not found", …) in their message or `status` so that
/// [`crate::classify::classify_failure`] can bucket them.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, model: &str, parts: &[PromptPart]) -> Result<String, ProviderError>;
}

/// [`ModelClient`] backed by `edgequake_llm::ProviderFactory`.
pub struct LlmModelClient {
    provider_name: String,
    temperature: f32,
    max_tokens: usize,
    providers: Mutex<HashMap<String, Arc<dyn LLMProvider>>>,
}

impl LlmModelClient {
    /// Create a client for a named provider ("gemini", "openai", …).
    ///
    /// API keys are read from the environment by the factory when the first
    /// call for a model is made.
    pub fn new(provider_name: impl Into<String>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider_name: provider_name.into(),
            temperature,
            max_tokens,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Create the provider for `model` eagerly, to surface configuration
    /// problems (missing API key) before the first request.
    pub fn preflight(&self, model: &str) -> Result<(), ImgEditError> {
        self.provider_for(model)
            .map(|_| ())
            .map_err(|e| ImgEditError::ProviderNotConfigured {
                provider: self.provider_name.clone(),
                hint: e.message,
            })
    }

    fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, ProviderError> {
        let mut cache = self
            .providers
            .lock()
            .map_err(|_| ProviderError::new("provider cache poisoned"))?;
        if let Some(p) = cache.get(model) {
            return Ok(Arc::clone(p));
        }
        let provider = ProviderFactory::create_llm_provider(&self.provider_name, model)
            .map_err(|e| ProviderError::new(format!("{}: {}", self.provider_name, e)))?;
        debug!("Created {} provider for model {}", self.provider_name, model);
        cache.insert(model.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ModelClient for LlmModelClient {
    async fn generate(&self, model: &str, parts: &[PromptPart]) -> Result<String, ProviderError> {
        let provider = self.provider_for(model)?;
        let (text, images) = build_user_message(parts);
        let messages = vec![ChatMessage::user_with_images(text.as_str(), images)];
        let options = self.build_options();

        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ProviderError::new(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            model, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Join text parts with blank lines and encode inline content as `ImageData`.
fn build_user_message(parts: &[PromptPart]) -> (String, Vec<ImageData>) {
    let mut texts = Vec::new();
    let mut images = Vec::new();
    for part in parts {
        match part {
            PromptPart::Text(t) => texts.push(t.as_str()),
            PromptPart::Inline(c) => {
                images.push(ImageData::new(c.to_base64(), c.mime.as_str()).with_detail("high"))
            }
        }
    }
    (texts.join("\n\n"), images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_collects_text_and_images() {
        let png = Content::new(vec![0x89, b'P', b'N', b'G'], "image/png");
        let parts = vec![
            PromptPart::text("Describe this image."),
            PromptPart::from(png),
            PromptPart::text("Be brief."),
        ];
        let (text, images) = build_user_message(&parts);
        assert_eq!(text, "Describe this image.\n\nBe brief.");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime_type, "image/png");
    }

    #[test]
    fn build_options_uses_client_settings() {
        let client = LlmModelClient::new("gemini", 0.4, 2048);
        let opts = client.build_options();
        assert_eq!(opts.temperature, Some(0.4));
        assert_eq!(opts.max_tokens, Some(2048));
    }
}
