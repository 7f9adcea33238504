//! Caller-facing operations: analyze, suggest, plan.
//!
//! Every operation here goes through the [`Orchestrator`] and never lets a
//! terminal [`ImgEditError::ServiceUnavailable`] escape. Instead it returns a
//! clearly flagged degraded result (`error` field, `Suggestion::Unavailable`,
//! or an instruction with `used_fallback = true`), so end users always get a
//! usable response. Callers that want the raw error use
//! [`Assistant::orchestrator`] directly.

use crate::config::AssistantConfig;
use crate::content::Content;
use crate::error::ImgEditError;
use crate::fallback::{self, SERVICE_UNAVAILABLE_REASON, UNINTERPRETABLE_REASON};
use crate::instruction::EditInstruction;
use crate::interpret::extract_structured;
use crate::orchestrator::{Invocation, Orchestrator};
use crate::prompts::{
    plan_edit_prompt, suggestion_prompt, DEFAULT_ANALYZE_PROMPT, DEFAULT_SUGGESTION_TEMPLATE,
};
use crate::provider::{LlmModelClient, ModelClient, PromptPart};
use crate::registry::{ModelRegistry, RegistrySnapshot};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Text shown to end users when analysis could not be performed.
pub const ANALYSIS_UNAVAILABLE_TEXT: &str =
    "AI analysis is temporarily unavailable. Please try again later.";

/// Result of [`Assistant::analyze`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub text: String,
    /// Model that produced `text`; `None` for degraded results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub attempts: usize,
    /// Set when the analysis is degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Analysis {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of [`Assistant::structured_suggestion`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Suggestion {
    /// The model answered with a valid edit instruction.
    Instruction(EditInstruction),
    /// The model answered, but not with a usable instruction.
    Raw { raw: String },
    /// No model could be reached.
    Unavailable { error: String },
}

/// Entry point for the caller-facing operations.
///
/// Cloning is cheap and clones share the model selection state.
#[derive(Clone)]
pub struct Assistant {
    orchestrator: Orchestrator,
    config: AssistantConfig,
}

impl Assistant {
    /// Build an assistant from its configuration.
    ///
    /// Resolves the model client (pre-built client, else a named
    /// `edgequake-llm` provider) and creates the shared registry.
    pub fn new(config: AssistantConfig) -> Result<Self, ImgEditError> {
        let client = resolve_client(&config)?;
        Self::with_client(config, client)
    }

    /// Build an assistant around an explicit client.
    pub fn with_client(
        config: AssistantConfig,
        client: Arc<dyn ModelClient>,
    ) -> Result<Self, ImgEditError> {
        let registry = Arc::new(ModelRegistry::with_reset(
            config.models.iter().cloned(),
            config.reset_interval(),
            config.reset_policy,
        )?);
        let mut orchestrator =
            Orchestrator::new(client, registry).with_switch_delay(config.model_switch_delay());
        if let Some(ref observer) = config.observer {
            orchestrator = orchestrator.with_observer(Arc::clone(observer));
        }
        info!(
            "Assistant ready: {} candidate model(s), {} attempt(s) per call",
            config.models.len(),
            config.effective_max_attempts()
        );
        Ok(Self {
            orchestrator,
            config,
        })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Candidate list and current selection, for diagnostics.
    pub fn models(&self) -> RegistrySnapshot {
        self.orchestrator.registry().snapshot()
    }

    /// Run `parts` through the orchestrator with the configured budget.
    pub async fn invoke(&self, parts: &[PromptPart]) -> Result<Invocation, ImgEditError> {
        self.orchestrator
            .invoke(
                parts,
                self.config.effective_max_attempts(),
                self.config.retry_base_delay(),
            )
            .await
    }

    /// Free-form analysis of `content`.
    ///
    /// An empty prompt uses [`DEFAULT_ANALYZE_PROMPT`].
    pub async fn analyze(&self, content: &Content, prompt: &str) -> Analysis {
        let prompt = if prompt.trim().is_empty() {
            DEFAULT_ANALYZE_PROMPT
        } else {
            prompt
        };
        let parts = [PromptPart::text(prompt), PromptPart::Inline(content.clone())];

        match self.invoke(&parts).await {
            Ok(inv) => Analysis {
                attempts: inv.attempt_count(),
                model: Some(inv.model),
                text: inv.text,
                error: None,
            },
            Err(e) => {
                warn!("Analysis degraded: {}", e);
                Analysis {
                    text: ANALYSIS_UNAVAILABLE_TEXT.to_string(),
                    model: None,
                    attempts: attempts_of(&e),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Ask the model for one structured edit suggestion.
    ///
    /// An empty template uses [`DEFAULT_SUGGESTION_TEMPLATE`].
    pub async fn structured_suggestion(&self, content: &Content, template: &str) -> Suggestion {
        let template = if template.trim().is_empty() {
            DEFAULT_SUGGESTION_TEMPLATE
        } else {
            template
        };
        let parts = [
            PromptPart::text(suggestion_prompt(template)),
            PromptPart::Inline(content.clone()),
        ];

        match self.invoke(&parts).await {
            Ok(inv) => match parse_instruction(&inv.text) {
                Some(instruction) => Suggestion::Instruction(instruction),
                None => Suggestion::Raw { raw: inv.text },
            },
            Err(e) => {
                warn!("Suggestion degraded: {}", e);
                Suggestion::Unavailable {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Turn a free-text request into one edit instruction.
    ///
    /// Always returns an instruction: if the model is unreachable or its
    /// answer cannot be interpreted, the rule-based extractor is used and the
    /// result is tagged with `used_fallback`.
    pub async fn plan_edit(&self, content: &Content, user_prompt: &str) -> EditInstruction {
        let parts = [
            PromptPart::text(plan_edit_prompt(user_prompt)),
            PromptPart::Inline(content.clone()),
        ];

        match self.invoke(&parts).await {
            Ok(inv) => match parse_instruction(&inv.text) {
                Some(instruction) => instruction,
                None => {
                    warn!("Model {} returned no usable instruction; using rules", inv.model);
                    fallback::degraded(user_prompt, UNINTERPRETABLE_REASON)
                }
            },
            Err(e) => {
                warn!("Edit planning degraded: {}", e);
                fallback::degraded(user_prompt, SERVICE_UNAVAILABLE_REASON)
            }
        }
    }

    /// Analyse several items concurrently; results keep input order.
    ///
    /// All items share the selection state, so a quota failure seen by one
    /// moves the model forward for the others.
    pub async fn analyze_batch(
        &self,
        items: &[(Content, String)],
        concurrency: usize,
    ) -> Vec<Analysis> {
        let mut results: Vec<(usize, Analysis)> = stream::iter(items.iter().enumerate().map(
            |(i, (content, prompt))| async move { (i, self.analyze(content, prompt).await) },
        ))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, a)| a).collect()
    }
}

/// Extract and validate an instruction from raw model text.
///
/// A model-produced instruction never carries fallback tags.
fn parse_instruction(raw: &str) -> Option<EditInstruction> {
    let value = extract_structured(raw)?;
    let mut instruction: EditInstruction = serde_json::from_value(value).ok()?;
    instruction.used_fallback = false;
    instruction.fallback_reason = None;
    Some(instruction)
}

fn attempts_of(e: &ImgEditError) -> usize {
    match e {
        ImgEditError::ServiceUnavailable { attempts, .. } => *attempts,
        _ => 0,
    }
}

/// Resolve the model client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`): used as-is. Useful in tests or
///    when the caller wraps the provider in its own middleware.
/// 2. **Named provider** (`config.provider_name`): an [`LlmModelClient`] that
///    asks `edgequake_llm::ProviderFactory` for one provider per candidate
///    model. The first candidate is created eagerly so a missing API key is
///    reported here rather than as a degraded result later.
fn resolve_client(config: &AssistantConfig) -> Result<Arc<dyn ModelClient>, ImgEditError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    let client = LlmModelClient::new(
        config.provider_name.clone(),
        config.temperature,
        config.max_tokens,
    );
    if let Some(first) = config.models.first() {
        client.preflight(first)?;
    }
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_instruction_clears_fallback_tags() {
        let raw = r#"```json
{"action": "filter", "parameters": {"type": "sepia"}, "explanation": "old", "usedFallback": true, "fallbackReason": "x"}
```"#;
        let i = parse_instruction(raw).unwrap();
        assert!(!i.used_fallback);
        assert!(i.fallback_reason.is_none());
    }

    #[test]
    fn parse_instruction_rejects_invalid() {
        assert!(parse_instruction("I would crop it.").is_none());
        assert!(parse_instruction(r#"{"action": "explode"}"#).is_none());
    }

    #[test]
    fn suggestion_serialises_untagged() {
        let raw = Suggestion::Raw { raw: "text".into() };
        assert_eq!(serde_json::to_value(&raw).unwrap(), json!({"raw": "text"}));
        let err = Suggestion::Unavailable { error: "down".into() };
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({"error": "down"}));
    }

    #[test]
    fn degraded_analysis_serialises_error() {
        let a = Analysis {
            text: ANALYSIS_UNAVAILABLE_TEXT.into(),
            model: None,
            attempts: 3,
            error: Some("boom".into()),
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["error"], "boom");
        assert!(v.get("model").is_none());
        assert!(a.is_degraded());
    }
}
