//! Configuration types for the image-edit assistant.
//!
//! All orchestration behaviour is controlled through [`AssistantConfig`],
//! built via its [`AssistantConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across tasks and to diff two runs to
//! understand why their model selection differed.

use crate::error::ImgEditError;
use crate::observer::ObserverHandle;
use crate::provider::ModelClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default candidate models, most-preferred first.
///
/// The list runs from the newest, most capable flash model down to the older
/// tiers that usually still have quota left when the newer ones are
/// rate-limited.
pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
    "gemini-1.5-pro",
];

/// Default provider name passed to `edgequake_llm::ProviderFactory`.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Configuration for the assistant and its model-call orchestrator.
///
/// # Example
/// ```rust
/// use edgequake_imgedit::AssistantConfig;
///
/// let config = AssistantConfig::builder()
///     .models(["gemini-2.0-flash", "gemini-1.5-flash"])
///     .retry_base_delay_ms(250)
///     .build()
///     .unwrap();
/// assert_eq!(config.effective_max_attempts(), 2);
/// ```
#[derive(Clone)]
pub struct AssistantConfig {
    /// Ordered candidate model identifiers, most-preferred first. Must be non-empty.
    pub models: Vec<String>,

    /// Provider name for `ProviderFactory` (e.g. "gemini", "openai"). Default: "gemini".
    pub provider_name: String,

    /// Pre-constructed model client. Takes precedence over `provider_name`.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Attempt budget per call. Default: `None` = one attempt per candidate model,
    /// so every model gets at least one try during a systemic quota event.
    pub max_attempts: Option<usize>,

    /// Base delay for the linear backoff on generic transient errors. Default: 1000.
    ///
    /// Attempt `n` (0-based) waits `retry_base_delay_ms * (n + 1)` before the
    /// next try on the same model.
    pub retry_base_delay_ms: u64,

    /// Fixed pause after switching models on a quota/rate-limit error. Default: 1000.
    pub model_switch_delay_ms: u64,

    /// Inactivity interval after which the selection snaps back to the first
    /// candidate. Measured from the last reset. Default: 60.
    pub reset_interval_secs: u64,

    /// When the auto-reset is evaluated. Default: [`ResetPolicy::OnAccess`].
    pub reset_policy: ResetPolicy,

    /// Sampling temperature. Default: 0.4.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 2048.
    pub max_tokens: usize,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Optional observer receiving attempt/switch/backoff events.
    pub observer: Option<ObserverHandle>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            provider_name: DEFAULT_PROVIDER.to_string(),
            client: None,
            max_attempts: None,
            retry_base_delay_ms: 1000,
            model_switch_delay_ms: 1000,
            reset_interval_secs: 60,
            reset_policy: ResetPolicy::default(),
            temperature: 0.4,
            max_tokens: 2048,
            download_timeout_secs: 60,
            observer: None,
        }
    }
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("models", &self.models)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|_| "<dyn ModelClient>"))
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("model_switch_delay_ms", &self.model_switch_delay_ms)
            .field("reset_interval_secs", &self.reset_interval_secs)
            .field("reset_policy", &self.reset_policy)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn InvocationObserver>"))
            .finish()
    }
}

impl AssistantConfig {
    /// Create a new builder for `AssistantConfig`.
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder {
            config: Self::default(),
        }
    }

    /// Attempt budget actually used by the orchestrator.
    pub fn effective_max_attempts(&self) -> usize {
        self.max_attempts.unwrap_or(self.models.len()).max(1)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn model_switch_delay(&self) -> Duration {
        Duration::from_millis(self.model_switch_delay_ms)
    }

    pub fn reset_interval(&self) -> Duration {
        Duration::from_secs(self.reset_interval_secs)
    }
}

/// Builder for [`AssistantConfig`].
#[derive(Debug)]
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl AssistantConfigBuilder {
    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn max_attempts(mut self, n: usize) -> Self {
        self.config.max_attempts = Some(n);
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    pub fn model_switch_delay_ms(mut self, ms: u64) -> Self {
        self.config.model_switch_delay_ms = ms;
        self
    }

    pub fn reset_interval_secs(mut self, secs: u64) -> Self {
        self.config.reset_interval_secs = secs;
        self
    }

    pub fn reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.config.reset_policy = policy;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssistantConfig, ImgEditError> {
        let c = &self.config;
        if c.models.is_empty() {
            return Err(ImgEditError::InvalidConfig(
                "At least one candidate model is required".into(),
            ));
        }
        if let Some(blank) = c.models.iter().position(|m| m.trim().is_empty()) {
            return Err(ImgEditError::InvalidConfig(format!(
                "Candidate model #{} is blank",
                blank + 1
            )));
        }
        if c.max_attempts == Some(0) {
            return Err(ImgEditError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.client.is_none() && c.provider_name.trim().is_empty() {
            return Err(ImgEditError::InvalidConfig(
                "Either a client or a provider name is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// When the registry's inactivity auto-reset is evaluated.
///
/// | Policy | Behaviour |
/// |--------|-----------|
/// | `OnAccess` | Every `current()` lookup checks the interval since the last reset (default) |
/// | `Never` | Selection only moves back to the first candidate on an explicit `reset()` |
///
/// With `OnAccess` the check runs on lookups that are about to fail too, so a
/// sequence of calls spanning more than the interval can revert to the
/// primary model mid-sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    #[default]
    OnAccess,
    Never,
}
