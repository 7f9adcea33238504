//! Model-call orchestration: model selection, failure classification,
//! model switching and retry with backoff.
//!
//! ## Retry Strategy
//!
//! Each attempt asks the [`ModelRegistry`] for the current model (which may
//! snap back to the primary model after the inactivity interval), calls the
//! provider and, on failure, reacts to the [`FailureKind`]:
//!
//! | Kind | Reaction |
//! |------|----------|
//! | `Quota` | advance the registry; if it moved, pause `switch_delay` and retry on the new model |
//! | `NotFound` | advance the registry; if it moved, retry immediately |
//! | `Transient` | stay on the same model, sleep `base_delay * (attempt + 1)` |
//! | `Fatal` | stop; retrying cannot help |
//!
//! A quota or not-found failure on the last candidate (nothing left to
//! advance to) is handled like a transient error. Sleeps are `tokio` sleeps,
//! so a backing-off request never blocks other requests on the executor.
//!
//! With the default budget of one attempt per candidate, a systemic quota
//! event still gets every model one try.

use crate::classify::{classify_failure, FailureKind};
use crate::error::{ImgEditError, ProviderError};
use crate::observer::{InvocationObserver, ObserverHandle};
use crate::provider::{ModelClient, PromptPart};
use crate::registry::ModelRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Outcome of one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    /// Failed, and the loop went on to another attempt.
    TransientFailure,
    /// Failed, and the loop stopped here.
    TerminalFailure,
}

/// Ephemeral record of one attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub attempt: usize,
    pub model: String,
    pub outcome: AttemptOutcome,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A successful orchestrated call.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    /// Raw model text.
    pub text: String,
    /// Model that produced `text`.
    pub model: String,
    pub attempts: Vec<AttemptRecord>,
}

impl Invocation {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Drives calls to a [`ModelClient`] through the shared [`ModelRegistry`].
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    registry: Arc<ModelRegistry>,
    switch_delay: Duration,
    observer: Option<ObserverHandle>,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn ModelClient>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            client,
            registry,
            switch_delay: Duration::from_millis(1000),
            observer: None,
        }
    }

    /// Fixed pause after a quota-driven model switch. Default: 1 s.
    pub fn with_switch_delay(mut self, delay: Duration) -> Self {
        self.switch_delay = delay;
        self
    }

    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Call the provider, switching models and retrying as needed.
    ///
    /// Issues at most `max_attempts` provider calls (at least one).
    ///
    /// # Errors
    /// [`ImgEditError::ServiceUnavailable`] with the last provider error once
    /// the budget is spent or a fatal error is seen.
    pub async fn invoke(
        &self,
        parts: &[PromptPart],
        max_attempts: usize,
        base_delay: Duration,
    ) -> Result<Invocation, ImgEditError> {
        let max_attempts = max_attempts.max(1);
        let mut records = Vec::with_capacity(max_attempts);
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..max_attempts {
            let model = self.registry.current().to_string();
            let is_last = attempt + 1 == max_attempts;
            self.notify(|o| o.on_attempt_start(attempt, &model));
            debug!("Attempt {}/{} with model {}", attempt + 1, max_attempts, model);

            let started = Instant::now();
            let result = self.client.generate(&model, parts).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let error = match result {
                Ok(text) => {
                    info!("Model {} answered on attempt {}", model, attempt + 1);
                    records.push(AttemptRecord {
                        attempt,
                        model: model.clone(),
                        outcome: AttemptOutcome::Success,
                        failure: None,
                        error: None,
                        duration_ms,
                    });
                    self.notify(|o| o.on_success(attempt, &model));
                    return Ok(Invocation {
                        text,
                        model,
                        attempts: records,
                    });
                }
                Err(e) => e,
            };

            let kind = classify_failure(&error);
            warn!(
                "Attempt {}/{} with {} failed ({}): {}",
                attempt + 1,
                max_attempts,
                model,
                kind,
                error
            );
            self.notify(|o| o.on_attempt_failed(attempt, &model, kind, &error));

            let stop = is_last || kind == FailureKind::Fatal;
            records.push(AttemptRecord {
                attempt,
                model: model.clone(),
                outcome: if stop {
                    AttemptOutcome::TerminalFailure
                } else {
                    AttemptOutcome::TransientFailure
                },
                failure: Some(kind),
                error: Some(error.to_string()),
                duration_ms,
            });
            last_error = Some(error);

            if kind == FailureKind::Fatal {
                break;
            }

            let switched = if kind.switches_model() {
                self.registry.try_advance()
            } else {
                None
            };
            if let Some(next) = switched {
                let next = &self.registry.list()[next];
                self.notify(|o| o.on_model_switch(&model, next, kind));
                if kind == FailureKind::Quota && !is_last {
                    self.pause(attempt, self.switch_delay).await;
                }
                continue;
            }

            if !is_last {
                let delay = base_delay * (attempt as u32 + 1);
                self.pause(attempt, delay).await;
            }
        }

        let attempts = records.len();
        let last_error =
            last_error.unwrap_or_else(|| ProviderError::new("no attempt was made"));
        warn!(
            "AI service unavailable after {} attempt(s); last error: {}",
            attempts, last_error
        );
        self.notify(|o| o.on_exhausted(attempts, &last_error));
        Err(ImgEditError::ServiceUnavailable {
            attempts,
            last_error,
        })
    }

    async fn pause(&self, attempt: usize, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        debug!("Backing off {:?} before attempt {}", delay, attempt + 2);
        self.notify(|o| o.on_backoff(attempt, delay));
        sleep(delay).await;
    }

    fn notify(&self, f: impl FnOnce(&dyn InvocationObserver)) {
        if let Some(ref o) = self.observer {
            f(o.as_ref());
        }
    }
}
