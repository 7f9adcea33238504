//! Model registry: the ordered candidate list plus the shared selection state.
//!
//! One registry is shared (behind an `Arc`) by every call made through an
//! [`crate::assistant::Assistant`], so a quota failure seen by one request
//! moves the selection forward for all requests scheduled after it. The
//! selection heals itself: once `reset_interval` has passed since the last
//! reset, the next lookup snaps back to the first candidate.
//!
//! ## Concurrency
//!
//! The index and the reset timestamp are plain atomics; no lock is held
//! across an await point or a provider call. Two concurrent failures may both
//! advance the index, which only ever moves it forward and is clamped to
//! `len - 1` by a compare-and-swap, so the index can never leave
//! `[0, len - 1]`.

use crate::config::ResetPolicy;
use crate::error::ImgEditError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

/// Ordered candidate models with the process-wide selection state.
#[derive(Debug)]
pub struct ModelRegistry {
    models: Vec<String>,
    index: AtomicUsize,
    /// Milliseconds since `epoch` at which the selection was last reset.
    last_reset_ms: AtomicU64,
    epoch: Instant,
    reset_interval: Duration,
    policy: ResetPolicy,
}

/// Read-only view of the registry for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub models: Vec<String>,
    pub current_index: usize,
    pub current: String,
}

impl ModelRegistry {
    /// Create a registry with the default 60 s on-access auto-reset.
    ///
    /// # Errors
    /// [`ImgEditError::InvalidConfig`] when `models` is empty.
    pub fn new<I, S>(models: I) -> Result<Self, ImgEditError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_reset(models, Duration::from_secs(60), ResetPolicy::OnAccess)
    }

    pub fn with_reset<I, S>(
        models: I,
        reset_interval: Duration,
        policy: ResetPolicy,
    ) -> Result<Self, ImgEditError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models: Vec<String> = models.into_iter().map(Into::into).collect();
        if models.is_empty() {
            return Err(ImgEditError::InvalidConfig(
                "Model registry needs at least one candidate".into(),
            ));
        }
        Ok(Self {
            models,
            index: AtomicUsize::new(0),
            last_reset_ms: AtomicU64::new(0),
            epoch: Instant::now(),
            reset_interval,
            policy,
        })
    }

    /// The currently selected model, after applying the auto-reset rule.
    pub fn current(&self) -> &str {
        self.apply_auto_reset();
        &self.models[self.current_index()]
    }

    /// Index of the current selection, without applying the auto-reset rule.
    pub fn current_index(&self) -> usize {
        self.index.load(Ordering::Acquire).min(self.models.len() - 1)
    }

    /// Move to the next candidate.
    ///
    /// Returns `false` and leaves the state untouched when the selection is
    /// already on the last candidate.
    pub fn advance(&self) -> bool {
        self.try_advance().is_some()
    }

    /// Like [`advance`](Self::advance), returning the index this call moved
    /// to. Concurrent callers each get the index of their own step.
    pub fn try_advance(&self) -> Option<usize> {
        let last = self.models.len() - 1;
        let moved = self
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| {
                (i < last).then_some(i + 1)
            });
        match moved {
            Ok(prev) => {
                info!(
                    "Model selection advanced: {} → {}",
                    self.models[prev],
                    self.models[prev + 1]
                );
                Some(prev + 1)
            }
            Err(_) => {
                debug!("Model selection already on last candidate");
                None
            }
        }
    }

    /// Select the first candidate and restart the inactivity interval.
    pub fn reset(&self) {
        self.index.store(0, Ordering::Release);
        self.last_reset_ms
            .store(self.elapsed_ms(), Ordering::Release);
    }

    /// All candidates in preference order.
    pub fn list(&self) -> &[String] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Time since the last reset (or since construction).
    pub fn since_last_reset(&self) -> Duration {
        let last = self.last_reset_ms.load(Ordering::Acquire);
        Duration::from_millis(self.elapsed_ms().saturating_sub(last))
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let current_index = self.current_index();
        RegistrySnapshot {
            models: self.models.clone(),
            current_index,
            current: self.models[current_index].clone(),
        }
    }

    fn apply_auto_reset(&self) {
        if self.policy == ResetPolicy::Never {
            return;
        }
        if self.since_last_reset() >= self.reset_interval {
            if self.current_index() != 0 {
                info!(
                    "No reset for {:?}; returning to primary model {}",
                    self.reset_interval, self.models[0]
                );
            }
            self.reset();
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(n: usize) -> ModelRegistry {
        ModelRegistry::new((0..n).map(|i| format!("model-{i}"))).unwrap()
    }

    #[test]
    fn empty_list_is_a_config_error() {
        let err = ModelRegistry::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, ImgEditError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn starts_on_first_candidate() {
        let r = registry(3);
        assert_eq!(r.current(), "model-0");
        assert_eq!(r.list().len(), 3);
    }

    #[tokio::test]
    async fn advance_stops_at_last_candidate() {
        let r = registry(3);
        assert!(r.advance());
        assert_eq!(r.current(), "model-1");
        assert!(r.advance());
        assert_eq!(r.current(), "model-2");
        assert!(!r.advance());
        assert!(!r.advance());
        assert_eq!(r.current(), "model-2");
        assert_eq!(r.current_index(), 2);
    }

    #[tokio::test]
    async fn try_advance_reports_new_index() {
        let r = registry(3);
        assert_eq!(r.try_advance(), Some(1));
        assert_eq!(r.try_advance(), Some(2));
        assert_eq!(r.try_advance(), None);
        assert_eq!(r.current_index(), 2);
    }

    #[tokio::test]
    async fn single_candidate_never_advances() {
        let r = registry(1);
        assert!(!r.advance());
        assert_eq!(r.current(), "model-0");
    }

    #[tokio::test]
    async fn reset_returns_to_first() {
        let r = registry(4);
        r.advance();
        r.advance();
        r.reset();
        assert_eq!(r.current(), "model-0");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_reset_after_inactivity_interval() {
        let r = registry(3);
        r.advance();
        r.advance();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(r.current(), "model-2");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(r.current(), "model-0");
        assert!(r.since_last_reset() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_is_measured_from_last_reset_not_last_failure() {
        let r = registry(3);
        tokio::time::advance(Duration::from_secs(50)).await;
        // A failure late in the window does not extend it.
        r.advance();
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(r.current(), "model-0");
    }

    #[tokio::test(start_paused = true)]
    async fn never_policy_keeps_selection() {
        let r = ModelRegistry::with_reset(["a", "b"], Duration::from_secs(60), ResetPolicy::Never)
            .unwrap();
        r.advance();
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(r.current(), "b");
    }

    #[tokio::test]
    async fn concurrent_advances_stay_in_bounds() {
        let r = std::sync::Arc::new(registry(5));
        let mut handles = Vec::new();
        for _ in 0..32 {
            let r = std::sync::Arc::clone(&r);
            handles.push(tokio::spawn(async move { r.advance() }));
        }
        let mut advanced = 0;
        for h in handles {
            if h.await.unwrap() {
                advanced += 1;
            }
        }
        assert_eq!(advanced, 4);
        assert_eq!(r.current_index(), 4);
    }

    #[tokio::test]
    async fn concurrent_try_advance_hands_out_each_index_once() {
        let r = std::sync::Arc::new(registry(5));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let r = std::sync::Arc::clone(&r);
            handles.push(tokio::spawn(async move { r.try_advance() }));
        }
        let mut got = Vec::new();
        for h in handles {
            if let Some(i) = h.await.unwrap() {
                got.push(i);
            }
        }
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn snapshot_reports_current() {
        let r = registry(2);
        r.advance();
        let snap = r.snapshot();
        assert_eq!(snap.current_index, 1);
        assert_eq!(snap.current, "model-1");
        assert_eq!(snap.models, vec!["model-0", "model-1"]);
    }
}
