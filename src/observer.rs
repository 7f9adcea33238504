//! Observer trait for per-attempt orchestration events.
//!
//! Inject an [`Arc<dyn InvocationObserver>`] via
//! [`crate::config::AssistantConfigBuilder::observer`] to see what the
//! orchestrator is doing while a call is in flight: which model is being
//! tried, why an attempt failed, when the selection moved to another model
//! and how long the next backoff will be.
//!
//! # Example
//!
//! ```rust
//! use edgequake_imgedit::{AssistantConfig, FailureKind, InvocationObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SwitchCounter(AtomicUsize);
//!
//! impl InvocationObserver for SwitchCounter {
//!     fn on_model_switch(&self, from: &str, to: &str, kind: FailureKind) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{from} → {to} ({kind})");
//!     }
//! }
//!
//! let config = AssistantConfig::builder()
//!     .observer(Arc::new(SwitchCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::classify::FailureKind;
use crate::error::ProviderError;
use std::sync::Arc;
use std::time::Duration;

/// Called by the orchestrator as it works through its attempt budget.
///
/// Implementations must be `Send + Sync`: concurrent requests share one
/// orchestrator and may report events from different tasks at once. All
/// methods default to no-ops.
pub trait InvocationObserver: Send + Sync {
    /// Called before the provider is contacted. `attempt` is 0-based.
    fn on_attempt_start(&self, attempt: usize, model: &str) {
        let _ = (attempt, model);
    }

    /// Called when an attempt fails, with its classification.
    fn on_attempt_failed(&self, attempt: usize, model: &str, kind: FailureKind, error: &ProviderError) {
        let _ = (attempt, model, kind, error);
    }

    /// Called after the selection moved to the next candidate.
    fn on_model_switch(&self, from: &str, to: &str, kind: FailureKind) {
        let _ = (from, to, kind);
    }

    /// Called just before the orchestrator sleeps.
    fn on_backoff(&self, attempt: usize, delay: Duration) {
        let _ = (attempt, delay);
    }

    /// Called once when a call succeeds.
    fn on_success(&self, attempt: usize, model: &str) {
        let _ = (attempt, model);
    }

    /// Called once when the attempt budget is exhausted (or a fatal error stops the loop).
    fn on_exhausted(&self, attempts: usize, last_error: &ProviderError) {
        let _ = (attempts, last_error);
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl InvocationObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::AssistantConfig`].
pub type ObserverHandle = Arc<dyn InvocationObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        starts: AtomicUsize,
        failures: AtomicUsize,
        switches: AtomicUsize,
    }

    impl InvocationObserver for Tracking {
        fn on_attempt_start(&self, _attempt: usize, _model: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt_failed(&self, _a: usize, _m: &str, _k: FailureKind, _e: &ProviderError) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_model_switch(&self, _from: &str, _to: &str, _kind: FailureKind) {
            self.switches.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_attempt_start(0, "m");
        o.on_attempt_failed(0, "m", FailureKind::Quota, &ProviderError::new("429"));
        o.on_model_switch("a", "b", FailureKind::Quota);
        o.on_backoff(1, Duration::from_millis(10));
        o.on_success(1, "b");
        o.on_exhausted(2, &ProviderError::new("x"));
    }

    #[test]
    fn tracking_observer_receives_events() {
        let t = Tracking::default();
        t.on_attempt_start(0, "a");
        t.on_attempt_failed(0, "a", FailureKind::Quota, &ProviderError::new("429"));
        t.on_model_switch("a", "b", FailureKind::Quota);
        t.on_attempt_start(1, "b");
        t.on_success(1, "b");
        assert_eq!(t.starts.load(Ordering::SeqCst), 2);
        assert_eq!(t.failures.load(Ordering::SeqCst), 1);
        assert_eq!(t.switches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: ObserverHandle = Arc::new(NoopObserver);
        o.on_attempt_start(0, "gemini-2.5-flash");
    }
}
