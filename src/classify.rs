//! Failure classification for provider errors.
//!
//! The orchestrator never inspects error messages itself; it asks
//! [`classify_failure`] which bucket a failed call belongs to and acts on the
//! bucket. Integrating a provider with a different error taxonomy means
//! mapping its errors here (or onto these textual signatures in its
//! [`crate::provider::ModelClient`] implementation).
//!
//! | Kind | Signatures | Orchestrator reaction |
//! |------|-----------|-----------------------|
//! | `Quota` | status 429, "429", "quota", "Too Many Requests" | advance model, fixed pause |
//! | `NotFound` | status 404, "404", "not found" | advance model, no pause |
//! | `Fatal` | status 401/403, a standalone "401"/"403", "api key not valid", "unauthorized", "permission denied" | stop immediately |
//! | `Transient` | anything else | linear backoff on the same model |

use crate::error::ProviderError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Auth status codes as whole words, so ids and durations such as
/// "14030 ms" are not mistaken for them.
static RE_AUTH_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b40[13]\b").unwrap());

/// Classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Quota exhausted or rate limited on the current model.
    Quota,
    /// The current model id does not exist for this account/region.
    NotFound,
    /// Network blip, 5xx, timeout or anything unrecognised.
    Transient,
    /// Retrying cannot help (bad credentials).
    Fatal,
}

impl FailureKind {
    /// Whether this failure should move the selection to the next model.
    pub fn switches_model(&self) -> bool {
        matches!(self, FailureKind::Quota | FailureKind::NotFound)
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::Fatal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Quota => "quota",
            FailureKind::NotFound => "not_found",
            FailureKind::Transient => "transient",
            FailureKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a provider error. Status codes win over message text.
pub fn classify_failure(error: &ProviderError) -> FailureKind {
    match error.status {
        Some(429) => FailureKind::Quota,
        Some(404) => FailureKind::NotFound,
        Some(401) | Some(403) => FailureKind::Fatal,
        _ => classify_message(&error.message),
    }
}

/// Classify a raw error message by its textual signatures.
pub fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();

    if message.contains("429") || lower.contains("quota") || lower.contains("too many requests") {
        return FailureKind::Quota;
    }
    if message.contains("404") || lower.contains("not found") {
        return FailureKind::NotFound;
    }
    if RE_AUTH_STATUS.is_match(message)
        || lower.contains("api key not valid")
        || lower.contains("unauthorized")
        || lower.contains("permission denied")
    {
        return FailureKind::Fatal;
    }
    FailureKind::Transient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_signatures() {
        assert_eq!(classify_message("429 Too Many Requests"), FailureKind::Quota);
        assert_eq!(
            classify_message("[GoogleGenerativeAI Error]: You exceeded your current quota"),
            FailureKind::Quota
        );
        assert_eq!(classify_message("too many requests"), FailureKind::Quota);
    }

    #[test]
    fn not_found_signatures() {
        assert_eq!(
            classify_message("404 models/gemini-pro-vision is not found for API version v1beta"),
            FailureKind::NotFound
        );
        assert_eq!(classify_message("Model Not Found"), FailureKind::NotFound);
    }

    #[test]
    fn quota_wins_over_not_found() {
        assert_eq!(
            classify_message("429: quota for model not found tier"),
            FailureKind::Quota
        );
    }

    #[test]
    fn auth_errors_are_fatal() {
        assert_eq!(classify_message("API key not valid. Please pass a valid API key."), FailureKind::Fatal);
        assert_eq!(classify_message("HTTP 403 Forbidden"), FailureKind::Fatal);
        assert_eq!(classify_message("status 401: Unauthorized"), FailureKind::Fatal);
    }

    #[test]
    fn auth_digits_inside_numbers_are_transient() {
        assert_eq!(
            classify_message("error sending request: operation timed out after 14030 ms"),
            FailureKind::Transient
        );
        assert_eq!(
            classify_message("upstream reset, request id 8401377"),
            FailureKind::Transient
        );
    }

    #[test]
    fn everything_else_is_transient() {
        assert_eq!(classify_message("connection reset by peer"), FailureKind::Transient);
        assert_eq!(classify_message("503 Service Unavailable"), FailureKind::Transient);
        assert_eq!(classify_message(""), FailureKind::Transient);
    }

    #[test]
    fn status_takes_precedence() {
        let e = ProviderError::new("upstream said no").with_status(429);
        assert_eq!(classify_failure(&e), FailureKind::Quota);
        let e = ProviderError::new("rate limited?").with_status(404);
        assert_eq!(classify_failure(&e), FailureKind::NotFound);
        let e = ProviderError::new("something").with_status(500);
        assert_eq!(classify_failure(&e), FailureKind::Transient);
    }

    #[test]
    fn classification_is_stable() {
        let e = ProviderError::new("429 Too Many Requests");
        assert_eq!(classify_failure(&e), classify_failure(&e));
    }

    #[test]
    fn switching_kinds() {
        assert!(FailureKind::Quota.switches_model());
        assert!(FailureKind::NotFound.switches_model());
        assert!(!FailureKind::Transient.switches_model());
        assert!(!FailureKind::Fatal.is_retryable());
    }
}
