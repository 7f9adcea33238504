//! Error types for the edgequake-imgedit library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`ImgEditError`] — **Fatal** for the operation that raised it: no model
//!   could serve the request, the configuration is invalid, or the input
//!   cannot be loaded. Returned as `Err(ImgEditError)` from the orchestrator
//!   and the loading helpers.
//!
//! * [`ProviderError`] — a single failed call to the AI provider. It never
//!   escapes the orchestrator while attempts remain; the last one is carried
//!   inside [`ImgEditError::ServiceUnavailable`] for diagnostics.
//!
//! The caller-facing operations in [`crate::assistant`] never return
//! `ServiceUnavailable` directly: they turn it into a flagged degraded result.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-imgedit library.
#[derive(Debug, Error)]
pub enum ImgEditError {
    // ── Orchestration errors ──────────────────────────────────────────────
    /// Every attempt against every candidate model failed.
    #[error("AI service unavailable after {attempts} attempt(s): {last_error}")]
    ServiceUnavailable {
        attempts: usize,
        #[source]
        last_error: ProviderError,
    },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are neither a supported image format nor a PDF.
    #[error("Unsupported content '{source_name}': {detail}")]
    UnsupportedContent { source_name: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImgEditError {
    /// `true` for the terminal orchestration failure that callers degrade on.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, ImgEditError::ServiceUnavailable { .. })
    }
}

/// A single failed call to the AI provider.
///
/// The `Display` form is the integration contract with
/// [`crate::classify::classify_failure`]: providers are expected to surface
/// HTTP-status-like substrings ("429", "404", "quota", "not found", …) in the
/// message. `status` is used first when the client knows it.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}
