//! # edgequake-imgedit
//!
//! Model fallback, retry and rule-based degradation for vision-model image
//! editing services.
//!
//! ## Why this crate?
//!
//! Hosted vision models fail in ways that have nothing to do with the request:
//! a free-tier model runs out of quota, a model id is retired, the network
//! blips. An upload service that surfaces those failures to its users is
//! fragile. This crate wraps the provider call with an orchestrator that
//! walks an ordered list of candidate models, retries with backoff, and, when
//! nothing answers, falls back to deterministic keyword rules so the caller
//! still gets a usable edit instruction.
//!
//! ## Call Flow
//!
//! ```text
//! caller ──▶ Assistant ──▶ Orchestrator ──▶ ModelClient (edgequake-llm)
//!                │              │
//!                │              ├─ ModelRegistry   current / advance / auto-reset
//!                │              └─ classify        quota / not-found / transient / fatal
//!                │
//!                ├─ interpret   JSON out of fenced, chatty model text
//!                └─ fallback    keyword rules when the model is unavailable
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_imgedit::{content, Assistant, AssistantConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider credentials come from GEMINI_API_KEY (or the provider's usual variable).
//!     let assistant = Assistant::new(AssistantConfig::default())?;
//!     let photo = content::load("photo.jpg", 60).await?;
//!     let edit = assistant.plan_edit(&photo, "make it black and white").await;
//!     println!("{}", serde_json::to_string_pretty(&edit)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `imgedit` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assistant;
pub mod classify;
pub mod config;
pub mod content;
pub mod error;
pub mod fallback;
pub mod instruction;
pub mod interpret;
pub mod observer;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod registry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assistant::{Analysis, Assistant, Suggestion};
pub use classify::{classify_failure, FailureKind};
pub use config::{AssistantConfig, AssistantConfigBuilder, ResetPolicy};
pub use content::Content;
pub use error::{ImgEditError, ProviderError};
pub use instruction::{EditAction, EditInstruction, EditOperation};
pub use interpret::extract_structured;
pub use observer::{InvocationObserver, NoopObserver, ObserverHandle};
pub use orchestrator::{AttemptOutcome, AttemptRecord, Invocation, Orchestrator};
pub use provider::{LlmModelClient, ModelClient, PromptPart};
pub use registry::{ModelRegistry, RegistrySnapshot};
