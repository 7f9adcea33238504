//! CLI binary for edgequake-imgedit.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AssistantConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_imgedit::{
    content, fallback, Assistant, AssistantConfig, FailureKind, InvocationObserver, ObserverHandle,
    ProviderError, ResetPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner naming the model in use, plus one log line
/// per failed attempt and model switch.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Waiting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl InvocationObserver for CliObserver {
    fn on_attempt_start(&self, attempt: usize, model: &str) {
        self.bar.set_prefix(format!("Attempt {}", attempt + 1));
        self.bar.set_message(model.to_string());
    }

    fn on_attempt_failed(&self, _attempt: usize, model: &str, kind: FailureKind, error: &ProviderError) {
        let msg = error.to_string();
        // Truncate very long error messages to keep output tidy.
        let msg = if msg.chars().count() > 80 {
            format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
        } else {
            msg
        };
        self.bar
            .println(format!("  {} {:<24} {:<10} {}", red("✗"), model, kind, dim(&msg)));
    }

    fn on_model_switch(&self, from: &str, to: &str, kind: FailureKind) {
        self.bar
            .println(format!("  {} {} → {} ({})", yellow("↪"), from, to, kind));
    }

    fn on_backoff(&self, _attempt: usize, delay: Duration) {
        self.bar
            .set_message(format!("backing off {:.1}s", delay.as_secs_f64()));
    }

    fn on_success(&self, _attempt: usize, model: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} answered by {}", green("✔"), model);
    }

    fn on_exhausted(&self, attempts: usize, _last_error: &ProviderError) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} no model answered after {} attempt(s); using degraded result",
            red("✘"),
            attempts
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Describe an image
  imgedit analyze photo.jpg --prompt "What is in this picture?"

  # Ask for one structured edit suggestion
  imgedit suggest photo.jpg --json

  # Turn a request into an edit instruction (falls back to rules if the model is down)
  imgedit plan photo.jpg "make it black and white"

  # Rule-based classification only (no API key needed)
  imgedit classify "rotate this 90 degrees"

  # Custom candidate list, most-preferred first
  imgedit --model gemini-2.0-flash --model gemini-1.5-flash plan photo.png "crop to 16:9"

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key (--provider openai)
  ANTHROPIC_API_KEY       Anthropic API key (--provider anthropic)
  IMGEDIT_PROVIDER        Override provider
  IMGEDIT_MODELS          Comma-separated candidate models
"#;

/// Vision-model image edit planning with model fallback.
#[derive(Parser, Debug)]
#[command(
    name = "imgedit",
    version,
    about = "Analyze images and plan edits with vision LLMs, falling back across models",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, global = true, env = "IMGEDIT_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Candidate model, most-preferred first (repeatable).
    #[arg(long = "model", global = true, env = "IMGEDIT_MODELS", value_delimiter = ',')]
    models: Vec<String>,

    /// Attempts per call (default: one per candidate model).
    #[arg(long, global = true, env = "IMGEDIT_MAX_ATTEMPTS")]
    max_attempts: Option<usize>,

    /// Base delay for linear backoff on transient errors, in milliseconds.
    #[arg(long, global = true, env = "IMGEDIT_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Pause after a quota-driven model switch, in milliseconds.
    #[arg(long, global = true, env = "IMGEDIT_SWITCH_DELAY_MS", default_value_t = 1000)]
    switch_delay_ms: u64,

    /// Disable the inactivity auto-reset back to the first model.
    #[arg(long, global = true, env = "IMGEDIT_NO_AUTO_RESET")]
    no_auto_reset: bool,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "IMGEDIT_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, global = true, env = "IMGEDIT_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, global = true, env = "IMGEDIT_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Output JSON instead of text.
    #[arg(long, global = true, env = "IMGEDIT_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "IMGEDIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, global = true, env = "IMGEDIT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Free-form analysis of an image or PDF.
    Analyze {
        /// Local file path or HTTP/HTTPS URL.
        input: String,
        /// What to ask about the content.
        #[arg(long, default_value = "")]
        prompt: String,
    },
    /// One structured edit suggestion.
    Suggest {
        input: String,
        /// Path to a text file with a custom suggestion template.
        #[arg(long)]
        template: Option<std::path::PathBuf>,
    },
    /// Turn a free-text request into an edit instruction.
    Plan { input: String, instruction: String },
    /// Rule-based classification of a request, without calling any model.
    Classify { instruction: String },
    /// List candidate models.
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; keep library logs at
    // error level unless asked for more.
    let show_progress = !cli.quiet && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let observer: Option<ObserverHandle> = if show_progress {
        Some(CliObserver::new() as ObserverHandle)
    } else {
        None
    };
    let timeout = cli.download_timeout;

    match &cli.command {
        // ── Offline commands ─────────────────────────────────────────────
        Command::Classify { instruction } => {
            let edit = fallback::classify(instruction);
            println!(
                "{}",
                serde_json::to_string_pretty(&edit).context("Failed to serialise instruction")?
            );
        }
        Command::Models => {
            let config = build_config(&cli, None)?;
            for (i, m) in config.models.iter().enumerate() {
                println!("{:>2}. {}", i + 1, m);
            }
        }

        // ── Model-backed commands ────────────────────────────────────────
        Command::Analyze { input, prompt } => {
            let assistant = build_assistant(&cli, observer)?;
            let content = content::load(input, timeout)
                .await
                .with_context(|| format!("Failed to load '{input}'"))?;
            let analysis = assistant.analyze(&content, prompt).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                println!("{}", analysis.text);
                if let Some(ref e) = analysis.error {
                    eprintln!("{} {}", yellow("⚠"), dim(e));
                }
            }
        }
        Command::Suggest { input, template } => {
            let template = match template {
                Some(path) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read template from {:?}", path))?,
                None => String::new(),
            };
            let assistant = build_assistant(&cli, observer)?;
            let content = content::load(input, timeout)
                .await
                .with_context(|| format!("Failed to load '{input}'"))?;
            let suggestion = assistant.structured_suggestion(&content, &template).await;
            println!("{}", serde_json::to_string_pretty(&suggestion)?);
        }
        Command::Plan { input, instruction } => {
            let assistant = build_assistant(&cli, observer)?;
            let content = content::load(input, timeout)
                .await
                .with_context(|| format!("Failed to load '{input}'"))?;
            let edit = assistant.plan_edit(&content, instruction).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&edit)?);
            } else {
                println!("{}  {}", edit.action(), edit.parameters());
                println!("{}", dim(&edit.explanation));
                if let Some(ref reason) = edit.fallback_reason {
                    eprintln!("{} rule-based fallback: {}", yellow("⚠"), reason);
                }
            }
        }
    }

    Ok(())
}

fn build_assistant(cli: &Cli, observer: Option<ObserverHandle>) -> Result<Assistant> {
    let config = build_config(cli, observer)?;
    Assistant::new(config).context("Failed to initialise assistant")
}

/// Map CLI args to `AssistantConfig`.
fn build_config(cli: &Cli, observer: Option<ObserverHandle>) -> Result<AssistantConfig> {
    let mut builder = AssistantConfig::builder()
        .provider_name(cli.provider.clone())
        .retry_base_delay_ms(cli.retry_delay_ms)
        .model_switch_delay_ms(cli.switch_delay_ms)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .download_timeout_secs(cli.download_timeout)
        .reset_policy(if cli.no_auto_reset {
            ResetPolicy::Never
        } else {
            ResetPolicy::OnAccess
        });

    if !cli.models.is_empty() {
        builder = builder.models(cli.models.iter().map(|m| m.trim().to_string()));
    }
    if let Some(n) = cli.max_attempts {
        builder = builder.max_attempts(n);
    }
    if let Some(o) = observer {
        builder = builder.observer(o);
    }

    builder.build().context("Invalid configuration")
}
