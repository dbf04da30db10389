//! # sage-agent
//!
//! `sage` binary. The host runtime invokes `sage hook` at each lifecycle
//! point with one JSON payload on stdin and reads the answer from stdout.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sage_hooks::{HookContext, HookResponse, HookType};
use sage_knowledge::DomainMatcher;
use sage_runtime::SageRuntime;
use sage_settings::{SageSettings, load_settings_from_path, settings_path};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{error, warn};

/// Sage knowledge injection and enforcement engine.
#[derive(Parser, Debug)]
#[command(name = sage_core::constants::NAME, version = sage_core::constants::VERSION, about = "Knowledge injection and enforcement hooks")]
struct Cli {
    /// Settings file (defaults to `~/.sage/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer one hook: JSON payload on stdin, JSON response on stdout.
    Hook,
    /// Load and validate settings.
    CheckConfig,
    /// Print the domains a prompt matches.
    Match {
        /// Prompt text.
        prompt: String,
    },
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.settings.clone().unwrap_or_else(settings_path)
    }
}

fn init_logging(settings: Option<&SageSettings>) {
    match settings {
        Some(s) if s.logging.json => sage_core::logging::init_json_subscriber(&s.logging.level),
        Some(s) => sage_core::logging::init_subscriber(&s.logging.level),
        None => sage_core::logging::init_subscriber("warn"),
    }
}

/// Decode a payload and answer it. Every failure becomes `None`.
async fn answer(settings: sage_settings::Result<SageSettings>, input: &str) -> HookResponse {
    let context: HookContext = match serde_json::from_str(input) {
        Ok(context) => context,
        Err(e) => {
            warn!(error = %e, "invalid hook payload");
            return HookResponse::None;
        }
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid settings, answering no-op");
            return HookResponse::None;
        }
    };
    let runtime = match SageRuntime::from_settings(&settings) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start runtime, answering no-op");
            return HookResponse::None;
        }
    };

    let response = runtime.dispatch(&context).await;
    if context.hook_type() == HookType::AgentEnd {
        // The process exits after answering; let mining finish first.
        let _ = runtime.shutdown().await;
    }
    response
}

async fn run_hook(settings: sage_settings::Result<SageSettings>) -> Result<()> {
    let mut input = String::new();
    let read = tokio::io::stdin().read_to_string(&mut input).await;
    let response = match read {
        Ok(_) => answer(settings, &input).await,
        Err(e) => {
            warn!(error = %e, "failed to read hook payload");
            HookResponse::None
        }
    };

    let mut out = serde_json::to_string(&response).unwrap_or_else(|_| r#"{"kind":"none"}"#.to_string());
    out.push('\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(out.as_bytes()).await.context("failed to write hook response")?;
    stdout.flush().await.context("failed to flush hook response")?;
    Ok(())
}

fn check_config(settings: &SageSettings) -> Result<()> {
    let matcher = DomainMatcher::new(&settings.domains).context("domain table")?;
    println!(
        "ok: {} domains ({}), {} rewrite rules, embedding provider {:?}",
        settings.domains.len(),
        matcher.domain_ids().collect::<Vec<_>>().join(", "),
        settings.rewrite_rules.len(),
        settings.embedding.provider,
    );
    Ok(())
}

fn match_prompt(settings: &SageSettings, prompt: &str) -> Result<Vec<String>> {
    let matcher = DomainMatcher::new(&settings.domains).context("domain table")?;
    Ok(matcher.match_text(prompt))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.settings_path();
    let settings = load_settings_from_path(&path);
    init_logging(settings.as_ref().ok());

    match &cli.command {
        Command::Hook => {
            // Exit 0 regardless: the host must never be blocked by Sage.
            if let Err(e) = run_hook(settings).await {
                error!(error = %e, "hook failed");
            }
            Ok(())
        }
        Command::CheckConfig => {
            let settings =
                settings.with_context(|| format!("invalid settings at {}", path.display()))?;
            check_config(&settings)
        }
        Command::Match { prompt } => {
            let settings =
                settings.with_context(|| format!("invalid settings at {}", path.display()))?;
            for domain in match_prompt(&settings, prompt)? {
                println!("{domain}");
            }
            Ok(())
        }
    }
}
