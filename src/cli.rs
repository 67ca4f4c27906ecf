//! Command-line arguments and command execution.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use gateway_config::{load_config, GatewayConfig};
use gateway_core::{GenerateTextOptions, LanguageModel, StreamEvent};
use gateway_providers::Registry;
use gateway_telemetry::init_logging;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run prompts against configured language-model targets
#[derive(Parser, Debug)]
#[command(name = "llm-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $GATEWAY_CONFIG, then gateway.yaml)
    #[arg(short, long, env = "GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Target name; defaults to `default_target` or the only configured target
    #[arg(short, long)]
    pub target: Option<String>,

    /// Print text as it streams
    #[arg(short, long)]
    pub stream: bool,

    /// Print the full result as JSON
    #[arg(long, global = true, conflicts_with = "stream")]
    pub json: bool,

    /// Prompt text
    pub prompt: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured targets with provider and capabilities
    Targets,
}

impl Cli {
    /// Execute the parsed command
    pub async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())
            .await
            .context("failed to load configuration")?;
        if let Err(err) = init_logging(&config.logging) {
            eprintln!("{err}");
        }

        let registry = Registry::from_config(&config)?;
        let outcome = match self.command {
            Some(Commands::Targets) => list_targets(&config, &registry, self.json),
            None => {
                let prompt = self
                    .prompt
                    .as_deref()
                    .ok_or_else(|| anyhow!("a prompt is required"))?;
                let model = select_model(&config, &registry, self.target.as_deref())?;
                if self.stream {
                    stream_prompt(model.as_ref(), prompt).await
                } else {
                    run_prompt(model.as_ref(), prompt, self.json).await
                }
            }
        };

        if let Err(err) = registry.close_all().await {
            warn!(error = %err, "Failed to close models");
        }
        outcome
    }
}

fn select_model(
    config: &GatewayConfig,
    registry: &Registry,
    target: Option<&str>,
) -> Result<Arc<dyn LanguageModel>> {
    let name = target
        .or_else(|| config.default_target_name())
        .ok_or_else(|| anyhow!("several targets are configured; pass --target"))?;
    debug!(target_name = name, "Selected target");
    registry
        .get(name)
        .ok_or_else(|| anyhow!("unknown target '{name}'"))
}

async fn run_prompt(model: &dyn LanguageModel, prompt: &str, json: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let result = model
        .generate_text(&GenerateTextOptions::from_prompt(prompt), &cancel)
        .await?;

    info!(
        model = %result.model_id,
        input_tokens = result.usage.input_tokens,
        output_tokens = result.usage.output_tokens,
        "Generation finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.text());
        for call in result.tool_calls() {
            println!("[tool call {} {}({})]", call.id, call.name, call.arguments);
        }
    }
    Ok(())
}

async fn stream_prompt(model: &dyn LanguageModel, prompt: &str) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut stream = model.stream_text(&GenerateTextOptions::from_prompt(prompt), &cancel)?;
    let mut stdout = std::io::stdout();
    while stream.next().await {
        match stream.current() {
            Some(StreamEvent::ContentDelta(text)) => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            Some(StreamEvent::ToolCallDelta(delta)) => {
                if let Some(call) = &delta.completed {
                    writeln!(stdout, "\n[tool call {} {}({})]", call.id, call.name, call.arguments)?;
                }
            }
            _ => {}
        }
    }
    writeln!(stdout)?;

    if let Some(err) = stream.err() {
        return Err(err.clone().into());
    }
    if let Some(StreamEvent::MessageDone { stop_reason, usage }) = stream.current() {
        info!(
            stop_reason = ?stop_reason,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Stream finished"
        );
    }
    Ok(())
}

fn list_targets(config: &GatewayConfig, registry: &Registry, json: bool) -> Result<()> {
    let mut rows = Vec::new();
    for name in registry.names() {
        let Some(model) = registry.get(name) else { continue };
        let capabilities: Vec<String> = model
            .capabilities()
            .list()
            .iter()
            .map(ToString::to_string)
            .collect();
        let is_default = config.default_target_name() == Some(name);
        rows.push(serde_json::json!({
            "name": name,
            "provider": model.provider(),
            "model": model.model_id(),
            "default": is_default,
            "capabilities": capabilities,
        }));
        if !json {
            let marker = if is_default { "*" } else { " " };
            println!(
                "{marker} {name:<16} {:<10} {:<28} {}",
                model.provider(),
                model.model_id(),
                capabilities.join(",")
            );
        }
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    Ok(())
}
