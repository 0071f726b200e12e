mod api;
mod commands;
mod gateway;
mod webhook;

#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wabot_channels::WhatsAppTransport;
use wabot_core::{
    config::{self, shellexpand, Config},
    context::Context,
    target::TargetResolver,
    traits::Generator,
};
use wabot_memory::MemoryStore;
use wabot_providers::{GeminiGenerator, IdxScraper};

#[derive(Parser)]
#[command(
    name = "wabot",
    version,
    about = "WhatsApp automation gateway: chat commands, webhook relay and a send API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "WABOT_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to WhatsApp and serve commands and the HTTP API.
    Start,
    /// Print the resolved configuration.
    Status,
    /// Ask a persona one question, without WhatsApp.
    Ask {
        /// Persona name, as configured.
        persona: String,
        /// The question.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Show how a phone number or group id is addressed.
    Resolve {
        identifier: String,
    },
}

/// Stdout logging, plus a daily rolling file under `<data_dir>/logs` when
/// `log_dir` is given. Keep the returned guard alive for the process.
fn init_logging(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    let Some(dir) = log_dir else {
        registry.init();
        return None;
    };
    if let Err(e) = std::fs::create_dir_all(dir) {
        registry.init();
        warn!("cannot create log dir {dir}: {e}, logging to stdout only");
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(dir, "wabot.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    registry
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();
    Some(guard)
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let mut cfg = config::load(path)?;
    cfg.apply_env()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Start => {
            let log_dir = format!("{}/logs", shellexpand(&cfg.bot.data_dir));
            let _guard = init_logging(Some(&log_dir));
            info!("config loaded from {}", cli.config);

            let transport = Arc::new(WhatsAppTransport::new(&cfg.bot.name, &cfg.bot.data_dir));
            let memory = Arc::new(MemoryStore::open(&cfg.memory).await?);
            let generator = Arc::new(GeminiGenerator::from_config(&cfg.gemini));
            if !generator.is_configured() {
                warn!("no Gemini API key: persona and image commands will apologize");
            }
            let market = Arc::new(IdxScraper::from_config(&cfg.market)?);

            println!("{} starting...", cfg.bot.name);
            let gw = gateway::Gateway::new(cfg, transport, memory, generator, market);
            Arc::new(gw).run().await?;
        }
        Commands::Status => {
            let _guard = init_logging(None);
            println!("{} status\n", cfg.bot.name);
            println!("Config: {}", cli.config);
            println!(
                "API: {} on {}:{}",
                if cfg.api.enabled { "enabled" } else { "disabled" },
                cfg.api.host,
                cfg.api.port
            );
            println!(
                "API secret: {}",
                if cfg.api.secret.is_empty() {
                    "NOT SET (send endpoints will refuse every request)"
                } else {
                    "configured"
                }
            );
            println!(
                "Webhook signature check: {}",
                if cfg.api.webhook_secret.is_empty() {
                    "off"
                } else {
                    "on"
                }
            );
            println!("Notification targets: {}", cfg.notify.targets.len());
            for target in &cfg.notify.targets {
                println!("  {target}");
            }
            println!("Muted chats: {}", cfg.bot.muted.len());
            println!("Personas:");
            for p in &cfg.personas {
                println!("  !{} -> {}", p.keyword, p.name);
            }
            println!("Memory file: {}", shellexpand(&cfg.memory.path));
            println!(
                "Gemini: {} ({})",
                if cfg.gemini.api_key.trim().is_empty() {
                    "not configured"
                } else {
                    "configured"
                },
                cfg.gemini.model
            );
        }
        Commands::Ask { persona, message } => {
            let _guard = init_logging(None);
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: wabot ask <persona> <message>");
            }

            let generator = GeminiGenerator::from_config(&cfg.gemini);
            let context = Context::for_persona(&persona, &message.join(" "));
            let answer = generator.generate(&context).await?;
            println!("{answer}");
        }
        Commands::Resolve { identifier } => {
            let resolver = TargetResolver::new(&cfg.bot.country_code);
            match resolver.resolve(&identifier) {
                Ok(target) => println!("{} {}", target.kind, target.address()),
                Err(e) => anyhow::bail!("{e}"),
            }
        }
    }

    Ok(())
}
