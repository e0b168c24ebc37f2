//! tabby binary entry point.
//!
//! Wires config → provider → tools → agent → gateway → channels.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use tabby::agent::Agent;
use tabby::channels::{CliChannel, InboundMessage};
use tabby::config::{Config, ProviderKind};
use tabby::gateway::{Gateway, LoggingMiddleware, RateLimitMiddleware};
use tabby::memory::Memory;
use tabby::providers::{AnthropicProvider, LLMProvider, OpenAIProvider};
use tabby::session::SessionStore;
use tabby::tools::{builtin_tools, ToolRegistry};
use tabby::utils::init_logging;

#[derive(Parser)]
#[command(name = "tabby", version, about = "Lightweight conversational-agent runtime")]
struct Cli {
    /// Path to the config file (default: ~/.tabby/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat on the terminal (default)
    Chat,
    /// Send one message through the gateway and print the reply
    Ask {
        /// The message to send
        message: String,
    },
    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },
}

#[derive(Subcommand)]
enum SessionsCommand {
    /// List stored session keys
    List,
    /// Delete a session by key
    Reset {
        /// Canonical session key (agent:<id>:<channel>:<type>:<chat>)
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config.logging);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(config).await,
        Command::Ask { message } => ask(config, &message).await,
        Command::Sessions { command } => sessions(config, command).await,
    }
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn LLMProvider>> {
    let anthropic_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
    let openai_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

    let kind = match config.provider.kind {
        ProviderKind::Auto => {
            if !anthropic_key.is_empty() {
                ProviderKind::Anthropic
            } else if !openai_key.is_empty() {
                ProviderKind::Openai
            } else {
                bail!("set ANTHROPIC_API_KEY or OPENAI_API_KEY");
            }
        }
        kind => kind,
    };

    match kind {
        ProviderKind::Anthropic => {
            if anthropic_key.is_empty() {
                bail!("ANTHROPIC_API_KEY is not set");
            }
            let mut provider = AnthropicProvider::new(&anthropic_key);
            if !config.provider.model.is_empty() {
                provider = provider.with_model(&config.provider.model);
            }
            Ok(Arc::new(provider))
        }
        ProviderKind::Openai => {
            if openai_key.is_empty() {
                bail!("OPENAI_API_KEY is not set");
            }
            let mut provider = OpenAIProvider::new(&openai_key);
            if !config.provider.api_base.is_empty() {
                provider = provider.with_api_base(&config.provider.api_base);
            }
            if !config.provider.model.is_empty() {
                provider = provider.with_model(&config.provider.model);
            }
            Ok(Arc::new(provider))
        }
        ProviderKind::Auto => unreachable!("resolved above"),
    }
}

fn build_gateway(config: &Config) -> anyhow::Result<Gateway> {
    let provider = build_provider(config)?;

    let memory = Memory::new(config.workspace_dir());
    memory.init().context("failed to initialize workspace")?;

    let mut tools = ToolRegistry::new();
    for tool in builtin_tools() {
        tools.register(tool);
    }

    let agent =
        Agent::new(provider, tools, config.agent.clone()).with_memory(Arc::new(memory));

    let store = SessionStore::new(config.session_dir())
        .context("failed to create session directory")?;

    let mut gateway = Gateway::new(Arc::new(agent), config.gateway.clone(), store);
    gateway.use_middleware(Arc::new(LoggingMiddleware));
    if config.rate_limit.per_minute > 0 {
        gateway.use_middleware(Arc::new(RateLimitMiddleware::per_minute(
            config.rate_limit.per_minute,
        )));
    }
    Ok(gateway)
}

async fn chat(config: Config) -> anyhow::Result<()> {
    let mut gateway = build_gateway(&config)?;
    gateway.add_channel(Arc::new(CliChannel::new()));
    Arc::new(gateway).run().await?;
    Ok(())
}

async fn ask(config: Config, message: &str) -> anyhow::Result<()> {
    let gateway = build_gateway(&config)?;
    let msg = InboundMessage::new("cli", "user", "local", message);

    match gateway.process(&msg).await? {
        Some(reply) if !reply.is_empty() => println!("{}", reply),
        _ => println!("(no reply)"),
    }
    Ok(())
}

async fn sessions(config: Config, command: SessionsCommand) -> anyhow::Result<()> {
    let store = SessionStore::new(config.session_dir())?;
    match command {
        SessionsCommand::List => {
            let keys = store.list().await;
            if keys.is_empty() {
                println!("(no sessions)");
            }
            for key in keys {
                println!("{}", key);
            }
        }
        SessionsCommand::Reset { key } => {
            store.delete(&key).await;
            println!("reset {}", key);
        }
    }
    Ok(())
}
