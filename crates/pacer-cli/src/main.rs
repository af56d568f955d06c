//! Command-line interface for the Pacer training coach.

mod config;
mod render;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pacer_agent::tools::default_registry;
use pacer_agent::{ConversationStore, RequestContext, ResponseOrchestrator};
use pacer_core::config::env_vars;
use pacer_core::{ConversationDelegate, ToolRegistry};
use pacer_llm::OpenAiCompatBackend;

use config::Settings;
use render::Renderer;

/// Pacer - chat with an endurance coach that manages your training schedule.
#[derive(Parser, Debug)]
#[command(name = "pacer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model identifier.
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Maximum model turns per message.
    #[arg(long, global = true)]
    max_turns: Option<usize>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Chat mode (interactive REPL).
    Chat,
    /// Run a single prompt and exit.
    Prompt {
        /// The prompt to process.
        prompt: String,
    },
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose { "pacer=debug" } else { "pacer=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

/// Everything a conversation needs, shared across messages.
struct Session {
    backend: Arc<OpenAiCompatBackend>,
    registry: Arc<ToolRegistry>,
    store: Arc<ConversationStore>,
    settings: Settings,
}

impl Session {
    fn new(settings: Settings) -> Result<Self> {
        if settings.llm.api_key.is_empty() {
            tracing::warn!("No API key configured; set {}", env_vars::API_KEY);
        }
        let backend = OpenAiCompatBackend::new(settings.llm.clone())
            .context("Failed to create LLM backend")?;
        Ok(Self {
            backend: Arc::new(backend),
            registry: Arc::new(default_registry()),
            store: Arc::new(ConversationStore::new()),
            settings,
        })
    }

    /// Send one user message and wait for the response to finish.
    async fn send(&self, text: &str) -> Result<()> {
        self.store.push_user(text);

        let delegate: Arc<dyn ConversationDelegate> = self.store.clone();
        let (orchestrator, interrupt) = ResponseOrchestrator::new(
            self.backend.clone(),
            self.registry.clone(),
            delegate,
            self.settings.orchestrator.clone(),
        )
        .with_interrupt();

        // Ctrl-C stops the current response instead of the process
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = interrupt.send(true);
            }
        });

        let ctx = RequestContext::new(
            self.settings.llm.api_key.clone(),
            self.settings.llm.model.clone(),
            self.settings.system_prompt.clone(),
        );
        let result = orchestrator.respond(&ctx).await;
        watcher.abort();

        let result = result?;
        tracing::debug!(
            turns = result.turns,
            had_tools = result.had_tools,
            cancelled = result.cancelled,
            "Response finished"
        );
        if result.cancelled {
            println!("[stopped]");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let settings = Settings::resolve(args.config.as_deref(), args.model, args.max_turns)?;
    tracing::debug!(llm = ?settings.llm, orchestrator = ?settings.orchestrator, "Configuration loaded");

    let session = Session::new(settings)?;
    let renderer = tokio::spawn(Renderer::new().run(session.store.subscribe()));

    let outcome = match args.command {
        Command::Prompt { prompt } => session.send(&prompt).await,
        Command::Chat => run_chat(&session).await,
    };

    // Closing the store's channel lets the renderer drain and exit
    drop(session);
    let _ = renderer.await;
    outcome
}

async fn run_chat(session: &Session) -> Result<()> {
    println!("Pacer - Chat Mode");
    println!("=================\n");
    println!("Model: {}", session.settings.llm.model);
    println!("Type 'clear' to start over, 'quit' or 'exit' to leave.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input {
            "" => continue,
            "quit" | "exit" => break,
            "clear" => {
                session.store.clear();
                println!("Conversation cleared.\n");
                continue;
            }
            _ => {}
        }

        if let Err(e) = session.send(input).await {
            tracing::error!("Response failed: {:#}", e);
            eprintln!("Error: {:#}", e);
        }
        println!();
    }

    Ok(())
}
