use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use crate::config::{CliOverrides, Config, load_config};
use crate::conversation::{ConversationManager, ConversationSettings};
use crate::gateway::GroqGateway;
use crate::server::{self, AppState};
use crate::session::{SessionStore, SystemClock};

#[derive(Parser)]
#[command(name = "solvemate")]
#[command(about = "SolveMate - homework tutor chat backend")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP chat backend
    Serve {
        /// Address to listen on, e.g. 0.0.0.0:5000
        #[arg(long)]
        bind: Option<String>,

        /// Model name sent to the completion API
        #[arg(long)]
        model: Option<String>,

        /// Path to a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Display version information
    Version,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Version) => {
            print_version();
            Ok(())
        }
        Some(Commands::Serve {
            bind,
            model,
            config,
        }) => {
            let overrides = CliOverrides {
                model,
                bind_addr: bind,
                config_path: config,
            };
            let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
            runtime.block_on(serve(overrides))
        }
        None => {
            // No subcommand provided - show help
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    }
}

async fn serve(overrides: CliOverrides) -> Result<()> {
    let config = load_config(&overrides)?;
    let manager = Arc::new(build_manager(&config)?);

    let (cleanup_handle, cleanup_stop) = manager
        .store()
        .start_cleanup_task(config.sweep_interval());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    let result = server::serve(
        listener,
        AppState::new(Arc::clone(&manager)),
        server::shutdown_signal(),
    )
    .await;

    let _ = cleanup_stop.send(()).await;
    if let Err(e) = cleanup_handle.await {
        tracing::warn!("Session sweep task ended abnormally: {}", e);
    }

    result
}

/// Wires store, gateway and manager from the effective config
pub fn build_manager(config: &Config) -> Result<ConversationManager> {
    let gateway = GroqGateway::new(config.groq_config())
        .context("Cannot create Groq client; set GROQ_API_KEY or groq_api_key in the config file")?;

    let store = SessionStore::new(config.session_settings(), Arc::new(SystemClock));

    tracing::info!(
        model = %config.model,
        session_ttl_secs = config.session_ttl_secs,
        "Conversation manager ready"
    );

    Ok(ConversationManager::new(
        store,
        Arc::new(gateway),
        ConversationSettings::new(config.model.clone(), config.decoding_params()),
    ))
}

pub fn extract_command_from_error(error_msg: &str) -> String {
    // Messages look like: "error: unrecognized subcommand 'invalid_command'"
    if let Some(start) = error_msg.find('\'') {
        if let Some(end) = error_msg[start + 1..].find('\'') {
            return error_msg[start + 1..start + 1 + end].to_string();
        }
    }
    "unknown".to_string()
}

fn print_version() {
    println!("solvemate {}", env!("CARGO_PKG_VERSION"));
}
