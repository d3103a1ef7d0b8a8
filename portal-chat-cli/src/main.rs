//! CLI entry point for portal-chat

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use portal_chat_core::config::{Config, ConfigLoader, LoggingConfig};
use portal_chat_core::delivery::CannedReply;
use portal_chat_core::kv::FileStore;
use portal_chat_core::logging::init_logging;
use portal_chat_core::session::Role;
use portal_chat_core::utils::expand_home;
use portal_chat_core::{ChatService, ChatSessionManager, ChatSettings, DeliveryTiming};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "portal-chat")]
#[command(about = "Student portal chat assistant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },
    /// Send a message and stream the assistant's reply
    Send {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Continue an existing session instead of starting a new one
        #[arg(short, long)]
        session: Option<String>,
    },
    /// List chat sessions, most recent first
    Sessions {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the messages of a session
    Show {
        /// Session id
        session: String,
    },
    /// Delete all chat history
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    if let Commands::Init { force } = &cli.command {
        return run_init(&loader, *force);
    }

    let config = loader.load().context("Failed to load configuration")?;
    let _guard = init_logging(&resolve_logging(loader.config_dir(), &config.logging));
    let service = build_service(&config);

    match cli.command {
        Commands::Init { force } => run_init(&loader, force)?,
        Commands::Send { message, session } => {
            run_send(&service, &message, session.as_deref()).await?;
        }
        Commands::Sessions { json } => run_sessions(&service, json)?,
        Commands::Show { session } => run_show(&service, &session)?,
        Commands::Clear => {
            info!("Clearing chat history");
            service.clear_history();
            println!("{}", style("Chat history cleared.").green());
        }
    }

    Ok(())
}

/// Relative log directories live under the config directory
fn resolve_logging(config_dir: &Path, logging: &LoggingConfig) -> LoggingConfig {
    let mut resolved = logging.clone();
    let dir = expand_home(&logging.dir);
    resolved.dir = if dir.is_absolute() {
        dir.to_string_lossy().to_string()
    } else {
        config_dir.join(dir).to_string_lossy().to_string()
    };
    resolved
}

fn build_service(config: &Config) -> ChatService {
    let store = FileStore::new(expand_home(&config.storage.dir));
    let manager = ChatSessionManager::builder(Arc::new(store))
        .settings(ChatSettings::from(&config.chat))
        .reply_source(Arc::new(CannedReply::new(config.chat.canned_reply.clone())))
        .build();
    ChatService::new(manager, DeliveryTiming::from(&config.chat))
}

fn run_init(loader: &ConfigLoader, force: bool) -> Result<()> {
    let config_path = loader.config_dir().join("config.json");
    if config_path.exists() && !force {
        println!(
            "{} {}",
            style("Configuration already exists at").yellow(),
            config_path.display()
        );
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    loader.save(&Config::default())?;
    println!(
        "{} {}",
        style("Configuration written to").green().bold(),
        config_path.display()
    );
    Ok(())
}

async fn run_send(service: &ChatService, message: &str, session: Option<&str>) -> Result<()> {
    if let Some(id) = session {
        if service.load_session(id).is_none() {
            warn!("Session {} not found, starting a new one", id);
            println!(
                "{}",
                style(format!("Session {} not found; starting a new chat.", id)).yellow()
            );
        }
    }

    let mut rx = service.subscribe();
    let Some(receipt) = service.send_user_message(message) else {
        anyhow::bail!("Message is empty");
    };
    info!(
        "Sent message {} in session {}",
        receipt.message_id, receipt.session_id
    );

    println!("{} {}", style("You:").bold().cyan(), message.trim());
    print!("{} ", style("Assistant:").bold().green());
    std::io::stdout().flush()?;

    let mut printed = 0;
    loop {
        let (text, streaming) = {
            let view = rx.borrow_and_update();
            let text = view
                .messages
                .last()
                .filter(|m| m.role == Role::Assistant)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            (text, view.is_streaming)
        };

        let delta: String = text.chars().skip(printed).collect();
        if !delta.is_empty() {
            print!("{}", delta);
            std::io::stdout().flush()?;
            printed += delta.chars().count();
        }

        if !streaming || rx.changed().await.is_err() {
            break;
        }
    }

    println!();
    println!("{}", style(format!("session: {}", receipt.session_id)).dim());
    Ok(())
}

fn run_sessions(service: &ChatService, json: bool) -> Result<()> {
    let sessions = service.list_sessions();

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No chat sessions yet.");
        return Ok(());
    }

    println!("{}", style("Chat Sessions").bold().cyan());
    for summary in sessions {
        let when = summary
            .last_modified
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M");
        println!(
            "  {}  {}  {}",
            style(when).dim(),
            style(&summary.id).yellow(),
            summary.title
        );
    }
    Ok(())
}

fn run_show(service: &ChatService, session: &str) -> Result<()> {
    let messages = service
        .load_session(session)
        .ok_or_else(|| anyhow::anyhow!("Session not found: {}", session))?;

    for message in messages {
        let label = match message.role {
            Role::User => style("You:").bold().cyan(),
            Role::Assistant => style("Assistant:").bold().green(),
        };
        println!("{} {}\n", label, message.content);
    }
    Ok(())
}
