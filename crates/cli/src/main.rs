//! Support Chat CLI - talk to support staff from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # List admins, optionally filtered by name or email
//! support-chat admins --search linh
//!
//! # Fetch and store the unread summary
//! support-chat unread
//!
//! # Send one message
//! support-chat send --admin 65a1f0 "Hello, I need help with my order"
//!
//! # Interactive session
//! support-chat chat --admin 65a1f0
//! ```
//!
//! # Commands
//!
//! - `admins` - List admins with unread badges
//! - `unread` - Refresh the unread summary
//! - `send` - Send a single message
//! - `chat` - Interactive two-pane session
//!
//! Configuration is read from the environment (see
//! [`support_chat_client::config`]); `--api-url` and `--token` override it.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use support_chat_client::ClientConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "support-chat")]
#[command(author, version, about = "Support chat client")]
struct Cli {
    /// Backend base URL (overrides `SUPPORT_CHAT_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token (overrides `SUPPORT_CHAT_TOKEN`)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List admins you can talk to
    Admins {
        /// Case-insensitive filter on name or email
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Fetch the unread summary and store it locally
    Unread,
    /// Send a single message
    Send {
        /// Admin id
        #[arg(short, long)]
        admin: String,

        /// Message text
        message: String,
    },
    /// Start an interactive chat session
    Chat {
        /// Open the conversation with this admin immediately
        #[arg(short, long)]
        admin: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so they never interleave with the rendered chat.
fn init_tracing() {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "support_chat=info,support_chat_client=info".into());

    let json = std::env::var("SUPPORT_CHAT_LOG_JSON").is_ok_and(|v| v != "0" && !v.is_empty());
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Environment configuration with command-line overrides applied.
fn load_config(
    api_url: Option<&str>,
    token: Option<String>,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match api_url {
        Some(url) => ClientConfig::from_lookup(|key| {
            if key == "SUPPORT_CHAT_API_URL" {
                Some(url.to_string())
            } else {
                std::env::var(key).ok()
            }
        })?,
        None => ClientConfig::from_env()?,
    };
    if let Some(token) = token {
        config = config.with_token(SecretString::from(token));
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.api_url.as_deref(), cli.token)?;
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Admins { search } => commands::admins::list(&config, search.as_deref()).await?,
        Commands::Unread => commands::unread::refresh(&config).await?,
        Commands::Send { admin, message } => commands::send::send(&config, &admin, &message).await?,
        Commands::Chat { admin } => commands::chat::run(&config, admin.as_deref()).await?,
    }
    Ok(())
}
