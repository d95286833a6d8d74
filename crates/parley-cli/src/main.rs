//! `parley` — command-line client for Parley conversations.
//!
//! # Usage
//!
//! ```text
//! parley seed
//! parley --user <UUID> conversations --search golf
//! parley --user <UUID> send <CONVERSATION> "Is Thursday OK?"
//! parley --config ~/.config/parley/config.toml --user <UUID> watch <CONVERSATION>
//! ```
//!
//! Without a config file the client uses a local SQLite store at
//! `~/.local/share/parley/parley.db`.

mod commands;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use parley_chat::ChatSession;
use parley_core::backend::ChatBackend;
use parley_rest::RestBackend;
use parley_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::settings::{BackendConfig, ClientConfig, expand_tilde};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Command-line client for Parley conversations")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Act as this user (overrides `user_id` from the config).
  #[arg(short, long)]
  user: Option<Uuid>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List your conversations, most recent first.
  Conversations {
    /// Only show conversations matching this text.
    #[arg(short, long)]
    search: Option<String>,
  },
  /// Print a conversation's messages and mark them read.
  Messages { conversation: Uuid },
  /// Send a text message.
  Send { conversation: Uuid, text: String },
  /// Mark every message in a conversation read.
  Read { conversation: Uuid },
  /// Print your unread message count.
  Unread,
  /// Stream a conversation's messages until Ctrl-C.
  Watch { conversation: Uuid },
  /// Create sample records in the local SQLite store.
  Seed,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = ClientConfig::load(args.config.as_deref())?;
  let user = args.user.or(config.user_id);

  match config.backend {
    BackendConfig::Sqlite { path } => {
      let path = expand_tilde(&path);
      if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
          .with_context(|| format!("failed to create {}", parent.display()))?;
      }

      let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to open store at {path:?}"))?;

      if let Command::Seed = args.command {
        return commands::seed(&store).await;
      }
      run(Arc::new(store), user, args.command).await
    }
    BackendConfig::Rest(rest) => {
      if let Command::Seed = args.command {
        bail!("`seed` is only available with the sqlite backend");
      }
      let backend = RestBackend::new(rest).context("failed to build HTTP client")?;
      run(Arc::new(backend), user, args.command).await
    }
  }
}

async fn run<B>(backend: Arc<B>, user: Option<Uuid>, command: Command) -> Result<()>
where
  B: ChatBackend + 'static,
{
  let user_id = user.context("no user given: pass --user or set user_id in the config")?;
  let session = ChatSession::start(backend, user_id)
    .await
    .context("failed to start chat session")?;

  let result = match command {
    Command::Conversations { search } => commands::conversations(&session, search.as_deref()).await,
    Command::Messages { conversation } => commands::messages(&session, conversation).await,
    Command::Send { conversation, text } => commands::send(&session, conversation, &text).await,
    Command::Read { conversation } => commands::read(&session, conversation).await,
    Command::Unread => commands::unread(&session).await,
    Command::Watch { conversation } => commands::watch(&session, conversation).await,
    Command::Seed => Err(anyhow::anyhow!("`seed` must run before a session is started")),
  };

  session.shutdown().await;
  result
}
