//! # Knowledge Assistant CLI (`ka`)
//!
//! ## Usage
//!
//! ```bash
//! ka --config ./config/ka.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ka init` | Create the SQLite database and run schema migrations |
//! | `ka upload "<text>"` | Embed and store a document (or `--file <path>`) |
//! | `ka ask "<question>"` | Answer a question from the closest document |
//! | `ka documents` | List stored documents |
//! | `ka serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use knowledge_assistant::{config, knowledge, logging, migrate, server};
use std::path::PathBuf;

/// Knowledge Assistant CLI: answer questions from your own documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ka.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ka",
    about = "Knowledge Assistant: answer questions from the closest stored document",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ka.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents and users tables.
    /// Running it multiple times is safe.
    Init,

    /// Embed and store a document.
    Upload {
        /// Document text. Omit when using `--file`.
        text: Option<String>,

        /// Read the document from a file instead.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Username recorded as the document's owner.
        #[arg(long)]
        owner: Option<String>,
    },

    /// Ask a question.
    Ask {
        /// The question to answer.
        question: String,

        /// Also print the retrieval outcome, best score and policy.
        #[arg(long)]
        explain: bool,
    },

    /// List stored documents.
    Documents,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json)?;

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { text, file, owner } => {
            knowledge::run_upload(&cfg, text.as_deref(), file.as_deref(), owner.as_deref())
                .await?;
        }
        Commands::Ask { question, explain } => {
            knowledge::run_ask(&cfg, &question, explain).await?;
        }
        Commands::Documents => {
            knowledge::run_list_documents(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
