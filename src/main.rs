//! # Policy Navigator CLI (`pnav`)
//!
//! The `pnav` binary initializes the database, starts the web server, and
//! exposes every server operation on the command line.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pnav init` | Create the SQLite database and run schema migrations |
//! | `pnav serve` | Start the HTTP server and browser UI |
//! | `pnav upload <file.pdf>` | Extract, chunk, and index a PDF |
//! | `pnav documents` | List uploaded documents |
//! | `pnav ask "<question>"` | Answer a question from the documents |
//! | `pnav summary <id>` | Print (and cache) a document summary |
//! | `pnav delete <id>` | Delete a document and its chunks |
//!
//! ## Examples
//!
//! ```bash
//! pnav init --config ./config/pnav.toml
//! pnav upload ./housing-act.pdf
//! pnav ask "Who qualifies for the rent subsidy?" --doc 3f9a21bc
//! pnav serve
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use policy_navigator::{answer, config, documents, ingest, migrate, server};

/// Policy Navigator: upload policy PDFs, read plain-language summaries,
/// and ask questions answered from the documents.
#[derive(Parser)]
#[command(
    name = "pnav",
    about = "Policy Navigator: plain-language summaries and Q&A over policy PDFs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pnav.toml`. A `.env` file in the working
    /// directory is loaded first, so API keys can be kept there.
    #[arg(long, global = true, default_value = "./config/pnav.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents and chunks tables.
    /// Running it multiple times is safe.
    Init,

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind`, serves the JSON API under `/api` and the
    /// browser UI from `[server].static_dir`.
    Serve,

    /// Upload and index a PDF file.
    Upload {
        /// Path to the PDF.
        path: PathBuf,
    },

    /// List uploaded documents.
    Documents,

    /// Ask a question about the uploaded documents.
    Ask {
        /// The question to answer.
        question: String,

        /// Only search this document (by id).
        #[arg(long)]
        doc: Option<String>,
    },

    /// Print a plain-language summary of a document.
    ///
    /// The first request generates the summary with the configured LLM and
    /// caches it; later requests return the cached text.
    Summary {
        /// Document id.
        id: String,
    },

    /// Delete a document, its stored PDF, and its chunks.
    Delete {
        /// Document id.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Upload { path } => {
            ingest::run_upload(&cfg, &path).await?;
        }
        Commands::Documents => {
            documents::run_list(&cfg).await?;
        }
        Commands::Ask { question, doc } => {
            answer::run_ask(&cfg, &question, doc).await?;
        }
        Commands::Summary { id } => {
            answer::run_summary(&cfg, &id).await?;
        }
        Commands::Delete { id } => {
            documents::run_delete(&cfg, &id).await?;
        }
    }

    Ok(())
}
