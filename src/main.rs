//! # DealDesk CLI (`dealdesk`)
//!
//! Command-line interface for the brokerage document assistant. Provides
//! question answering, search diagnostics, single-document inspection, and
//! the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! dealdesk --config ./config/dealdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dealdesk ask "<question>"` | Answer a question with cited sources |
//! | `dealdesk search "<question>"` | Show the ranked shortlist with scores |
//! | `dealdesk inspect <id>` | Extract and print one document's text |
//! | `dealdesk serve` | Start the JSON HTTP server |
//!
//! ## Credentials
//!
//! The store reads `GOOGLE_SERVICE_ACCOUNT_JSON` (or the key file from
//! `[store].service_account_file`); synthesis reads `OPENAI_API_KEY`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use dealdesk::config::{self, Config};
use dealdesk::drive::DriveStore;
use dealdesk::store::DocumentStore;
use dealdesk::synthesize::OpenAiClient;
use dealdesk::{extract, pipeline, server};

/// DealDesk — document retrieval and question answering for brokerage teams.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dealdesk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dealdesk",
    about = "DealDesk — document retrieval and question answering for brokerage teams",
    version,
    long_about = "DealDesk answers natural-language questions by locating relevant forms and \
    guides in a shared Google Drive, extracting bounded text from them, and synthesizing a short \
    answer with source citations."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/dealdesk.toml`. If the file does not exist,
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/dealdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Answer a question with cited sources.
    ///
    /// Runs the full pipeline: normalize, locate, rank, extract, cite,
    /// synthesize. Prints the answer followed by the source list.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Show the ranked document shortlist for a question.
    ///
    /// Runs location and ranking only, printing each hit with its score
    /// and the lookup tier that found it. Useful for tuning scoring
    /// weights without burning completion tokens.
    Search {
        /// The question or term set to search for.
        question: String,
    },

    /// Extract and print the text of one document.
    ///
    /// Fetches metadata and runs the extractor, printing the bounded text
    /// and any degradation note.
    Inspect {
        /// Document id.
        id: String,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// `/chat`, `/search`, `/read`, and `/health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dealdesk=info")),
        )
        .init();

    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::info!(path = %cli.config.display(), "no config file; using defaults");
        Config::default()
    };

    match cli.command {
        Commands::Ask { question } => {
            let store: Arc<dyn DocumentStore> = Arc::new(DriveStore::new(&cfg.store)?);
            let completion = OpenAiClient::from_env(&cfg.synthesis)?;
            let answer = pipeline::answer_question(store, &completion, &cfg, &question).await?;

            println!("{}\n", answer.answer);
            if !answer.sources.is_empty() {
                println!("Sources:");
                for source in &answer.sources {
                    println!("  {} — {}", source.name, source.url);
                }
            }
        }
        Commands::Search { question } => {
            let store = DriveStore::new(&cfg.store)?;
            let hits = pipeline::search_documents(&store, &cfg, &question).await?;

            if hits.is_empty() {
                println!("No documents found.");
            } else {
                println!("{} document(s):\n", hits.len());
                for hit in &hits {
                    println!("  [{:>4}] {} ({})", hit.score, hit.name, hit.provenance);
                    println!("         {}", hit.url);
                }
            }
        }
        Commands::Inspect { id } => {
            let store = DriveStore::new(&cfg.store)?;
            let handle = store.get_metadata(&id).await?;
            let extracted = extract::extract(&store, &handle, &cfg.extract).await;

            println!("{} ({})", handle.name, handle.content_type);
            if let Some(note) = &extracted.note {
                println!("note: {}", note);
            }
            if extracted.has_text() {
                println!("\n{}", extracted.text);
            }
        }
        Commands::Serve => {
            let store: Arc<dyn DocumentStore> = Arc::new(DriveStore::new(&cfg.store)?);
            let completion = Arc::new(OpenAiClient::from_env(&cfg.synthesis)?);
            server::run_server(&cfg, store, completion).await?;
        }
    }

    Ok(())
}
