//! Pass Tracker CLI
//!
//! Thin wrapper around passtrack-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Show where data lives and what the view holds
//! passtrack status
//!
//! # Print the reconciled view as JSON
//! passtrack --account alice list
//!
//! # Toggle a conquest (local mode without --account)
//! passtrack conquer alpe-dhuez
//!
//! # Toggle a favorite
//! passtrack --account alice favorite mont-ventoux
//!
//! # Replace the photos of a conquest
//! passtrack --account alice photos alpe-dhuez summit.jpg descent.jpg
//!
//! # Edit notes on a conquest
//! passtrack --account alice notes alpe-dhuez "21 hairpins" --time 01:12:30
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use passtrack_core::logging::LoggingBuilder;
use passtrack_core::{
    Collaborators, ConquestDetails, FeedHub, Identity, MutationOutcome, PassId, Reconciler,
    SessionIdentity, Storage, StorageRemote, TrackerConfig,
};

/// Pass Tracker - conquered and favorite passes
#[derive(Parser)]
#[command(name = "passtrack")]
#[command(version = "0.1.0")]
#[command(about = "Pass Tracker - conquered and favorite passes kept in sync")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Data directory (default: ~/.passtrack/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Account to act as; omit for local-only mode
    #[arg(short, long, global = true)]
    account: Option<String>,

    /// Also write JSONL logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show mode, data location and counts
    Status,

    /// Print the reconciled view as JSON
    List,

    /// Mark a pass conquered, or unmark it
    Conquer {
        /// Pass identifier, e.g. alpe-dhuez
        pass: String,
    },

    /// Star a pass, or unstar it
    Favorite { pass: String },

    /// Replace the photos of a conquest (creates the conquest if needed)
    Photos {
        pass: String,
        /// Photo references; none clears the list
        photos: Vec<String>,
    },

    /// Set notes on an existing conquest
    Notes {
        pass: String,
        text: String,
        /// Completion time, e.g. 01:12:30
        #[arg(long)]
        time: Option<String>,
    },
}

fn setup_logging(verbosity: u8, log_dir: Option<&Path>, session: &str) -> Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    if let Some(log_dir) = log_dir {
        LoggingBuilder::new(log_dir, session)
            .with_filter(filter)
            .init()?;
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
    Ok(())
}

/// Get the default data directory (~/.passtrack/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".passtrack")
        .join("data")
}

fn parse_pass_id(s: &str) -> Result<PassId> {
    PassId::new(s).map_err(|e| anyhow::anyhow!("Invalid pass '{}': {}", s, e))
}

fn report(pass_id: &PassId, state: &str, outcome: MutationOutcome) {
    println!("{}: {} ({})", pass_id, state, outcome);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let account = cli
        .account
        .as_deref()
        .map(Identity::new)
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid account: {}", e))?;
    let session = account
        .as_ref()
        .map_or_else(|| "local".to_string(), |id| id.to_string());
    setup_logging(cli.verbose, cli.log_dir.as_deref(), &session)?;

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let config = TrackerConfig::load_from_dir(&data_dir)?;
    tracing::debug!(data_dir = %data_dir.display(), ?config, "Opening tracker storage");
    let storage = Storage::new(data_dir.join("passtrack.redb"))?;

    let feed = Arc::new(FeedHub::new());
    let remote = StorageRemote::new(storage.clone())
        .with_config(config.backend.clone())
        .with_feed(feed.clone());
    let reconciler = Reconciler::new(
        Collaborators {
            identity: Arc::new(SessionIdentity::with_identity(account.clone())),
            remote: Arc::new(remote),
            feed,
            local: Arc::new(storage),
        },
        config.reconciler,
    );
    reconciler.initialize().await;

    match cli.command {
        Commands::Status => {
            println!("Pass Tracker v0.1.0");
            println!();
            match &account {
                Some(identity) => println!("Account: {}", identity),
                None => println!("Account: (local mode)"),
            }
            println!("Data directory: {}", data_dir.display());
            println!();
            println!("Conquered: {}", reconciler.conquered_pass_ids().len());
            println!("Favorites: {}", reconciler.favorite_pass_ids().len());
            println!("Live subscriptions: {}", reconciler.live_subscriptions());
        }

        Commands::List => {
            println!("{}", serde_json::to_string_pretty(&reconciler.snapshot())?);
        }

        Commands::Conquer { pass } => {
            let pass_id = parse_pass_id(&pass)?;
            let outcome = reconciler.toggle_conquest(&pass_id).await;
            let state = if reconciler.is_conquered(&pass_id) {
                "conquered"
            } else {
                "not conquered"
            };
            report(&pass_id, state, outcome);
        }

        Commands::Favorite { pass } => {
            let pass_id = parse_pass_id(&pass)?;
            let outcome = reconciler.toggle_favorite(&pass_id).await;
            let state = if reconciler.is_favorite(&pass_id) {
                "favorite"
            } else {
                "not favorite"
            };
            report(&pass_id, state, outcome);
            if account.is_none() {
                println!("Note: favorites are not kept in local mode");
            }
        }

        Commands::Photos { pass, photos } => {
            let pass_id = parse_pass_id(&pass)?;
            let outcome = reconciler.save_photos(&pass_id, photos).await;
            let count = reconciler
                .conquest(&pass_id)
                .map_or(0, |record| record.photos.len());
            report(&pass_id, &format!("{} photo(s)", count), outcome);
        }

        Commands::Notes { pass, text, time } => {
            let pass_id = parse_pass_id(&pass)?;
            let details = ConquestDetails {
                personal_notes: Some(text),
                time_completed: time,
            };
            match reconciler.update_details(&pass_id, details).await {
                MutationOutcome::Ignored => {
                    anyhow::bail!("{} is not conquered; conquer it first", pass_id)
                }
                outcome => report(&pass_id, "notes saved", outcome),
            }
        }
    }

    reconciler.shutdown();
    Ok(())
}
