// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::info;
use updraft::commands::{AppUpdaterCommand, UninstallCommand};
use updraft::content::ContentSummary;
use updraft::local::{LocalDirectory, SqliteMetaData, installed_version_id};
use updraft::status::UpdaterStatus;
use updraft::updater::{AppUpdater, AppUpdaterContext, UpdateOutcome, UpdaterConfig};
use updraft::CancellationToken;

/// How often the main thread samples pipeline progress
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "updraft")]
#[command(author, version, about = "Self-updating content installer with version-tracked files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the installed file registry
    Init {
        /// Updater configuration file
        #[arg(short, long, default_value = "updraft.json")]
        config: PathBuf,
    },
    /// Install the latest version if it is not installed yet
    Update {
        /// Content summary JSON of the latest version
        #[arg(short, long)]
        summary: PathBuf,
        /// Latest version id
        #[arg(short = 'v', long)]
        version_id: i64,
        /// Content source: http(s):// base URL or local mirror directory
        #[arg(long)]
        source: String,
        /// Updater configuration file
        #[arg(short, long, default_value = "updraft.json")]
        config: PathBuf,
    },
    /// List installed files
    List {
        /// Updater configuration file
        #[arg(short, long, default_value = "updraft.json")]
        config: PathBuf,
    },
    /// Remove every installed file
    Uninstall {
        /// Updater configuration file
        #[arg(short, long, default_value = "updraft.json")]
        config: PathBuf,
    },
}

/// Log overall progress until the worker finishes
fn watch_progress(status: &UpdaterStatus, worker: &thread::JoinHandle<updraft::Result<UpdateOutcome>>) {
    let mut last_percent = None;
    while !worker.is_finished() {
        let snapshot = status.snapshot();
        let percent = (snapshot.progress * 100.0).floor() as u32;
        if last_percent != Some(percent) {
            info!(
                "{:>3}% {}",
                percent,
                snapshot.description.unwrap_or_default()
            );
            last_percent = Some(percent);
        }
        thread::sleep(STATUS_POLL_INTERVAL);
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { config }) => {
            let config = UpdaterConfig::load(&config)?;
            let db_path = config.metadata_path();
            info!("Initializing registry at: {}", db_path.display());
            updraft::db::init(&db_path)?;
            println!("Registry initialized successfully at: {}", db_path.display());
            Ok(())
        }
        Some(Commands::Update {
            summary,
            version_id,
            source,
            config,
        }) => {
            let config = UpdaterConfig::load(&config)?;
            let summary = ContentSummary::from_file(&summary)?;
            let context = AppUpdaterContext::open(config, &source, summary, version_id)?;

            let updater = AppUpdater::new(context);
            let status = updater.status();
            let cancel = CancellationToken::new();

            let worker = thread::spawn(move || updater.update(&cancel));
            watch_progress(&status, &worker);

            let outcome = worker
                .join()
                .map_err(|_| anyhow::anyhow!("Update worker panicked"))?;

            match outcome {
                Ok(UpdateOutcome::UpToDate { version_id }) => {
                    println!("Version {} is already installed", version_id);
                    Ok(())
                }
                Ok(UpdateOutcome::Updated { version_id }) => {
                    println!("Installed version {}", version_id);
                    Ok(())
                }
                Err(e) => {
                    eprintln!(
                        "Update failed at {:.0}% [{}]: {}",
                        status.progress() * 100.0,
                        e.kind().as_str(),
                        e
                    );
                    Err(e.into())
                }
            }
        }
        Some(Commands::List { config }) => {
            let config = UpdaterConfig::load(&config)?;
            let metadata = SqliteMetaData::open_existing(&config.metadata_path())?;
            let entries = metadata.entries()?;

            if entries.is_empty() {
                println!("No files installed");
                return Ok(());
            }

            match installed_version_id(&metadata)? {
                Some(version) => println!("Installed version: {}", version),
                None => println!("Installed version: mixed ({:?})", metadata.versions()?),
            }
            println!("Installed files ({}):", entries.len());
            for entry in entries {
                println!(
                    "  {} (version {}, installed {})",
                    entry.file_name,
                    entry.version_id,
                    entry.installed_at.as_deref().unwrap_or("unknown")
                );
            }
            Ok(())
        }
        Some(Commands::Uninstall { config }) => {
            let config = UpdaterConfig::load(&config)?;
            let metadata = SqliteMetaData::open_existing(&config.metadata_path())?;
            let local_directory = LocalDirectory::new(&config.install_dir);
            let count = metadata.entries()?.len();

            let mut command = UninstallCommand::new(&local_directory, &metadata);
            command.prepare(&UpdaterStatus::new());
            command.execute(&CancellationToken::new())?;

            println!("Removed {} files from {}", count, config.install_dir.display());
            Ok(())
        }
        None => {
            println!("Updraft Content Updater v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'updraft --help' for usage information");
            Ok(())
        }
    }
}
