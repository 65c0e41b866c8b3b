// Noto - maintenance CLI for the local notes store
// Exports, imports and lists backups of a data directory

use anyhow::Context;
use clap::{Parser, Subcommand};
use noto_core::app::{backups_dir, AppState};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "noto")]
#[command(about = "Backup and inspection tool for Noto data", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the database and backups
    #[arg(long, env = "NOTO_DATA_DIR", default_value = "noto-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the backup document (or write it to a file)
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Merge a backup document into the store
    Import {
        file: PathBuf,
    },

    /// Write a backup file into the backups directory
    Backup,

    /// List backup files, newest first
    Backups,

    /// List folders with their note counts
    Folders,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "noto_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let state = AppState::initialize(&cli.data_dir)
        .await
        .with_context(|| format!("failed to open data directory {:?}", cli.data_dir))?;

    match cli.command {
        Commands::Export { out } => {
            let json = state.backup.export_json().await?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("failed to write {:?}", path))?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Import { file } => {
            let report = state
                .backup
                .import_file(&file)
                .await
                .with_context(|| format!("failed to import {:?}", file))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Backup => {
            let backup = state.backup.write_backup(&backups_dir(&cli.data_dir)).await?;
            println!(
                "{} ({} bytes, sha256 {})",
                backup.path.display(),
                backup.size,
                backup.checksum
            );
        }
        Commands::Backups => {
            for path in state.backup.list_backups(&backups_dir(&cli.data_dir)).await? {
                println!("{}", path.display());
            }
        }
        Commands::Folders => {
            let folders = state.folders.list().await?.current();
            for folder in folders {
                let count = state.folders.count_notes(folder.id).await?;
                let marker = if folder.is_general { " (general)" } else { "" };
                println!("{:>4}  {}{}  [{} notes]", folder.id, folder.title, marker, count);
            }
        }
    }

    Ok(())
}
