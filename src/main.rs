//! # transcode-pool - Media Transcoding Worker Pool
//!
//! Converts .webm and .mkv files to .mp4 format with subtitle support by
//! running FFmpeg jobs through a bounded pool of workers.
//!
//! ## Usage
//!
//! ```bash
//! # List media files that still need converting
//! transcode-pool scan /path/to/media
//!
//! # Convert them with 4 workers and a queue of 8 pending jobs
//! transcode-pool work /path/to/media --workers 4 --queue-capacity 8
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcode_pool::commands::scan::ScanCommand;
use transcode_pool::commands::work::{WorkCommand, WorkOptions};

/// transcode-pool - convert media files through a bounded worker pool
#[derive(Parser)]
#[command(
    name = "transcode-pool",
    about = "Convert media files to .mp4 through a bounded worker pool",
    long_about = "Converts .webm and .mkv files to .mp4 format with subtitle support, dispatching each file to an idle worker.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// List media files that would be converted
    Scan {
        /// Path to the media directory to scan
        path: PathBuf,
        /// Directory converted files are written to (defaults to next to the source)
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
    },
    /// Convert every pending media file
    Work {
        /// Path to the media directory containing the media files
        path: PathBuf,
        /// Directory converted files are written to (defaults to next to the source)
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
        /// Number of workers (overrides MAX_WORKERS)
        #[arg(long, short = 'j')]
        workers: Option<usize>,
        /// Bound on pending jobs (overrides QUEUE_CAPACITY)
        #[arg(long, short = 'q')]
        queue_capacity: Option<usize>,
        /// Run FFmpeg with low priority
        #[arg(long, short)]
        background: bool,
        /// Print job events as JSON lines on stdout
        #[arg(long)]
        json_events: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcode_pool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan { path, output_dir } => {
            info!("Starting scan command for path: {:?}", path);
            ScanCommand::new(path, output_dir).execute().await.map(|_| ())
        }
        Commands::Work {
            path,
            output_dir,
            workers,
            queue_capacity,
            background,
            json_events,
        } => {
            info!(
                "Starting work command for path: {:?}, background: {}",
                path, background
            );
            let options = WorkOptions {
                output_dir,
                background,
                workers,
                queue_capacity,
                json_events,
            };
            WorkCommand::new(path, options).execute().await.map(|_| ())
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
