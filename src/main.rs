//! Drive Uploadr - chunked uploader for Graph-style drive stores
//!
//! Streams a local file into a remote drive item through an upload session.

use clap::Parser;
use drive_uploadr::{config::Config, metrics, DriveFs, WriteMode};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Size of each read from the local file
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Drive Uploadr - upload a local file through a resumable upload session
#[derive(Parser, Debug)]
#[command(name = "drive-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Extend the remote file instead of replacing it
    #[arg(short, long, conflicts_with = "exclusive")]
    append: bool,

    /// Fail if the remote file already exists
    #[arg(short = 'x', long)]
    exclusive: bool,

    /// Print Prometheus metrics to stderr when done
    #[arg(long)]
    print_metrics: bool,

    /// Local file to upload
    local: PathBuf,

    /// Destination path under the configured drive root
    remote: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Drive Uploadr v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);

    let drive = DriveFs::from_config(&config)?;

    let mode = if args.append {
        WriteMode::Append
    } else if args.exclusive {
        WriteMode::Exclusive
    } else {
        WriteMode::Create
    };

    let mut local = tokio::fs::File::open(&args.local).await?;
    let mut handle = drive.open_write(&args.remote, mode).await?;

    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = local.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        handle.write(&buffer[..n]).await?;
    }

    let item = handle.close().await?;
    println!("{}", serde_json::to_string_pretty(&item)?);

    if args.print_metrics {
        eprintln!("{}", metrics::render());
    }

    Ok(())
}
