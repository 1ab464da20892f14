//! Drive Uploadr Library
//!
//! Writes files of any size to a Graph-style drive store that only accepts
//! large content as ranged fragments against a server-issued upload session,
//! behind a simple local write handle.
//!
//! # Features
//!
//! - **Local Staging**: Writes land in a scratch file; no network until close
//! - **Append Mode**: Existing remote content is streamed in before writes
//! - **Upload Sessions**: Sequential, contiguous `Content-Range` fragments
//! - **Explicit Clients**: The HTTP client and its token are passed in, never built implicitly
//!
//! # Example
//!
//! ```no_run
//! use drive_uploadr::{config::Config, fs::{DriveFs, WriteMode}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let drive = DriveFs::from_config(&config)?;
//!
//!     let mut handle = drive.open_write("reports/q3.csv", WriteMode::Create).await?;
//!     handle.write(b"region,total\n").await?;
//!     let item = handle.close().await?;
//!     println!("{:?}", item);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod fs;
pub mod graph;
pub mod metrics;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use fs::{DriveFs, FileInfo, WriteMode};
pub use upload::{UploadError, UploadHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
