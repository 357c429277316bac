//! spillway: a daemon that merges lab-instrument captures by time window.
//!
//! Consecutive injection markers from a reference oscilloscope channel are
//! paired into time windows. For each window the daemon gathers the capture
//! files every instrument produced, judges the set against a count quorum,
//! and folds accepted sets into one ROOT file with an external merge tool.
//! Every examined window is retired into an append-only state store so it
//! is never reopened, even across restarts.
//!
//! # Example
//!
//! ```ignore
//! use spillway::{Config, error::DaemonError};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DaemonError> {
//!     let config = Config::from_file(Path::new("spillway.yaml"))?;
//!     let stats = spillway::daemon::run(config).await?;
//!     println!("Merged {} windows", stats.merged);
//!     Ok(())
//! }
//! ```

pub mod collect;
pub mod config;
pub mod daemon;
pub mod decision;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod state;
pub mod timestamp;
pub mod window;

#[cfg(test)]
mod test_log;

pub use config::Config;
pub use daemon::{Daemon, DaemonStats, PassResult};
pub use error::DaemonError;
pub use timestamp::{EventStamp, Instrument};
pub use window::EventWindow;
