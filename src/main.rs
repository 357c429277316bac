//! spillway: a daemon that merges lab-instrument captures by time window.
//!
//! Watches the instrument directories, pairs consecutive injections from
//! the reference oscilloscope channel into windows, and merges each
//! window's captures into one ROOT file via an external merge tool.

use clap::Parser;
use snafu::prelude::*;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use spillway::config::Config;
use spillway::error::{AddressParseSnafu, ConfigSnafu, DaemonError, MetricsSnafu};

#[derive(Debug, Parser)]
#[command(name = "spillway", version, about = "Merge lab-instrument captures by time window")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Validate the configuration, print the plan, and exit.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("spillway starting");
    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    if args.dry_run {
        print_plan(&config);
        return Ok(());
    }

    if config.metrics.enabled {
        let address: SocketAddr = config.metrics.address.parse().context(AddressParseSnafu)?;
        spillway::metrics::init(address).context(MetricsSnafu)?;
        debug!("Metrics available at http://{}/metrics", address);
    }

    let stats = spillway::daemon::run(config).await?;
    info!(
        "Exited after merging {} of {} processed windows",
        stats.merged, stats.windows_processed
    );
    Ok(())
}

fn print_plan(config: &Config) {
    println!(
        "oscilloscope:  {}",
        config.instruments.oscilloscope_dir.display()
    );
    println!("channels:      {}", config.instruments.channels.join(", "));
    println!("reference:     {}", config.instruments.reference_channel);
    println!(
        "analyzer51:    {}",
        config.instruments.analyzer51_dir.display()
    );
    println!(
        "analyzer52:    {}",
        config.instruments.analyzer52_dir.display()
    );
    println!(
        "analyzer30:    {}",
        config.instruments.analyzer30_dir.display()
    );
    println!("merge tool:    {}", config.merge.tool.display());
    println!("output dir:    {}", config.merge.output_dir.display());
    println!(
        "quorum:        {}..={} files",
        config.merge.quorum_min, config.merge.quorum_max
    );
    println!("state store:   {}", config.state.path.display());
}
