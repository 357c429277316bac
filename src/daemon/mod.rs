//! The polling daemon: discover windows, judge them, merge, retire.

mod signal;

use snafu::prelude::*;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collect::FileCollector;
use crate::config::Config;
use crate::decision::{QuorumPolicy, Verdict};
use crate::emit;
use crate::error::{
    CollectSnafu, DaemonError, MergeSnafu, ReferenceDirSnafu, StateSnafu, WindowSnafu,
};
use crate::merge::{MergeOutcome, Merger};
use crate::metrics::events::{MergeCompleted, MergeDuration, PassDuration, WindowsDiscovered};
use crate::state::{ProcessedSet, ProcessedStore};
use crate::window::{EventWindow, TimeRange, build_windows};

/// Counters accumulated across the daemon's lifetime, reported at shutdown.
#[derive(Debug, Default, Clone)]
pub struct DaemonStats {
    pub passes: u64,
    pub windows_processed: u64,
    pub merged: u64,
    pub rejected: u64,
}

/// Outcome of one pass over the instrument directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassResult {
    /// At least one window was examined.
    Processed,
    /// No open windows were found.
    Idle,
    /// Cancellation was observed mid-pass; remaining windows stay open.
    Shutdown,
}

/// Run the daemon until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<DaemonStats, DaemonError> {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        signal::shutdown_signal().await;
        signal_token.cancel();
    });

    let daemon = Daemon::new(config, shutdown)?;
    Ok(daemon.run().await)
}

/// Polling daemon that discovers closed windows and merges them.
#[derive(Debug)]
pub struct Daemon {
    config: Config,
    collector: FileCollector,
    merger: Merger,
    policy: QuorumPolicy,
    store: ProcessedStore,
    processed: ProcessedSet,
    stats: DaemonStats,
    shutdown: CancellationToken,
}

impl Daemon {
    /// Build a daemon and recover the retired-window set from the store.
    pub fn new(config: Config, shutdown: CancellationToken) -> Result<Self, DaemonError> {
        let reference_dir = config
            .instruments
            .oscilloscope_dir
            .join(&config.instruments.reference_channel);
        ensure!(
            reference_dir.is_dir(),
            ReferenceDirSnafu {
                path: reference_dir,
            }
        );

        let store = ProcessedStore::new(&config.state);
        let processed = store.load().context(StateSnafu)?;
        info!("Recovered {} retired windows from state", processed.len());

        Ok(Self {
            collector: FileCollector::new(config.instruments.clone()),
            merger: Merger::new(&config.merge),
            policy: QuorumPolicy::from_config(&config.merge),
            store,
            processed,
            stats: DaemonStats::default(),
            shutdown,
            config,
        })
    }

    /// Poll until cancelled. A failed pass is logged and retried on the
    /// next tick rather than tearing the daemon down.
    pub async fn run(mut self) -> DaemonStats {
        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
        loop {
            match self.run_pass().await {
                Ok(PassResult::Shutdown) => break,
                Ok(PassResult::Processed) => {}
                Ok(PassResult::Idle) => {
                    info!(
                        "No open windows, waiting {}s before next poll",
                        poll_interval.as_secs()
                    );
                }
                Err(err) => {
                    error!("Pass failed: {}", snafu::Report::from_error(err));
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        info!(
            "Shutting down after {} passes: {} windows processed, {} merged, {} rejected",
            self.stats.passes,
            self.stats.windows_processed,
            self.stats.merged,
            self.stats.rejected
        );
        self.stats
    }

    pub fn stats(&self) -> &DaemonStats {
        &self.stats
    }

    /// One pass: list injection markers, pair them into windows, and work
    /// through every window that is not yet retired. Exposed so the daemon
    /// can also be driven one-shot, from a scheduler or a test.
    pub async fn run_pass(&mut self) -> Result<PassResult, DaemonError> {
        self.stats.passes += 1;
        let started = Instant::now();

        let stamps = self.collector.injection_stamps().context(CollectSnafu)?;
        let windows = build_windows(stamps, &self.processed);
        emit!(WindowsDiscovered {
            count: windows.len()
        });

        let result = if windows.is_empty() {
            PassResult::Idle
        } else {
            info!("Processing {} open windows", windows.len());
            let mut result = PassResult::Processed;
            for window in &windows {
                if self.shutdown.is_cancelled() {
                    info!("Shutdown requested, leaving remaining windows open");
                    result = PassResult::Shutdown;
                    break;
                }
                self.process_window(window).await?;
            }
            result
        };
        info!("Finished pass");

        self.store.backup().context(StateSnafu)?;
        emit!(PassDuration {
            duration: started.elapsed()
        });
        Ok(result)
    }

    /// Judge one window and, when mergeable, merge it. The start stamp is
    /// retired either way, and the retirement is persisted before the next
    /// window so a crash cannot replay a merge.
    async fn process_window(&mut self, window: &EventWindow) -> Result<(), DaemonError> {
        debug!(
            "Examining window {} -> {} ({}s)",
            window.start,
            window.stop,
            window.gap_seconds()
        );
        let range =
            TimeRange::new(window, self.config.merge.tolerance_secs).context(WindowSnafu)?;
        let candidates = self
            .collector
            .gather(window.start, &range)
            .context(CollectSnafu)?;

        match self.policy.evaluate(window, &candidates) {
            Verdict::Mergeable => {
                let started = Instant::now();
                let outcome = self
                    .merger
                    .merge(window.start, &candidates)
                    .await
                    .context(MergeSnafu)?;
                emit!(MergeDuration {
                    duration: started.elapsed()
                });
                emit!(MergeCompleted { outcome });
                match outcome {
                    MergeOutcome::Success => {
                        info!("Successfully merged injection@{}", window.start.short());
                    }
                    MergeOutcome::Partial => {
                        warn!("Partially merged injection@{}", window.start.short());
                    }
                }
                self.stats.merged += 1;
            }
            Verdict::Unmergeable => {
                self.stats.rejected += 1;
            }
        }

        self.processed.insert(window.start);
        self.store.append(&[window.start]).context(StateSnafu)?;
        self.stats.windows_processed += 1;
        Ok(())
    }
}
