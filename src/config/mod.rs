//! Runtime configuration, loaded from YAML with environment interpolation.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::{
    ConfigError, EmptyChannelsSnafu, NegativeToleranceSnafu, NonPositiveLongGapSnafu,
    QuorumBoundsSnafu, ReadFileSnafu, StatePathSnafu, UnknownReferenceChannelSnafu,
    YamlParseSnafu, ZeroPollIntervalSnafu,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub instruments: InstrumentsConfig,
    pub merge: MergeConfig,
    pub state: StateConfig,
    /// Seconds to wait between passes over the instrument directories.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Where each instrument drops its captures and how the oscilloscope
/// channels are laid out beneath its directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentsConfig {
    pub oscilloscope_dir: PathBuf,
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Channel whose injection markers define the windows.
    #[serde(default = "default_reference_channel")]
    pub reference_channel: String,
    pub analyzer51_dir: PathBuf,
    pub analyzer52_dir: PathBuf,
    pub analyzer30_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// External tool invoked as `<tool> <output> <input>` per candidate.
    pub tool: PathBuf,
    pub output_dir: PathBuf,
    /// Human-readable ledger of what went into each merged file.
    pub content_log: PathBuf,
    #[serde(default = "default_quorum_min")]
    pub quorum_min: usize,
    #[serde(default = "default_quorum_max")]
    pub quorum_max: usize,
    /// Window gaps longer than this are called out when a window is rejected.
    #[serde(default = "default_long_gap_secs")]
    pub long_gap_secs: i64,
    /// Slack added to both window bounds when testing candidate stamps.
    #[serde(default)]
    pub tolerance_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Append-only store of retired window-start stamps.
    pub path: PathBuf,
    /// Directory receiving a copy of the store after each pass.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_channels() -> Vec<String> {
    vec!["C1".into(), "C2".into(), "C3".into(), "C4".into()]
}

fn default_reference_channel() -> String {
    "C2".into()
}

fn default_quorum_min() -> usize {
    9
}

fn default_quorum_max() -> usize {
    11
}

fn default_long_gap_secs() -> i64 {
    90
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".into()
}

impl Config {
    /// Read the file, interpolate `${VAR}` references, parse, and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).context(ReadFileSnafu)?;
        let text = vars::interpolate(&raw)?;
        let config: Config = serde_yaml::from_str(&text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.instruments.channels.is_empty(), EmptyChannelsSnafu);
        ensure!(
            self.instruments
                .channels
                .contains(&self.instruments.reference_channel),
            UnknownReferenceChannelSnafu {
                channel: &self.instruments.reference_channel,
            }
        );
        ensure!(
            self.merge.quorum_min <= self.merge.quorum_max,
            QuorumBoundsSnafu {
                minimum: self.merge.quorum_min,
                maximum: self.merge.quorum_max,
            }
        );
        ensure!(
            self.merge.tolerance_secs >= 0,
            NegativeToleranceSnafu {
                tolerance_secs: self.merge.tolerance_secs,
            }
        );
        ensure!(
            self.merge.long_gap_secs > 0,
            NonPositiveLongGapSnafu {
                long_gap_secs: self.merge.long_gap_secs,
            }
        );
        ensure!(self.poll_interval_secs >= 1, ZeroPollIntervalSnafu);
        ensure!(
            self.state.path.file_name().is_some(),
            StatePathSnafu {
                path: &self.state.path,
            }
        );
        Ok(())
    }
}
