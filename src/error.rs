//! Error types for spillway using snafu.
//!
//! One structured enum per concern, each with context selectors, aggregated
//! by the top-level [`DaemonError`].

use snafu::prelude::*;
use std::path::PathBuf;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// No oscilloscope channels configured.
    #[snafu(display("At least one oscilloscope channel must be configured"))]
    EmptyChannels,

    /// The reference channel is not one of the configured channels.
    #[snafu(display("Reference channel {channel:?} is not among the configured channels"))]
    UnknownReferenceChannel { channel: String },

    /// Quorum bounds are inverted.
    #[snafu(display("Quorum minimum {minimum} exceeds maximum {maximum}"))]
    QuorumBounds { minimum: usize, maximum: usize },

    /// Range tolerance must not be negative.
    #[snafu(display("Range tolerance must not be negative (got {tolerance_secs})"))]
    NegativeTolerance { tolerance_secs: i64 },

    /// Long-gap threshold must be positive.
    #[snafu(display("Long-gap threshold must be positive (got {long_gap_secs})"))]
    NonPositiveLongGap { long_gap_secs: i64 },

    /// Poll interval must be positive.
    #[snafu(display("Poll interval must be at least one second"))]
    ZeroPollInterval,

    /// The state path does not name a file.
    #[snafu(display("State path {path:?} does not name a file"))]
    StatePath { path: PathBuf },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Parse Errors ============

/// Errors from mapping an instrument filename to a timestamp.
///
/// These never abort a pass: the offending file is debug-logged and excluded
/// from its candidate set.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ParseError {
    /// The filename does not follow the instrument's grammar.
    #[snafu(display("Filename {name:?} does not match the {instrument} grammar"))]
    Grammar {
        name: String,
        instrument: &'static str,
    },

    /// The embedded timestamp field failed to parse.
    #[snafu(display("Invalid timestamp field {field:?} in {name:?}"))]
    Stamp {
        name: String,
        field: String,
        source: chrono::ParseError,
    },
}

// ============ Window Errors ============

/// Errors from event-window construction.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WindowError {
    /// The window's stop precedes its start.
    #[snafu(display("Window stop {stop} precedes start {start}"))]
    StopBeforeStart { start: String, stop: String },
}

// ============ Collect Errors ============

/// Errors from candidate-file collection.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CollectError {
    /// A glob pattern built from the configuration is invalid.
    #[snafu(display("Invalid glob pattern {pattern:?}"))]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

// ============ State Errors ============

/// Errors from the processed-injection store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StateError {
    /// Failed to open the store file.
    #[snafu(display("Failed to open state store {path:?}"))]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a fragment line.
    #[snafu(display("Failed to read state store {path:?}"))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to append a fragment.
    #[snafu(display("Failed to append to state store {path:?}"))]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize a fragment.
    #[snafu(display("Failed to serialize state fragment"))]
    Encode { source: serde_json::Error },

    /// Failed to copy the store to the backup directory.
    #[snafu(display("Failed to back up state store to {target:?}"))]
    Backup {
        target: PathBuf,
        source: std::io::Error,
    },
}

// ============ Merge Errors ============

/// Errors from the external merge step.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MergeError {
    /// Failed to resolve an input path to absolute form.
    #[snafu(display("Failed to resolve input path {path:?}"))]
    ResolveInput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to spawn the merge tool.
    #[snafu(display("Failed to run merge tool {tool:?}"))]
    ToolSpawn {
        tool: PathBuf,
        source: std::io::Error,
    },

    /// Failed to append the content-log entry.
    #[snafu(display("Failed to append to content log {path:?}"))]
    ContentLog {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Daemon Error (top-level) ============

/// Top-level daemon errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DaemonError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// The reference channel directory is missing at startup.
    #[snafu(display("Reference channel directory {path:?} is not accessible"))]
    ReferenceDir { path: PathBuf },

    /// Window construction error.
    #[snafu(display("Window error"))]
    Window { source: WindowError },

    /// Collection error.
    #[snafu(display("Collection error"))]
    Collect { source: CollectError },

    /// Merge error.
    #[snafu(display("Merge error"))]
    Merge { source: MergeError },

    /// State store error.
    #[snafu(display("State store error"))]
    State { source: StateError },

    /// Address parsing error.
    #[snafu(display("Failed to parse metrics address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },
}
