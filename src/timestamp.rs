//! Canonical timestamps and per-instrument filename grammars.
//!
//! Every instrument embeds an acquisition time in its capture filenames, each
//! with its own layout. Parsing normalizes them all to [`EventStamp`], the
//! second-resolution join key used to correlate files across instruments.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::prelude::*;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GrammarSnafu, ParseError, StampSnafu};

/// Canonical stamp layout, shared by the oscilloscope grammar, the state
/// store, and merged-output filenames.
pub const CANONICAL_FORMAT: &str = "%Y.%m.%d.%H.%M.%S";

/// Compact layout used by the spectrum-analyzer-30 grammar.
const ANALYZER30_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Abbreviated layout for log diagnostics.
const SHORT_FORMAT: &str = "%m.%d.%H.%M.%S";

/// A second-resolution acquisition timestamp.
///
/// Instrument clocks are independent but all stamp at whole seconds, so this
/// is the finest resolution that is meaningful as a cross-instrument key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventStamp(NaiveDateTime);

impl EventStamp {
    /// Wrap a datetime, truncating any sub-second component.
    pub fn new(inner: NaiveDateTime) -> Self {
        use chrono::Timelike;
        Self(inner.with_nanosecond(0).unwrap_or(inner))
    }

    fn parse_with(field: &str, layout: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(field, layout).map(Self::new)
    }

    /// Abbreviated rendering for log diagnostics.
    pub fn short(&self) -> String {
        self.0.format(SHORT_FORMAT).to_string()
    }

    /// Whole seconds from `self` to `later` (negative if `later` precedes).
    pub fn seconds_until(&self, later: EventStamp) -> i64 {
        later.0.signed_duration_since(self.0).num_seconds()
    }
}

impl fmt::Display for EventStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.format(CANONICAL_FORMAT).fmt(f)
    }
}

impl FromStr for EventStamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, CANONICAL_FORMAT)
    }
}

impl Serialize for EventStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventStamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// The closed set of instrument filename grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    /// LeCroy CSV captures: `<channel>_<Y.M.D.H.M.S>_<kind>.csv`.
    Oscilloscope,
    /// TIQ captures: `<prefix>-<Y.M.D.H.M.S>.<fraction>.TIQ`.
    SpectrumAnalyzer50,
    /// IQT captures: `<YYYYMMDD>-<HHMMSS>-<trailing>`.
    SpectrumAnalyzer30,
}

impl Instrument {
    /// Extract the canonical stamp from a capture's filename.
    pub fn parse_stamp(self, path: &Path) -> Result<EventStamp, ParseError> {
        let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
        match self {
            Instrument::Oscilloscope => parse_oscilloscope(&name),
            Instrument::SpectrumAnalyzer50 => parse_analyzer50(&name),
            Instrument::SpectrumAnalyzer30 => parse_analyzer30(&name),
        }
    }
}

fn parse_oscilloscope(name: &str) -> Result<EventStamp, ParseError> {
    let field = name.split('_').nth(1).context(GrammarSnafu {
        name,
        instrument: "oscilloscope",
    })?;
    EventStamp::parse_with(field, CANONICAL_FORMAT).context(StampSnafu { name, field })
}

fn parse_analyzer50(name: &str) -> Result<EventStamp, ParseError> {
    let field = name.split('-').nth(1).context(GrammarSnafu {
        name,
        instrument: "analyzer50",
    })?;
    // Validate the `<stamp>.<fraction>.TIQ` envelope, then drop the fraction:
    // the analyzer stamps fractional seconds but the join key is whole seconds.
    let seconds = field
        .strip_suffix(".TIQ")
        .and_then(|rest| rest.rsplit_once('.'))
        .filter(|(_, frac)| {
            (1..=6).contains(&frac.len()) && frac.bytes().all(|b| b.is_ascii_digit())
        })
        .map(|(seconds, _)| seconds)
        .context(GrammarSnafu {
            name,
            instrument: "analyzer50",
        })?;
    EventStamp::parse_with(seconds, CANONICAL_FORMAT).context(StampSnafu {
        name,
        field: seconds,
    })
}

fn parse_analyzer30(name: &str) -> Result<EventStamp, ParseError> {
    // The stamp is everything before the last dash-separated field.
    let (field, _) = name.rsplit_once('-').context(GrammarSnafu {
        name,
        instrument: "analyzer30",
    })?;
    EventStamp::parse_with(field, ANALYZER30_FORMAT).context(StampSnafu { name, field })
}
