//! Candidate-file collection per instrument group.
//!
//! One generic routine lists glob matches, parses stamps, and filters by the
//! window range; a count quota then decides whether the group's contribution
//! stands. A group whose count leaves its accepted band is zeroed entirely:
//! a partial, wrong-shaped contribution is worse evidence than none.

use glob::glob;
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::config::InstrumentsConfig;
use crate::emit;
use crate::error::{CollectError, PatternSnafu};
use crate::metrics::events::GroupRejected;
use crate::timestamp::{EventStamp, Instrument};
use crate::window::TimeRange;

/// One candidate capture: a path plus its parsed stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentFile {
    pub path: PathBuf,
    pub instrument: Instrument,
    pub stamp: EventStamp,
}

/// Expected/minimum count policy for one instrument group.
#[derive(Debug, Clone, Copy)]
struct CountQuota {
    expected: usize,
    minimum: usize,
    label: &'static str,
}

impl CountQuota {
    /// Warn on any deviation from the expected count; zero the group when
    /// the count leaves [minimum, expected].
    fn enforce(&self, start: EventStamp, files: Vec<InstrumentFile>) -> Vec<InstrumentFile> {
        if files.len() != self.expected {
            warn!(
                "Injection@{}: found {} {} files",
                start.short(),
                files.len(),
                self.label
            );
            if files.len() < self.minimum || files.len() > self.expected {
                error!(
                    "Injection@{}: amount of {} files is not between {} and {}",
                    start.short(),
                    self.label,
                    self.minimum,
                    self.expected
                );
                emit!(GroupRejected { group: self.label });
                return Vec::new();
            }
        }
        files
    }
}

/// Enumerate glob matches, parse each name with the instrument's grammar,
/// and keep the ones inside the range (when one is given).
///
/// Files whose names fail to parse are excluded with a debug trace, as are
/// unreadable directory entries; neither aborts the pass.
fn collect_matching(
    patterns: &[String],
    instrument: Instrument,
    range: Option<&TimeRange>,
) -> Result<Vec<InstrumentFile>, CollectError> {
    let mut files = Vec::new();
    for pattern in patterns {
        for entry in glob(pattern).context(PatternSnafu { pattern })? {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    debug!("Skipping unreadable entry under {}: {}", pattern, err);
                    continue;
                }
            };
            let stamp = match instrument.parse_stamp(&path) {
                Ok(stamp) => stamp,
                Err(err) => {
                    debug!("Excluding candidate: {}", err);
                    continue;
                }
            };
            if range.is_none_or(|range| range.contains(stamp)) {
                files.push(InstrumentFile {
                    path,
                    instrument,
                    stamp,
                });
            }
        }
    }
    Ok(files)
}

/// The per-window group results, in stable merge order.
#[derive(Debug, Default)]
pub struct CandidateSet {
    pub injection: Vec<InstrumentFile>,
    pub extraction: Vec<InstrumentFile>,
    pub analyzer50: Vec<InstrumentFile>,
    pub analyzer30: Vec<InstrumentFile>,
}

impl CandidateSet {
    pub fn total(&self) -> usize {
        self.injection.len() + self.extraction.len() + self.analyzer50.len() + self.analyzer30.len()
    }

    /// The mandatory analyzer-51 capture survives iff the combined
    /// analyzer-50 group did (see [`FileCollector`]).
    pub fn analyzer51_present(&self) -> bool {
        !self.analyzer50.is_empty()
    }

    /// All candidates in merge order: injection, extraction, analyzer-50,
    /// analyzer-30.
    pub fn files(&self) -> impl Iterator<Item = &InstrumentFile> {
        self.injection
            .iter()
            .chain(&self.extraction)
            .chain(&self.analyzer50)
            .chain(&self.analyzer30)
    }
}

/// Builds glob patterns from the configured directories and assembles the
/// per-window candidate groups.
#[derive(Debug)]
pub struct FileCollector {
    instruments: InstrumentsConfig,
    injection_quota: CountQuota,
    extraction_quota: CountQuota,
    analyzer50_quota: CountQuota,
    analyzer30_quota: CountQuota,
}

impl FileCollector {
    pub fn new(instruments: InstrumentsConfig) -> Self {
        let channels = instruments.channels.len();
        Self {
            instruments,
            injection_quota: CountQuota {
                expected: channels,
                minimum: channels,
                label: "injection",
            },
            extraction_quota: CountQuota {
                expected: channels,
                minimum: channels,
                label: "extraction",
            },
            analyzer50_quota: CountQuota {
                expected: 2,
                minimum: 1,
                label: "analyzer50",
            },
            analyzer30_quota: CountQuota {
                expected: 1,
                minimum: 0,
                label: "analyzer30",
            },
        }
    }

    /// Stamps of every injection marker in the reference channel directory.
    pub fn injection_stamps(&self) -> Result<Vec<EventStamp>, CollectError> {
        let reference = &self.instruments.reference_channel;
        let pattern = self.channel_pattern(reference, &format!("{reference}*inj.csv"));
        Ok(
            collect_matching(&[pattern], Instrument::Oscilloscope, None)?
                .into_iter()
                .map(|file| file.stamp)
                .collect(),
        )
    }

    /// Collect all four groups for the window starting at `start`.
    pub fn gather(
        &self,
        start: EventStamp,
        range: &TimeRange,
    ) -> Result<CandidateSet, CollectError> {
        Ok(CandidateSet {
            injection: self.collect_injection(start)?,
            extraction: self.collect_extraction(start, range)?,
            analyzer50: self.collect_analyzer50(start, range)?,
            analyzer30: self.collect_analyzer30(start, range)?,
        })
    }

    /// Injection captures embed the start stamp, so the patterns select the
    /// exact acquisition and no range test applies (the strict lower bound
    /// would reject t = start).
    fn collect_injection(&self, start: EventStamp) -> Result<Vec<InstrumentFile>, CollectError> {
        let patterns: Vec<String> = self
            .instruments
            .channels
            .iter()
            .map(|ch| self.channel_pattern(ch, &format!("{ch}_{start}_*.csv")))
            .collect();
        let files = collect_matching(&patterns, Instrument::Oscilloscope, None)?;
        Ok(self.injection_quota.enforce(start, files))
    }

    /// Extraction patterns match every channel capture (injections included);
    /// the strict range bounds keep only files inside the window.
    fn collect_extraction(
        &self,
        start: EventStamp,
        range: &TimeRange,
    ) -> Result<Vec<InstrumentFile>, CollectError> {
        let patterns: Vec<String> = self
            .instruments
            .channels
            .iter()
            .map(|ch| self.channel_pattern(ch, &format!("{ch}_*.csv")))
            .collect();
        let files = collect_matching(&patterns, Instrument::Oscilloscope, Some(range))?;
        Ok(self.extraction_quota.enforce(start, files))
    }

    /// Directory 52 contributes first, then directory 51. Exactly one file
    /// from 51 is mandatory; any other 51 count discards the combined group
    /// before the quota check, even when 52 contributed.
    fn collect_analyzer50(
        &self,
        start: EventStamp,
        range: &TimeRange,
    ) -> Result<Vec<InstrumentFile>, CollectError> {
        let mut files = collect_matching(
            &[dir_pattern(&self.instruments.analyzer52_dir, "*.TIQ")],
            Instrument::SpectrumAnalyzer50,
            Some(range),
        )?;
        let primary = collect_matching(
            &[dir_pattern(&self.instruments.analyzer51_dir, "*.TIQ")],
            Instrument::SpectrumAnalyzer50,
            Some(range),
        )?;
        let mandatory_present = primary.len() == 1;
        files.extend(primary);
        if !mandatory_present {
            files.clear();
        }
        Ok(self.analyzer50_quota.enforce(start, files))
    }

    fn collect_analyzer30(
        &self,
        start: EventStamp,
        range: &TimeRange,
    ) -> Result<Vec<InstrumentFile>, CollectError> {
        let files = collect_matching(
            &[dir_pattern(&self.instruments.analyzer30_dir, "*.iqt")],
            Instrument::SpectrumAnalyzer30,
            Some(range),
        )?;
        Ok(self.analyzer30_quota.enforce(start, files))
    }

    fn channel_pattern(&self, channel: &str, tail: &str) -> String {
        self.instruments
            .oscilloscope_dir
            .join(channel)
            .join(tail)
            .to_string_lossy()
            .into_owned()
    }
}

fn dir_pattern(dir: &Path, tail: &str) -> String {
    dir.join(tail).to_string_lossy().into_owned()
}
