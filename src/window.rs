//! Event windows between adjacent injections.
//!
//! A window spans from one injection to the chronologically next one and
//! bounds the search for the other instruments' files. Windows are rebuilt
//! from the reference listing on every pass and never persisted; only their
//! start stamp is retired into the processed store once decided.

use snafu::prelude::*;

use crate::error::{StopBeforeStartSnafu, WindowError};
use crate::state::ProcessedSet;
use crate::timestamp::EventStamp;

/// The interval between one injection and the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start: EventStamp,
    pub stop: EventStamp,
}

impl EventWindow {
    /// Whole seconds between the window's boundaries.
    pub fn gap_seconds(&self) -> i64 {
        self.start.seconds_until(self.stop)
    }
}

/// Build the processable windows from a reference-directory listing.
///
/// Stamps already retired are dropped and the rest sorted ascending. The
/// newest survivor is held back: its closing boundary is unknown and its
/// analyzer files may still be arriving. Adjacent survivors pair into
/// windows, so fewer than three fresh stamps yield nothing.
pub fn build_windows(stamps: Vec<EventStamp>, processed: &ProcessedSet) -> Vec<EventWindow> {
    let mut fresh: Vec<EventStamp> = stamps
        .into_iter()
        .filter(|stamp| !processed.contains(stamp))
        .collect();
    fresh.sort_unstable();
    fresh.pop();

    fresh
        .windows(2)
        .map(|pair| EventWindow {
            start: pair[0],
            stop: pair[1],
        })
        .collect()
}

/// Time-membership test used to filter candidate files into a window.
///
/// Both bounds are strict, so a file stamped exactly at the window start or
/// stop is excluded unless the tolerance admits it.
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
    start: EventStamp,
    stop: EventStamp,
    tolerance_secs: i64,
}

impl TimeRange {
    pub fn new(window: &EventWindow, tolerance_secs: i64) -> Result<Self, WindowError> {
        ensure!(
            window.start <= window.stop,
            StopBeforeStartSnafu {
                start: window.start.to_string(),
                stop: window.stop.to_string(),
            }
        );
        Ok(Self {
            start: window.start,
            stop: window.stop,
            tolerance_secs,
        })
    }

    /// True iff `start - tol < t < stop + tol`.
    pub fn contains(&self, stamp: EventStamp) -> bool {
        self.start.seconds_until(stamp) > -self.tolerance_secs
            && stamp.seconds_until(self.stop) > -self.tolerance_secs
    }
}
