//! Merge decision for one window's candidate set.

use tracing::error;

use crate::collect::CandidateSet;
use crate::config::MergeConfig;
use crate::emit;
use crate::metrics::events::WindowResolved;
use crate::window::EventWindow;

/// Whether a window's evidence justifies invoking the merge tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Mergeable,
    Unmergeable,
}

/// Count band a candidate set must land in, plus the gap beyond which a
/// window is assumed to span unrelated acquisitions.
#[derive(Debug, Clone, Copy)]
pub struct QuorumPolicy {
    minimum: usize,
    maximum: usize,
    long_gap_secs: i64,
}

impl QuorumPolicy {
    pub fn from_config(merge: &MergeConfig) -> Self {
        Self {
            minimum: merge.quorum_min,
            maximum: merge.quorum_max,
            long_gap_secs: merge.long_gap_secs,
        }
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }

    /// Decide the window. An unmergeable window logs why before the generic
    /// rejection line, so the operator can tell a long gap from a thin set.
    pub fn evaluate(&self, window: &EventWindow, candidates: &CandidateSet) -> Verdict {
        let total = candidates.total();
        let verdict = if candidates.analyzer51_present()
            && total >= self.minimum
            && total <= self.maximum
        {
            Verdict::Mergeable
        } else {
            Verdict::Unmergeable
        };

        if verdict == Verdict::Unmergeable {
            let gap = window.gap_seconds();
            if gap > self.long_gap_secs {
                error!(
                    "Injection@{} had next inj after {} seconds",
                    window.start.short(),
                    gap
                );
            }
            if !candidates.analyzer51_present() {
                error!(
                    "Injection@{}: did not find exactly one analyzer51 file",
                    window.start.short()
                );
            }
            error!("Injection@{} could not be merged", window.start.short());
        }

        emit!(WindowResolved { verdict });
        verdict
    }
}
