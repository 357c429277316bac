//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the daemon.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

use crate::decision::Verdict;
use crate::merge::MergeOutcome;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted once per pass with the number of open windows found.
pub struct WindowsDiscovered {
    pub count: usize,
}

impl InternalEvent for WindowsDiscovered {
    fn emit(self) {
        trace!(count = self.count, "Windows discovered");
        gauge!("spillway_open_windows").set(self.count as f64);
    }
}

/// Event emitted when a window's candidate set has been judged.
pub struct WindowResolved {
    pub verdict: Verdict,
}

impl InternalEvent for WindowResolved {
    fn emit(self) {
        let verdict = match self.verdict {
            Verdict::Mergeable => "mergeable",
            Verdict::Unmergeable => "unmergeable",
        };
        trace!(verdict, "Window resolved");
        counter!("spillway_windows_resolved_total", "verdict" => verdict).increment(1);
    }
}

/// Event emitted when an instrument group's count leaves its accepted band.
pub struct GroupRejected {
    pub group: &'static str,
}

impl InternalEvent for GroupRejected {
    fn emit(self) {
        trace!(group = self.group, "Instrument group rejected");
        counter!("spillway_group_rejections_total", "group" => self.group).increment(1);
    }
}

/// Event emitted per merge-tool invocation.
pub struct ToolInvocation {
    pub success: bool,
}

impl InternalEvent for ToolInvocation {
    fn emit(self) {
        let status = if self.success { "success" } else { "failure" };
        trace!(status, "Merge tool invoked");
        counter!("spillway_tool_invocations_total", "status" => status).increment(1);
    }
}

/// Event emitted when a window's merge has finished.
pub struct MergeCompleted {
    pub outcome: MergeOutcome,
}

impl InternalEvent for MergeCompleted {
    fn emit(self) {
        let outcome = match self.outcome {
            MergeOutcome::Success => "success",
            MergeOutcome::Partial => "partial",
        };
        trace!(outcome, "Merge completed");
        counter!("spillway_merges_total", "outcome" => outcome).increment(1);
    }
}

/// Event recording how long one merge took, tool invocations included.
pub struct MergeDuration {
    pub duration: Duration,
}

impl InternalEvent for MergeDuration {
    fn emit(self) {
        histogram!("spillway_merge_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event recording how long one full pass took.
pub struct PassDuration {
    pub duration: Duration,
}

impl InternalEvent for PassDuration {
    fn emit(self) {
        histogram!("spillway_pass_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a fragment of retired stamps reaches the state store.
pub struct FragmentAppended {
    pub stamps: usize,
}

impl InternalEvent for FragmentAppended {
    fn emit(self) {
        trace!(stamps = self.stamps, "State fragment appended");
        counter!("spillway_state_fragments_total").increment(1);
    }
}
