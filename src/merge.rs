//! Merge-tool invocation and the human-readable content log.

use chrono::Local;
use snafu::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{error, info};

use crate::collect::CandidateSet;
use crate::config::MergeConfig;
use crate::emit;
use crate::error::{ContentLogSnafu, MergeError, ResolveInputSnafu, ToolSpawnSnafu};
use crate::metrics::events::ToolInvocation;
use crate::timestamp::EventStamp;

/// How a merge ended. Partial means the tool failed on at least one input;
/// the output file still holds whatever was folded in before and after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Success,
    Partial,
}

impl MergeOutcome {
    pub fn heading(&self) -> &'static str {
        match self {
            MergeOutcome::Success => "Successful merge",
            MergeOutcome::Partial => "Partial merge",
        }
    }
}

/// Runs the external merge tool once per candidate and records the result.
#[derive(Debug)]
pub struct Merger {
    tool: PathBuf,
    output_dir: PathBuf,
    content_log: PathBuf,
    full_set: usize,
}

impl Merger {
    pub fn new(merge: &MergeConfig) -> Self {
        Self {
            tool: merge.tool.clone(),
            output_dir: merge.output_dir.clone(),
            content_log: merge.content_log.clone(),
            full_set: merge.quorum_max,
        }
    }

    /// Fold every candidate into `<start>.root`, one tool invocation per
    /// input so a single corrupt capture cannot sink the rest. Tool
    /// failures are logged and skipped; only a tool that cannot be spawned
    /// at all aborts the merge.
    pub async fn merge(
        &self,
        start: EventStamp,
        candidates: &CandidateSet,
    ) -> Result<MergeOutcome, MergeError> {
        let output_path = self.output_dir.join(format!("{start}.root"));
        let mut merged = 0usize;
        let mut inputs = Vec::new();

        for file in candidates.files() {
            let input = std::path::absolute(&file.path).context(ResolveInputSnafu {
                path: &file.path,
            })?;
            let output = Command::new(&self.tool)
                .arg(&output_path)
                .arg(&input)
                .output()
                .await
                .context(ToolSpawnSnafu { tool: &self.tool })?;

            if output.status.success() {
                merged += 1;
                emit!(ToolInvocation { success: true });
            } else {
                match output.status.code() {
                    Some(code) => error!(
                        "Merge tool failed on {} with exit code {}",
                        basename(&input),
                        code
                    ),
                    None => error!(
                        "Merge tool was killed by a signal while merging {}",
                        basename(&input)
                    ),
                }
                error!(
                    "Merge tool output: {} {}",
                    String::from_utf8_lossy(&output.stdout).trim(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                emit!(ToolInvocation { success: false });
            }
            inputs.push(input);
        }

        let outcome = if merged == self.full_set {
            MergeOutcome::Success
        } else {
            MergeOutcome::Partial
        };
        info!(
            "Merged {} of {} files into {}",
            merged,
            inputs.len(),
            basename(&output_path)
        );
        self.append_content_entry(outcome, &output_path, &inputs)?;
        Ok(outcome)
    }

    /// Append one framed entry describing the merge to the content log.
    fn append_content_entry(
        &self,
        outcome: MergeOutcome,
        output_path: &Path,
        inputs: &[PathBuf],
    ) -> Result<(), MergeError> {
        let stars = "*".repeat(40);
        let mut entry = String::new();
        entry.push_str(&stars);
        entry.push('\n');
        entry.push_str(&format!("*{:^38}*\n", outcome.heading()));
        entry.push_str(&stars);
        entry.push('\n');
        entry.push_str(&format!(
            "Merge time:    {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        entry.push_str(&format!("Merged file:    {}\n", basename(output_path)));
        entry.push_str("Contains:\n");
        for input in inputs {
            entry.push_str(&format!("    {}\n", basename(input)));
        }
        entry.push_str(&stars);
        entry.push('\n');

        let mut log = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.content_log)
            .context(ContentLogSnafu {
                path: &self.content_log,
            })?;
        log.write_all(entry.as_bytes()).context(ContentLogSnafu {
            path: &self.content_log,
        })
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::InstrumentFile;
    use crate::timestamp::Instrument;
    use std::fs;
    use tempfile::TempDir;

    fn merger(dir: &TempDir, full_set: usize) -> Merger {
        Merger {
            tool: PathBuf::from("/bin/true"),
            output_dir: dir.path().to_path_buf(),
            content_log: dir.path().join("content.log"),
            full_set,
        }
    }

    fn candidates(dir: &TempDir, names: &[&str]) -> CandidateSet {
        let injection = names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, b"").unwrap();
                InstrumentFile {
                    path,
                    instrument: Instrument::Oscilloscope,
                    stamp: "2014.05.12.13.45.00".parse().unwrap(),
                }
            })
            .collect();
        CandidateSet {
            injection,
            ..CandidateSet::default()
        }
    }

    #[tokio::test]
    async fn test_successful_merge_writes_framed_entry() {
        let dir = TempDir::new().unwrap();
        let merger = merger(&dir, 2);
        let set = candidates(&dir, &["a.csv", "b.csv"]);

        let outcome = merger
            .merge("2014.05.12.13.45.00".parse().unwrap(), &set)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Success);

        let log = fs::read_to_string(dir.path().join("content.log")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "*".repeat(40));
        assert_eq!(lines[1], format!("*{:^38}*", "Successful merge"));
        assert_eq!(lines[2], "*".repeat(40));
        assert!(lines[3].starts_with("Merge time:    "));
        assert_eq!(lines[4], "Merged file:    2014.05.12.13.45.00.root");
        assert_eq!(lines[5], "Contains:");
        assert_eq!(lines[6], "    a.csv");
        assert_eq!(lines[7], "    b.csv");
        assert_eq!(lines[8], "*".repeat(40));
    }

    #[tokio::test]
    async fn test_failing_tool_yields_partial_outcome() {
        let dir = TempDir::new().unwrap();
        let mut merger = merger(&dir, 2);
        merger.tool = PathBuf::from("/bin/false");
        let set = candidates(&dir, &["a.csv", "b.csv"]);

        let outcome = merger
            .merge("2014.05.12.13.45.00".parse().unwrap(), &set)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Partial);

        let log = fs::read_to_string(dir.path().join("content.log")).unwrap();
        assert!(log.contains("Partial merge"));
        assert!(log.contains("    a.csv"));
    }

    #[tokio::test]
    async fn test_missing_tool_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut merger = merger(&dir, 1);
        merger.tool = dir.path().join("no-such-tool");
        let set = candidates(&dir, &["a.csv"]);

        let err = merger
            .merge("2014.05.12.13.45.00".parse().unwrap(), &set)
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::ToolSpawn { .. }));
    }

    #[tokio::test]
    async fn test_clean_merge_below_full_set_is_partial() {
        // full_set is the quorum maximum, so a thinner quorum that merges
        // cleanly still reports Partial.
        let dir = TempDir::new().unwrap();
        let merger = merger(&dir, 2);
        let set = candidates(&dir, &["a.csv"]);

        let outcome = merger
            .merge("2014.05.12.13.45.00".parse().unwrap(), &set)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Partial);
    }
}
