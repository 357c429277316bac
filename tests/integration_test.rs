//! Integration tests for spillway.
//!
//! These drive whole passes over a scratch instrument tree, with a shell
//! script standing in for the merge tool, so they are Unix-only.

#![cfg(unix)]

use spillway::config::{Config, InstrumentsConfig, MergeConfig, MetricsConfig, StateConfig};
use spillway::daemon::{Daemon, PassResult};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const T1: &str = "2014.05.12.13.44.59";
const T2: &str = "2014.05.12.13.45.59";
const T3: &str = "2014.05.12.13.46.30";
const T4: &str = "2014.05.12.13.47.10";

/// Records every invocation as one `<output> <input>` line and exits 0.
const RECORDING_TOOL: &str = "#!/bin/sh\necho \"$@\" >> \"$(dirname \"$0\")/recorder\"\nexit 0\n";

/// Records the invocation but reports failure.
const FAILING_TOOL: &str = "#!/bin/sh\necho \"$@\" >> \"$(dirname \"$0\")/recorder\"\necho \"bad input\" >&2\nexit 3\n";

struct Lab {
    _dir: TempDir,
    root: PathBuf,
}

impl Lab {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        for ch in ["C1", "C2", "C3", "C4"] {
            fs::create_dir_all(root.join("Oscil").join(ch)).unwrap();
        }
        for sub in ["RSA51", "RSA52", "RSA30", "ROOT", "state", "backup"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        let lab = Lab { root, _dir: dir };
        lab.install_tool(RECORDING_TOOL);
        lab
    }

    fn install_tool(&self, script: &str) {
        let tool = self.root.join("merge-tool");
        fs::write(&tool, script).unwrap();
        let mut perms = fs::metadata(&tool).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&tool, perms).unwrap();
    }

    fn config(&self) -> Config {
        Config {
            instruments: InstrumentsConfig {
                oscilloscope_dir: self.root.join("Oscil"),
                channels: vec!["C1".into(), "C2".into(), "C3".into(), "C4".into()],
                reference_channel: "C2".into(),
                analyzer51_dir: self.root.join("RSA51"),
                analyzer52_dir: self.root.join("RSA52"),
                analyzer30_dir: self.root.join("RSA30"),
            },
            merge: MergeConfig {
                tool: self.root.join("merge-tool"),
                output_dir: self.root.join("ROOT"),
                content_log: self.root.join("ROOT").join("content.log"),
                quorum_min: 9,
                quorum_max: 11,
                long_gap_secs: 90,
                tolerance_secs: 0,
            },
            state: StateConfig {
                path: self.root.join("state").join("processed.jsonl"),
                backup_dir: Some(self.root.join("backup")),
            },
            poll_interval_secs: 1,
            metrics: MetricsConfig {
                enabled: false,
                address: String::new(),
            },
        }
    }

    fn daemon(&self) -> Daemon {
        Daemon::new(self.config(), CancellationToken::new()).unwrap()
    }

    fn capture(&self, channel: &str, name: &str) {
        fs::write(self.root.join("Oscil").join(channel).join(name), b"").unwrap();
    }

    fn analyzer(&self, dir: &str, name: &str) {
        fs::write(self.root.join(dir).join(name), b"").unwrap();
    }

    /// Full 11-file candidate set for the window opening at T1.
    fn seed_first_window(&self) {
        for ch in ["C1", "C2", "C3", "C4"] {
            self.capture(ch, &format!("{ch}_{T1}_inj.csv"));
            self.capture(ch, &format!("{ch}_2014.05.12.13.45.20_ext.csv"));
        }
        self.analyzer("RSA51", "RSA51-2014.05.12.13.45.10.123456.TIQ");
        self.analyzer("RSA52", "RSA52-2014.05.12.13.45.12.500000.TIQ");
        self.analyzer("RSA30", "20140512-134515-acq.iqt");
    }

    /// Injection markers at T2 plus lone T3 and T4 markers. T4 is the
    /// newest marker and stays open, so the pass sees exactly the windows
    /// T1..T2 and T2..T3; the latter has no analyzer files at all.
    fn seed_second_window(&self) {
        for ch in ["C1", "C2", "C3", "C4"] {
            self.capture(ch, &format!("{ch}_{T2}_inj.csv"));
        }
        self.capture("C2", &format!("C2_{T3}_inj.csv"));
        self.capture("C2", &format!("C2_{T4}_inj.csv"));
    }

    fn recorder_lines(&self) -> Vec<String> {
        fs::read_to_string(self.root.join("recorder"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn state_lines(&self) -> Vec<String> {
        fs::read_to_string(self.root.join("state").join("processed.jsonl"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn content_log(&self) -> String {
        fs::read_to_string(self.root.join("ROOT").join("content.log")).unwrap_or_default()
    }
}

mod pass_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_window_merges_and_thin_window_is_rejected() {
        let lab = Lab::new();
        lab.seed_first_window();
        lab.seed_second_window();

        let mut daemon = lab.daemon();
        let result = daemon.run_pass().await.unwrap();

        assert_eq!(result, PassResult::Processed);
        assert_eq!(daemon.stats().windows_processed, 2);
        assert_eq!(daemon.stats().merged, 1);
        assert_eq!(daemon.stats().rejected, 1);

        // Eleven invocations, each `<output> <input>` with absolute paths.
        let output = lab.root.join("ROOT").join(format!("{T1}.root"));
        let lines = lab.recorder_lines();
        assert_eq!(lines.len(), 11);
        for line in &lines {
            let (out, input) = line.split_once(' ').unwrap();
            assert_eq!(out, output.to_str().unwrap());
            assert!(PathBuf::from(input).is_absolute());
        }
        let inputs: Vec<&str> = lines
            .iter()
            .map(|line| line.split_once(' ').unwrap().1)
            .collect();
        assert!(inputs[..4].iter().all(|p| p.ends_with("_inj.csv")));
        assert!(inputs[4..8].iter().all(|p| p.ends_with("_ext.csv")));
        assert!(inputs[8].contains("RSA52"));
        assert!(inputs[9].contains("RSA51"));
        assert!(inputs[10].ends_with(".iqt"));
    }

    #[tokio::test]
    async fn test_content_log_describes_the_merge() {
        let lab = Lab::new();
        lab.seed_first_window();
        lab.seed_second_window();

        let mut daemon = lab.daemon();
        daemon.run_pass().await.unwrap();

        let log = lab.content_log();
        assert!(log.contains(&format!("*{:^38}*", "Successful merge")));
        assert!(log.contains(&format!("Merged file:    {T1}.root")));
        assert!(log.contains(&format!("    C1_{T1}_inj.csv")));
        assert!(log.contains("    RSA51-2014.05.12.13.45.10.123456.TIQ"));
        assert!(log.contains("    20140512-134515-acq.iqt"));
    }

    #[tokio::test]
    async fn test_both_windows_are_retired_and_backed_up() {
        let lab = Lab::new();
        lab.seed_first_window();
        lab.seed_second_window();

        let mut daemon = lab.daemon();
        daemon.run_pass().await.unwrap();

        // Init fragment plus one fragment per retired window.
        let lines = lab.state_lines();
        assert_eq!(lines, vec![
            "[]".to_string(),
            format!("[\"{T1}\"]"),
            format!("[\"{T2}\"]"),
        ]);

        let backup = fs::read_to_string(lab.root.join("backup").join("processed.jsonl")).unwrap();
        assert_eq!(backup.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_second_pass_over_same_tree_is_idle() {
        let lab = Lab::new();
        lab.seed_first_window();
        lab.seed_second_window();

        let mut daemon = lab.daemon();
        daemon.run_pass().await.unwrap();
        let second = daemon.run_pass().await.unwrap();

        assert_eq!(second, PassResult::Idle);
        assert_eq!(lab.recorder_lines().len(), 11);
    }

    #[tokio::test]
    async fn test_newest_marker_never_opens_a_window() {
        let lab = Lab::new();
        // Two markers make one candidate window, but its stop is the newest
        // marker, which is held back until a later injection closes it.
        lab.capture("C2", &format!("C2_{T1}_inj.csv"));
        lab.capture("C2", &format!("C2_{T2}_inj.csv"));

        let mut daemon = lab.daemon();
        let result = daemon.run_pass().await.unwrap();

        assert_eq!(result, PassResult::Idle);
        assert_eq!(daemon.stats().windows_processed, 0);
        assert!(lab.recorder_lines().is_empty());
    }
}

mod restart_tests {
    use super::*;

    #[tokio::test]
    async fn test_retired_windows_survive_a_restart() {
        let lab = Lab::new();
        lab.seed_first_window();
        lab.seed_second_window();

        let mut first = lab.daemon();
        first.run_pass().await.unwrap();
        drop(first);

        // Same tree, fresh process: nothing may be merged again.
        let mut second = lab.daemon();
        let result = second.run_pass().await.unwrap();

        assert_eq!(result, PassResult::Idle);
        assert_eq!(lab.recorder_lines().len(), 11);
        assert_eq!(lab.state_lines().len(), 3);
    }
}

mod partial_merge_tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_tool_yields_partial_merge_and_still_retires() {
        let lab = Lab::new();
        lab.install_tool(FAILING_TOOL);
        lab.seed_first_window();
        lab.seed_second_window();

        let mut daemon = lab.daemon();
        let result = daemon.run_pass().await.unwrap();

        assert_eq!(result, PassResult::Processed);
        assert_eq!(lab.recorder_lines().len(), 11);
        assert!(lab.content_log().contains(&format!("*{:^38}*", "Partial merge")));

        // The window must not be replayed on the next pass.
        let second = daemon.run_pass().await.unwrap();
        assert_eq!(second, PassResult::Idle);
        assert_eq!(lab.recorder_lines().len(), 11);
    }
}
