//! Durable tracking of processed injections.
//!
//! The store is an append-only JSON Lines file: each line is one fragment, a
//! JSON array of canonical stamps. Readers union every fragment, so appends
//! never rewrite history and a crash can at worst tear the final line.

use snafu::prelude::*;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::StateConfig;
use crate::emit;
use crate::error::{AppendSnafu, BackupSnafu, EncodeSnafu, OpenSnafu, ReadSnafu, StateError};
use crate::metrics::events::FragmentAppended;
use crate::timestamp::EventStamp;

/// In-memory set of injections already resolved (merged or rejected).
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    stamps: HashSet<EventStamp>,
}

impl ProcessedSet {
    pub fn contains(&self, stamp: &EventStamp) -> bool {
        self.stamps.contains(stamp)
    }

    /// Returns false if the stamp was already present.
    pub fn insert(&mut self, stamp: EventStamp) -> bool {
        self.stamps.insert(stamp)
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

impl Extend<EventStamp> for ProcessedSet {
    fn extend<I: IntoIterator<Item = EventStamp>>(&mut self, iter: I) {
        self.stamps.extend(iter);
    }
}

/// Append-only fragment store backing [`ProcessedSet`].
#[derive(Debug)]
pub struct ProcessedStore {
    path: PathBuf,
    backup_dir: Option<PathBuf>,
}

impl ProcessedStore {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            path: config.path.clone(),
            backup_dir: config.backup_dir.clone(),
        }
    }

    /// Union every fragment in the store.
    ///
    /// A missing store is the first run: it is initialized with an empty
    /// fragment. A line that fails to decode marks the end of the readable
    /// store (a write torn by a crash); everything before it is still good.
    pub fn load(&self) -> Result<ProcessedSet, StateError> {
        match File::open(&self.path) {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.append(&[])?;
                Ok(ProcessedSet::default())
            }
            opened => {
                let file = opened.context(OpenSnafu { path: &self.path })?;
                let mut processed = ProcessedSet::default();
                for line in BufReader::new(file).lines() {
                    let line = line.context(ReadSnafu { path: &self.path })?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Vec<EventStamp>>(&line) {
                        Ok(fragment) => processed.extend(fragment),
                        Err(err) => {
                            warn!(
                                "Ignoring undecodable fragment tail in {}: {}",
                                self.path.display(),
                                err
                            );
                            break;
                        }
                    }
                }
                Ok(processed)
            }
        }
    }

    /// Append one fragment; prior fragments are never rewritten.
    pub fn append(&self, stamps: &[EventStamp]) -> Result<(), StateError> {
        let mut line = serde_json::to_string(stamps).context(EncodeSnafu)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .context(OpenSnafu { path: &self.path })?;
        file.write_all(line.as_bytes())
            .context(AppendSnafu { path: &self.path })?;

        emit!(FragmentAppended {
            stamps: stamps.len()
        });
        Ok(())
    }

    /// Copy the store into the backup directory, if one is configured.
    pub fn backup(&self) -> Result<(), StateError> {
        let Some(dir) = &self.backup_dir else {
            return Ok(());
        };
        // The path is validated to name a file at configuration load.
        let Some(name) = self.path.file_name() else {
            return Ok(());
        };
        let target = dir.join(name);
        std::fs::copy(&self.path, &target).context(BackupSnafu { target: &target })?;
        debug!("Backed up state store to {}", target.display());
        Ok(())
    }
}
