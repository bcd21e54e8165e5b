//! Append-only provenance log of successful imports (`imports.log`).
//!
//! Each line is one JSON object `{"map": ..., "file": ..., "rows": ..., "timestamp": ...}`.
//! Rollback only trims lines from the tail: it forgets provenance and never
//! touches rows already written to a target store.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::io_utils;

pub const IMPORT_LOG_FILE: &str = "imports.log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub map: PathBuf,
    pub file: PathBuf,
    pub rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ImportLogEntry {
    pub fn new(map: PathBuf, file: PathBuf, rows: usize) -> Self {
        Self {
            map,
            file,
            rows,
            timestamp: Some(Utc::now()),
        }
    }

    fn to_line(&self) -> io::Result<String> {
        let mut line = serde_json::to_string(self).map_err(io::Error::other)?;
        line.push('\n');
        Ok(line)
    }
}

/// Why a rollback removed fewer entries than requested, if it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackWarning {
    LogMissing,
    LogEmpty,
    Clamped { requested: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub removed: usize,
    pub remaining: usize,
    pub warning: Option<RollbackWarning>,
}

#[derive(Debug, Clone)]
pub struct ImportLog {
    path: PathBuf,
}

impl ImportLog {
    /// The log belonging to the dataset stored in `dataset_dir`.
    pub fn for_dataset(dataset_dir: &Path) -> Self {
        Self {
            path: dataset_dir.join(IMPORT_LOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one complete line, creating the log when needed.
    pub fn append(&self, entry: &ImportLogEntry) -> io::Result<()> {
        let line = entry.to_line()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        debug!("Appended import log entry to {:?}", self.path);
        Ok(())
    }

    /// Raw lines including their terminators.
    pub fn lines(&self) -> io::Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents.split_inclusive('\n').map(str::to_string).collect()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Parsed entries; lines that are not valid entries are skipped.
    pub fn entries(&self) -> io::Result<Vec<ImportLogEntry>> {
        Ok(self
            .lines()?
            .iter()
            .filter_map(|line| match serde_json::from_str(line.trim_end()) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Ignoring unreadable import log line in {:?}: {err}", self.path);
                    None
                }
            })
            .collect())
    }

    /// Drops the last `last` entries. Missing or short logs are not errors.
    pub fn rollback(&self, last: usize) -> io::Result<RollbackReport> {
        if !self.path.exists() {
            warn!("No import log found at {:?}", self.path);
            return Ok(RollbackReport {
                removed: 0,
                remaining: 0,
                warning: Some(RollbackWarning::LogMissing),
            });
        }
        let mut lines = self.lines()?;
        if lines.is_empty() {
            warn!("Import log {:?} has no entries", self.path);
            return Ok(RollbackReport {
                removed: 0,
                remaining: 0,
                warning: Some(RollbackWarning::LogEmpty),
            });
        }

        let available = lines.len();
        let removed = last.min(available);
        let warning = (last > available).then(|| {
            warn!(
                "Requested rollback of {last} import(s) but only {available} logged; removing all"
            );
            RollbackWarning::Clamped { requested: last }
        });
        lines.truncate(available - removed);
        io_utils::publish_atomically(&self.path, lines.concat().as_bytes())?;
        Ok(RollbackReport {
            removed,
            remaining: lines.len(),
            warning,
        })
    }
}
