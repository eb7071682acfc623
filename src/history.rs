//! Durable, ordered log of past commands.
//!
//! The backing store is a newline-delimited text file, one command per line.
//! Entry ids are view-time ordinals: they are assigned 1..N from line order
//! on every read and recomputed after every mutation, so deleting an entry
//! shifts everything after it down by one. Ids are never persisted.
//!
//! Single writer, no locking, no atomic rename: the shell is the only
//! process expected to mutate its own history file, and history is
//! best-effort state, never authoritative.

use crate::env::Environment;
use anyhow::{Context, Result, ensure};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// File name used when resolving the per-user history location.
const HISTORY_FILE_NAME: &str = ".krill_history";

/// One remembered command with its current 1-based ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Dense 1-based position of the entry; recomputed on every read/write.
    pub id: usize,
    /// The command text, trimmed of surrounding whitespace.
    pub command: String,
}

/// Handle on the backing history file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// A store backed by an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the per-user history location from `HOME`, falling back to a
    /// file in the current directory when `HOME` is unset.
    pub fn for_env(env: &Environment) -> Self {
        match env.get_var("HOME") {
            Some(home) => Self::at(PathBuf::from(home).join(HISTORY_FILE_NAME)),
            None => Self::at("history.txt"),
        }
    }

    /// Append one command to the backing file.
    ///
    /// Empty commands and an unopenable file are errors; callers treat both
    /// as best-effort failures (log and continue).
    pub fn append(&self, command: &str) -> Result<()> {
        ensure!(!command.is_empty(), "refusing to record an empty command");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {} for append", self.path.display()))?;
        writeln!(file, "{command}")?;
        Ok(())
    }

    /// Parse the whole file into ordered entries with ids 1..N.
    ///
    /// Lines are trimmed and blank lines skipped. A missing file is an empty
    /// history, not an error.
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", self.path.display()));
            }
        };

        let mut entries = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            entries.push(HistoryEntry {
                id: entries.len() + 1,
                command: line.to_string(),
            });
        }
        Ok(entries)
    }

    /// Overwrite the file with one line per entry, in current order.
    pub fn write_all(&self, entries: &[HistoryEntry]) -> Result<()> {
        let mut file = fs::File::create(&self.path)
            .with_context(|| format!("rewrite {}", self.path.display()))?;
        for entry in entries {
            writeln!(file, "{}", entry.command)?;
        }
        Ok(())
    }

    /// Delete the selected entries, renumber the remainder 1..N' in their
    /// original relative order, and persist the result. Returns the number
    /// of entries deleted.
    pub fn delete(
        &self,
        entries: &mut Vec<HistoryEntry>,
        filters: &[String],
        start_id: usize,
        end_id: usize,
    ) -> Result<usize> {
        let doomed = select(entries, filters, start_id, end_id);
        let before = entries.len();
        let mut idx = 0;
        entries.retain(|_| {
            let keep = !doomed.contains(&idx);
            idx += 1;
            keep
        });
        renumber(entries);
        self.write_all(entries)?;
        let deleted = before - entries.len();
        debug!(deleted, "history entries deleted");
        Ok(deleted)
    }

    /// Truncate the backing file to empty.
    pub fn clear(&self) -> Result<()> {
        fs::File::create(&self.path)
            .map(|_| ())
            .with_context(|| format!("truncate {}", self.path.display()))
    }
}

/// Shared selection rule for query and delete: when both ids are positive,
/// restrict to `id` within `[start_id, end_id]`; every filter must be
/// contained in the command text (AND); with no range and no filters,
/// everything is selected. Returns indices into `entries`.
pub fn select(
    entries: &[HistoryEntry],
    filters: &[String],
    start_id: usize,
    end_id: usize,
) -> Vec<usize> {
    let ranged = start_id > 0 && end_id > 0;
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| {
            if ranged && (entry.id < start_id || entry.id > end_id) {
                return false;
            }
            filters.iter().all(|f| entry.command.contains(f.as_str()))
        })
        .map(|(i, _)| i)
        .collect()
}

/// Reassign dense 1-based ids from current position.
pub fn renumber(entries: &mut [HistoryEntry]) {
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.id = i + 1;
    }
}

/// Render one entry the way the `history` built-in prints it.
pub fn format_entry(entry: &HistoryEntry) -> String {
    format!("{:>5}  {}", entry.id, entry.command)
}
