//! Context-sensitive tab completion.
//!
//! Candidates for the token under the cursor come from three sources: the
//! built-in command names and the executables on `PATH` when the cursor sits
//! in the first token, or directory entries when it sits in a later token.
//! Candidates are recomputed on every Tab keystroke; the filesystem and
//! `PATH` may change between presses, so nothing is cached.
//!
//! The editor's cursor is a byte offset into a byte buffer, so the token
//! scan happens on raw bytes; the cursor may sit inside a multi-byte
//! character and the buffer may hold invalid UTF-8. Only the extracted
//! token is converted (lossily) for name matching.

use crate::builtin::BUILTIN_NAMES;
use crate::env::Environment;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::debug;

/// One proposed completion for the token under edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Full replacement text for the token, directory prefix included, so a
    /// unique match chains naturally into the next path segment.
    pub insert: String,
    /// What to show when listing multiple candidates.
    pub display: String,
}

impl Candidate {
    fn bare(name: String) -> Self {
        Self {
            insert: name.clone(),
            display: name,
        }
    }
}

/// Result of a completion request: where the token under edit begins, and
/// the candidates proposed for it.
#[derive(Debug)]
pub struct Completion {
    /// Byte offset of the start of the token under edit.
    pub start: usize,
    /// Zero, one or many proposals.
    pub candidates: Vec<Candidate>,
}

/// Propose completions for the token ending at byte offset `cursor`.
///
/// Only the bytes up to the cursor matter. The token under edit runs from
/// the last whitespace boundary at or before the cursor to the cursor.
pub fn complete(line: &[u8], cursor: usize, env: &Environment) -> Completion {
    let head = &line[..cursor.min(line.len())];
    let start = head
        .iter()
        .rposition(|b| *b == b' ' || *b == b'\t')
        .map(|i| i + 1)
        .unwrap_or(0);
    let token = String::from_utf8_lossy(&head[start..]);

    let candidates = if start == 0 {
        // No whitespace precedes the cursor: completing the command itself.
        command_candidates(&token, env)
    } else {
        path_candidates(&token, command_token(line) == "cd")
    };

    Completion { start, candidates }
}

/// First whitespace-delimited token of the whole buffer.
fn command_token(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_string()
}

/// Candidates for the command position: built-in names first, then every
/// executable on `PATH` with the prefix, in `PATH` order. Duplicate names
/// across directories are preserved.
fn command_candidates(prefix: &str, env: &Environment) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = BUILTIN_NAMES
        .iter()
        .filter(|name| name.starts_with(prefix))
        .map(|name| Candidate::bare(name.to_string()))
        .collect();

    let Some(path_var) = env.get_var("PATH") else {
        return out;
    };

    for dir in path_var.split(':') {
        if dir.is_empty() {
            continue;
        }
        let entries = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) => {
                debug!(dir, error = %e, "skipping unreadable PATH directory");
                continue;
            }
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                (name.starts_with(prefix) && is_executable(&entry.path())).then_some(name)
            })
            .collect();
        names.sort();
        out.extend(names.into_iter().map(Candidate::bare));
    }
    out
}

/// Candidates for a later token: entries of the directory named by the
/// token's directory part whose names carry the base part as a prefix.
/// Directory candidates get a trailing `/`. When completing an argument to
/// `cd`, only directories are proposed.
fn path_candidates(token: &str, dirs_only: bool) -> Vec<Candidate> {
    let (dir_part, base) = match token.rfind('/') {
        Some(i) => (&token[..=i], &token[i + 1..]),
        None => ("", token),
    };
    let list_dir = if dir_part.is_empty() { "." } else { dir_part };

    let entries = match fs::read_dir(list_dir) {
        Ok(rd) => rd,
        Err(e) => {
            debug!(dir = list_dir, error = %e, "cannot list directory for completion");
            return Vec::new();
        }
    };

    let mut out: Vec<Candidate> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(base) {
                return None;
            }
            // stat, not lstat: symlinks resolve to what they point at.
            let is_dir = fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false);
            if dirs_only && !is_dir {
                return None;
            }
            let shown = if is_dir { format!("{name}/") } else { name };
            Some(Candidate {
                insert: format!("{dir_part}{shown}"),
                display: shown,
            })
        })
        .collect();
    out.sort_by(|a, b| a.display.cmp(&b.display));
    out
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
