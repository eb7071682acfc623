//! Terminal discipline management.
//!
//! The editor needs the terminal in raw mode: bytes delivered one at a time,
//! no driver-side echo, and the interrupt/suspend/quit control characters
//! passed through as plain bytes so the shell decides what to do with them.
//! Output post-processing stays enabled, so `\n` renders normally; every
//! redraw positions explicitly with `\r`.

use anyhow::{Context, Result};
use nix::sys::termios::{self, InputFlags, LocalFlags, SetArg, Termios};
use std::io;

/// Scoped raw-mode acquisition.
///
/// Construction captures the current discipline before any destructive
/// change; drop restores it, so the terminal is recovered on every exit
/// path, panics included. `restore` is idempotent.
pub struct RawMode {
    saved: Termios,
}

impl RawMode {
    /// Switch stdin to raw mode, returning a guard holding the snapshot.
    ///
    /// Failure to query or set attributes is an error the caller treats as
    /// fatal; running without a tty is not supported.
    pub fn enter() -> Result<Self> {
        let stdin = io::stdin();
        let saved = termios::tcgetattr(&stdin).context("query terminal attributes")?;

        let mut raw = saved.clone();
        raw.local_flags
            .remove(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG);
        raw.input_flags.remove(InputFlags::IXON | InputFlags::ICRNL);

        termios::tcsetattr(&stdin, SetArg::TCSAFLUSH, &raw).context("set raw terminal mode")?;
        Ok(Self { saved })
    }

    /// Reapply the saved discipline. Safe to call any number of times.
    pub fn restore(&self) {
        let _ = termios::tcsetattr(&io::stdin(), SetArg::TCSAFLUSH, &self.saved);
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        self.restore();
    }
}
