//! The keystroke state machine that turns a raw byte stream into an
//! editable command line.
//!
//! The editor owns the buffer and cursor for one command cycle. Escape
//! sequences are parsed by an explicit FSM (`Editing`, `EscapeSeen`,
//! `CsiSeen`) so unrecognized or partial sequences are a defined no-op
//! rather than ad hoc fallthrough. After every mutating keystroke the whole
//! line is redrawn and the terminal cursor repositioned to the logical
//! cursor, which is what makes in-place editing (as opposed to append-only
//! echoing) work.

use crate::completion;
use crate::env::Environment;
use crate::history::HistoryEntry;
use anyhow::Result;
use std::io::{Read, Write};

/// Hard cap on a single command line, in bytes.
pub const MAX_LINE: usize = 1024;

const ENTER: u8 = 0x0D;
const TAB: u8 = 0x09;
const CTRL_D: u8 = 0x04;
const ESCAPE: u8 = 0x1B;
const BACKSPACE: u8 = 0x7F;
const CTRL_H: u8 = 0x08;

/// An ordered, mutable byte sequence plus a cursor.
///
/// Invariant after every operation: `0 <= cursor <= len <= MAX_LINE`.
/// Insertion and deletion happen at the cursor; the cursor advances on
/// insert and retreats on backward delete.
#[derive(Debug, Default)]
pub struct LineBuffer {
    bytes: Vec<u8>,
    cursor: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Insert one byte at the cursor. Returns false when the buffer is full.
    pub fn insert(&mut self, b: u8) -> bool {
        if self.bytes.len() >= MAX_LINE {
            return false;
        }
        self.bytes.insert(self.cursor, b);
        self.cursor += 1;
        true
    }

    /// Delete the byte left of the cursor; no-op at cursor 0.
    pub fn delete_back(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.bytes.remove(self.cursor);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.bytes.len() {
            self.cursor += 1;
        }
    }

    /// Replace the whole contents, cursor moving to the end. Input beyond
    /// capacity is truncated.
    pub fn set_text(&mut self, text: &str) {
        self.bytes.clear();
        self.bytes.extend(text.bytes().take(MAX_LINE));
        self.cursor = self.bytes.len();
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.cursor = 0;
    }

    /// Replace `[start, cursor)` with `text`, leaving the cursor at the end
    /// of the insertion. Used to splice in a completion. Truncates at
    /// capacity.
    pub fn splice(&mut self, start: usize, text: &str) {
        debug_assert!(start <= self.cursor);
        let tail: Vec<u8> = self.bytes.split_off(self.cursor);
        self.bytes.truncate(start);
        self.bytes.extend(text.bytes());
        self.cursor = self.bytes.len().min(MAX_LINE);
        self.bytes.extend(tail);
        self.bytes.truncate(MAX_LINE);
        self.cursor = self.cursor.min(self.bytes.len());
    }
}

/// FSM states for escape-sequence parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Editing,
    EscapeSeen,
    CsiSeen,
}

/// How an edit session finished.
#[derive(Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// Enter was pressed (possibly on an empty line), or the buffer hit
    /// capacity and was force-committed.
    Line(String),
    /// Ctrl-D on an empty buffer, or the input stream ended while empty.
    Eof,
}

/// Interactive line editor over a raw byte stream.
///
/// Generic over the byte source and display sink so the state machine can
/// be driven by scripted input in tests.
pub struct LineEditor<'a, R: Read, W: Write> {
    input: R,
    output: W,
    prompt: &'a str,
    history: &'a [HistoryEntry],
    env: &'a Environment,
}

impl<'a, R: Read, W: Write> LineEditor<'a, R, W> {
    pub fn new(
        input: R,
        output: W,
        prompt: &'a str,
        history: &'a [HistoryEntry],
        env: &'a Environment,
    ) -> Self {
        Self {
            input,
            output,
            prompt,
            history,
            env,
        }
    }

    /// Run one edit session to completion.
    ///
    /// The session-local history cursor starts one past the newest entry
    /// and is independent of anything the store persists.
    pub fn read_line(&mut self) -> Result<EditOutcome> {
        let mut buf = LineBuffer::new();
        let mut state = State::Editing;
        let mut hist_pos = self.history.len();

        self.draw(&buf)?;

        let mut byte = [0u8; 1];
        loop {
            // a signal landing mid-read must not end the session
            let n = match self.input.read(&mut byte) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                // stream ended mid-session
                self.output.write_all(b"\n")?;
                return Ok(if buf.is_empty() {
                    EditOutcome::Eof
                } else {
                    EditOutcome::Line(buf.text())
                });
            }
            let b = byte[0];

            match state {
                State::Editing => match b {
                    ENTER => {
                        self.output.write_all(b"\n")?;
                        self.output.flush()?;
                        return Ok(EditOutcome::Line(buf.text()));
                    }
                    CTRL_D => {
                        if buf.is_empty() {
                            self.output.write_all(b"\n")?;
                            self.output.flush()?;
                            return Ok(EditOutcome::Eof);
                        }
                    }
                    BACKSPACE | CTRL_H => {
                        buf.delete_back();
                        self.draw(&buf)?;
                    }
                    TAB => {
                        self.handle_tab(&mut buf)?;
                    }
                    ESCAPE => state = State::EscapeSeen,
                    b if b >= 0x20 => {
                        buf.insert(b);
                        self.draw(&buf)?;
                        // a full buffer force-commits, bounding memory
                        if buf.len() >= MAX_LINE {
                            self.output.write_all(b"\n")?;
                            self.output.flush()?;
                            return Ok(EditOutcome::Line(buf.text()));
                        }
                    }
                    _ => {}
                },
                State::EscapeSeen => {
                    // anything but "[" is an unrecognized escape: discard
                    state = if b == b'[' {
                        State::CsiSeen
                    } else {
                        State::Editing
                    };
                }
                State::CsiSeen => {
                    match b {
                        b'A' => self.history_up(&mut buf, &mut hist_pos),
                        b'B' => self.history_down(&mut buf, &mut hist_pos),
                        b'C' => buf.move_right(),
                        b'D' => buf.move_left(),
                        _ => {}
                    }
                    state = State::Editing;
                    self.draw(&buf)?;
                }
            }
        }
    }

    /// Up-arrow: one step toward older entries, clamped at the oldest.
    fn history_up(&self, buf: &mut LineBuffer, hist_pos: &mut usize) {
        if self.history.is_empty() {
            return;
        }
        if *hist_pos > 0 {
            *hist_pos -= 1;
        }
        buf.set_text(&self.history[*hist_pos].command);
    }

    /// Down-arrow: one step toward newer entries; at or past the newest the
    /// buffer clears to an empty line.
    fn history_down(&self, buf: &mut LineBuffer, hist_pos: &mut usize) {
        if *hist_pos < self.history.len() {
            *hist_pos += 1;
        }
        if *hist_pos >= self.history.len() {
            buf.clear();
        } else {
            buf.set_text(&self.history[*hist_pos].command);
        }
    }

    /// Tab: one candidate splices in place of the token under the cursor;
    /// many are listed tab-separated on a fresh line with the buffer left
    /// alone; zero is no visible effect.
    fn handle_tab(&mut self, buf: &mut LineBuffer) -> Result<()> {
        let completion = completion::complete(buf.as_bytes(), buf.cursor(), self.env);
        match completion.candidates.as_slice() {
            [] => Ok(()),
            [only] => {
                buf.splice(completion.start, &only.insert);
                self.draw(buf)
            }
            many => {
                self.output.write_all(b"\n")?;
                let listing: Vec<&str> = many.iter().map(|c| c.display.as_str()).collect();
                self.output.write_all(listing.join("\t").as_bytes())?;
                self.output.write_all(b"\n")?;
                self.draw(buf)
            }
        }
    }

    /// Redraw the edit line: return to column 0, clear, print prompt and
    /// buffer, then park the terminal cursor at the logical cursor.
    fn draw(&mut self, buf: &LineBuffer) -> Result<()> {
        write!(self.output, "\r\x1b[K{}{}", self.prompt, buf.text())?;
        // back is a byte count, not display columns; on multi-byte text the
        // parked cursor can sit inside a glyph's byte run
        let back = buf.len() - buf.cursor();
        if back > 0 {
            write!(self.output, "\x1b[{back}D")?;
        }
        self.output.flush()?;
        Ok(())
    }
}
