//! A small interactive command shell.
//!
//! The crate covers the four pieces that make an interactive shell
//! interactive: a raw-terminal keystroke state machine that turns a byte
//! stream into an editable line ([`editor`]), a durable history store with
//! query and delete semantics ([`history`]), a context-sensitive tab
//! completion engine ([`completion`]), and a process launcher that runs a
//! child in its own process group and forwards terminal interrupts to it
//! ([`launcher`]). The [`Interpreter`] ties them together into a
//! read-eval loop; [`term`] manages the switch between cooked and raw
//! terminal discipline around each edit session.
//!
//! There are no pipelines, no redirection, no job control and no quoting
//! grammar; the tokenizer ([`lexer`]) splits on whitespace and substitutes
//! `$VAR`, nothing more.

mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod editor;
pub mod env;
pub mod history;
mod interpreter;
pub mod launcher;
pub mod lexer;
pub mod term;

/// Convenient re-export of the interactive command runner.
pub use interpreter::Interpreter;
