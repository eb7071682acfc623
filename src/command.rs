use crate::env::Environment;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success. The launcher maps exec failure to 127 and
/// death by signal `n` to `128 + n`, mirroring POSIX shell conventions.
pub type ExitCode = i32;

/// Object-safe trait for any command the shell can execute.
///
/// Built-ins write their output to the provided sink and run in-process;
/// external commands inherit the real stdio and run as a child process.
pub trait ExecutableCommand {
    /// Executes the command, consuming it.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`. Factories
/// are queried in order; the external-command factory sits last and matches
/// unconditionally, leaving "program not found" to the launcher itself.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
