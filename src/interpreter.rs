use crate::command::{CommandFactory, ExitCode};
use crate::editor::{EditOutcome, LineEditor};
use crate::env::Environment;
use crate::history::{HistoryEntry, HistoryStore};
use crate::launcher;
use crate::lexer;
use crate::term::RawMode;
use anyhow::Result;
use std::io::{self, Write};
use tracing::{debug, warn};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate: the built-ins and
/// ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The interactive shell: an [`Environment`], an ordered list of
/// [`CommandFactory`] objects queried to create commands by name, and the
/// history store backing recall and the `history` built-in.
///
/// See [`Default`] for the factories included out of the box.
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    history: HistoryStore,
}

impl Interpreter {
    /// Create an interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        let env = Environment::capture();
        let history = HistoryStore::for_env(&env);
        Self {
            env,
            commands,
            history,
        }
    }

    /// Run a single command invocation by name with arguments, writing any
    /// built-in output to real stdout.
    pub fn run(&mut self, name: &str, args: &[&str]) -> Result<ExitCode> {
        self.run_with_output(name, args, &mut io::stdout())
    }

    /// Like [`run`](Self::run), but with a caller-supplied output sink.
    pub fn run_with_output(
        &mut self,
        name: &str,
        args: &[&str],
        stdout: &mut dyn Write,
    ) -> Result<ExitCode> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, args) {
                return cmd.execute(stdout, &mut self.env);
            }
        }
        Err(anyhow::anyhow!("command not found: {name}"))
    }

    /// The read-eval loop.
    ///
    /// Per cycle: raw mode on (scoped guard), edit a line, raw mode off,
    /// record the line, tokenize, dispatch. Built-in and launch failures
    /// print to stderr and the loop continues; only Ctrl-D on an empty line
    /// or the `exit` built-in end it.
    pub fn repl(&mut self, prompt: &str) -> Result<()> {
        launcher::install_interrupt_forwarding();

        // in-memory mirror the editor recalls from between keystrokes
        let mut entries: Vec<HistoryEntry> = self.history.read_all().unwrap_or_default();

        loop {
            // the guard drops at the end of the block, so the terminal is
            // back in cooked mode before anything below runs
            let outcome = {
                let _raw = RawMode::enter()?;
                let stdin = io::stdin();
                let stdout = io::stdout();
                let mut editor =
                    LineEditor::new(stdin.lock(), stdout.lock(), prompt, &entries, &self.env);
                editor.read_line()
            };

            let line = match outcome? {
                EditOutcome::Eof => break,
                EditOutcome::Line(line) => line.trim().to_string(),
            };
            if line.is_empty() {
                continue;
            }

            if let Err(e) = self.history.append(&line) {
                warn!(error = %e, "could not record history entry");
            }
            entries = self.history.read_all().unwrap_or_default();

            let argv = lexer::split_line(&line, &self.env);
            let Some((name, rest)) = argv.split_first() else {
                continue;
            };
            let args: Vec<&str> = rest.iter().map(|s| s.as_str()).collect();

            match self.run(name, &args) {
                Ok(code) => {
                    if code != 0 {
                        debug!(code, command = %name, "command reported failure");
                    }
                }
                Err(e) => eprintln!("krill: {e}"),
            }

            if self.env.should_exit {
                break;
            }
        }
        Ok(())
    }
}

impl Default for Interpreter {
    /// An interpreter with every built-in plus the external launcher, which
    /// matches last and unconditionally.
    fn default() -> Self {
        use crate::builtin::*;
        use crate::launcher::ExternalCommand;
        Self::new(vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Export>::default()),
            Box::new(Factory::<Help>::default()),
            Box::new(Factory::<Clear>::default()),
            Box::new(Factory::<Fish>::default()),
            Box::new(Factory::<History>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_dispatch_by_name() {
        let mut sh = Interpreter::default();
        let mut out = Vec::new();
        let code = sh
            .run_with_output("echo", &["hello", "world"], &mut out)
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn test_unknown_name_falls_through_to_the_launcher() {
        let _lock = crate::launcher::LAUNCH_LOCK.lock().unwrap();
        let mut sh = Interpreter::default();
        let mut out = Vec::new();
        let code = sh
            .run_with_output("krill-no-such-program-86420", &[], &mut out)
            .unwrap();
        assert_eq!(code, 127);
    }

    #[test]
    fn test_exit_flag_reaches_the_environment() {
        let mut sh = Interpreter::default();
        let mut out = Vec::new();
        sh.run_with_output("exit", &[], &mut out).unwrap();
        assert!(sh.env.should_exit);
    }
}
