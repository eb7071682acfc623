use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::history::{self, HistoryStore};
use crate::interpreter::Factory;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use std::io::Write;

/// Names of every built-in, in dispatch order. Consumed by the completion
/// engine when proposing candidates for the command position.
pub const BUILTIN_NAMES: &[&str] = &[
    "cd", "exit", "echo", "export", "help", "clear", "fish", "history",
];

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the provided output sink and environment.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for
    /// error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match T::execute(*self, stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                // user/command errors go to stderr; the loop continues
                eprintln!("krill: {}: {e}", T::name());
                Ok(1)
            }
        }
    }
}

/// Fallback command produced when argh rejects the arguments: prints the
/// usage text argh generated and reports failure.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        stdout.write_all(self.output.as_bytes())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// the directory to change to
    pub dir: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let Some(dir) = self.dir else {
            bail!("expected argument");
        };
        std::env::set_current_dir(&dir).with_context(|| dir.clone())?;
        env.current_dir = std::env::current_dir()?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print each argument on its own line.
pub struct Echo {
    #[argh(positional, greedy)]
    /// the words to print
    pub words: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        for word in &self.words {
            writeln!(stdout, "{word}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set an environment variable for this shell and its children.
pub struct Export {
    #[argh(positional)]
    /// an assignment of the form KEY=VALUE
    pub assignment: String,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let Some((key, val)) = self.assignment.split_once('=') else {
            bail!("expected KEY=VALUE, got {:?}", self.assignment);
        };
        if key.is_empty() {
            bail!("empty variable name");
        }
        env.set_var(key, val);
        // children exec with the process environment; keep it in sync
        unsafe {
            std::env::set_var(key, val);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show the list of built-in commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "krill, a small interactive shell")?;
        writeln!(stdout, "The following commands are built in:")?;
        for name in BUILTIN_NAMES {
            writeln!(stdout, "\t{name}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Clear the screen.
pub struct Clear {}

impl BuiltinCommand for Clear {
    fn name() -> &'static str {
        "clear"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        // clear, then home
        write!(stdout, "\x1b[2J\x1b[H")?;
        stdout.flush()?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Draw a fish.
pub struct Fish {}

impl BuiltinCommand for Fish {
    fn name() -> &'static str {
        "fish"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "  /---\\   /| ")?;
        writeln!(stdout, " /@   -__/ |  ")?;
        writeln!(stdout, " \\    /--/\\|")?;
        writeln!(stdout, "  ---/        ")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Display or manipulate the command history.
pub struct History {
    #[argh(switch)]
    /// delete the selected entries instead of printing them
    pub delete: bool,

    #[argh(switch)]
    /// erase the entire history; accepts no other argument
    pub clear: bool,

    #[argh(positional, greedy)]
    /// an optional id or id range, followed by substring filters
    pub args: Vec<String>,
}

impl History {
    /// Split the positional arguments into an id range and filters: up to
    /// two leading numbers select `[start, end]` (one number selects just
    /// that id); everything after is a substring filter.
    fn parse_selection(&self) -> (usize, usize, Vec<String>) {
        let mut rest = self.args.as_slice();
        let mut start = 0;
        let mut end = 0;

        if let Some(n) = rest.first().and_then(|a| a.parse::<usize>().ok()) {
            start = n;
            end = n;
            rest = &rest[1..];
            if let Some(m) = rest.first().and_then(|a| a.parse::<usize>().ok()) {
                end = m;
                rest = &rest[1..];
            }
        }

        (start, end, rest.to_vec())
    }
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let store = HistoryStore::for_env(env);

        if self.clear {
            if self.delete || !self.args.is_empty() {
                bail!("--clear does not accept any other argument");
            }
            store.clear()?;
            return Ok(0);
        }

        let (start, end, filters) = self.parse_selection();
        let mut entries = store.read_all()?;

        if self.delete {
            store.delete(&mut entries, &filters, start, end)?;
            return Ok(0);
        }

        for idx in history::select(&entries, &filters, start, end) {
            writeln!(stdout, "{}", history::format_entry(&entries[idx]))?;
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env as stdenv;
    use std::fs;

    fn test_env() -> Environment {
        Environment {
            vars: HashMap::new(),
            current_dir: stdenv::current_dir().unwrap(),
            should_exit: false,
        }
    }

    /// Environment whose HOME points at a fresh temp directory, so the
    /// history builtin works against a private file.
    fn env_with_home(name: &str) -> (Environment, std::path::PathBuf) {
        let mut home = stdenv::temp_dir();
        home.push(format!("krill_home_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&home);
        fs::create_dir_all(&home).unwrap();
        let mut env = test_env();
        env.set_var("HOME", home.to_string_lossy().to_string());
        (env, home)
    }

    #[test]
    fn test_echo_prints_one_word_per_line() {
        let mut env = test_env();
        let echo = Echo {
            words: vec!["hello".to_string(), "world".to_string()],
        };
        let mut out = Vec::new();
        let code = Box::new(echo).execute(&mut out, &mut env).unwrap();
        assert_eq!(code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn test_cd_without_argument_is_a_user_error() {
        let mut env = test_env();
        let orig = stdenv::current_dir().unwrap();
        let cd: Box<dyn ExecutableCommand> = Box::new(Cd { dir: None });
        let mut out = Vec::new();
        let code = cd.execute(&mut out, &mut env).unwrap();
        assert_eq!(code, 1);
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_exit_sets_the_flag() {
        let mut env = test_env();
        let mut out = Vec::new();
        let code = Box::new(Exit {}).execute(&mut out, &mut env).unwrap();
        assert_eq!(code, 0);
        assert!(env.should_exit);
    }

    #[test]
    fn test_export_sets_variable() {
        let mut env = test_env();
        let export = Export {
            assignment: "KRILL_EXPORT_TEST=onward".to_string(),
        };
        let mut out = Vec::new();
        let code = Box::new(export).execute(&mut out, &mut env).unwrap();
        assert_eq!(code, 0);
        assert_eq!(env.get_var("KRILL_EXPORT_TEST"), Some("onward"));
    }

    #[test]
    fn test_export_rejects_missing_equals() {
        let mut env = test_env();
        let export: Box<dyn ExecutableCommand> = Box::new(Export {
            assignment: "NOEQ".to_string(),
        });
        let mut out = Vec::new();
        let code = export.execute(&mut out, &mut env).unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn test_help_lists_every_builtin() {
        let mut env = test_env();
        let mut out = Vec::new();
        Box::new(Help {}).execute(&mut out, &mut env).unwrap();
        let text = String::from_utf8(out).unwrap();
        for name in BUILTIN_NAMES {
            assert!(text.contains(name), "help output missing {name}");
        }
    }

    #[test]
    fn test_history_prints_entries_with_aligned_ids() {
        let (mut env, home) = env_with_home("print");
        let store = HistoryStore::for_env(&env);
        store.append("ls").unwrap();
        store.append("pwd").unwrap();

        let hist = History {
            delete: false,
            clear: false,
            args: Vec::new(),
        };
        let mut out = Vec::new();
        let code = Box::new(hist).execute(&mut out, &mut env).unwrap();
        assert_eq!(code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "    1  ls\n    2  pwd\n");

        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn test_history_clear_rejects_extra_arguments() {
        let (mut env, home) = env_with_home("clear_args");
        let store = HistoryStore::for_env(&env);
        store.append("precious").unwrap();

        let hist: Box<dyn ExecutableCommand> = Box::new(History {
            delete: false,
            clear: true,
            args: vec!["5".to_string()],
        });
        let mut out = Vec::new();
        let code = hist.execute(&mut out, &mut env).unwrap();
        assert_eq!(code, 1);
        // the backing file is untouched
        assert_eq!(store.read_all().unwrap().len(), 1);

        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn test_history_delete_by_id_renumbers() {
        let (mut env, home) = env_with_home("delete");
        let store = HistoryStore::for_env(&env);
        for cmd in ["one", "two", "three"] {
            store.append(cmd).unwrap();
        }

        let hist = History {
            delete: true,
            clear: false,
            args: vec!["2".to_string()],
        };
        let mut out = Vec::new();
        Box::new(hist).execute(&mut out, &mut env).unwrap();

        let entries = store.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id, 2);
        assert_eq!(entries[1].command, "three");

        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn test_history_single_number_selects_one_entry() {
        let (mut env, home) = env_with_home("single");
        let store = HistoryStore::for_env(&env);
        for cmd in ["alpha", "beta", "gamma"] {
            store.append(cmd).unwrap();
        }

        let hist = History {
            delete: false,
            clear: false,
            args: vec!["2".to_string()],
        };
        let mut out = Vec::new();
        Box::new(hist).execute(&mut out, &mut env).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "    2  beta\n");

        let _ = fs::remove_dir_all(home);
    }
}
