//! The shell's view of its environment.
//!
//! Variables are captured from the process exactly once, at startup; from
//! then on the captured map is the single source of truth for lookups.
//! `export` writes both the map and the process environment (so launched
//! children inherit the change through `execvp`), but a lookup never
//! consults the process again.

use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// State threaded through every command: the variable map consulted by
/// completion, history and the built-ins, the working directory, and the
/// flag the REPL polls to know when to stop.
///
/// Fields are public; this crate's commands mutate the environment
/// directly rather than through accessors.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Variables as captured at startup plus any `export`s since.
    pub vars: HashMap<String, String>,
    /// The working directory commands run in.
    pub current_dir: PathBuf,
    /// Set by the `exit` built-in; ends the interactive loop.
    pub should_exit: bool,
}

impl Environment {
    /// Snapshot the process environment and working directory.
    pub fn capture() -> Self {
        Self {
            vars: stdenv::vars().collect(),
            current_dir: stdenv::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            should_exit: false,
        }
    }

    /// Look up a variable in the captured map.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::capture()
    }
}

#[cfg(test)]
mod tests {
    use super::Environment;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn test_capture_snapshots_process_variables() {
        let env = Environment::capture();
        assert!(env.get_var("PATH").is_some());
        assert!(!env.should_exit);
    }

    #[test]
    fn test_set_var_overrides_an_earlier_value() {
        let mut env = Environment::capture();
        env.set_var("KRILL_ENV_TEST", "first");
        env.set_var("KRILL_ENV_TEST", "second");
        assert_eq!(env.get_var("KRILL_ENV_TEST"), Some("second"));
    }

    #[test]
    fn test_lookup_never_falls_back_to_the_process() {
        // PATH exists in the process environment, but an empty map is
        // authoritative and must not see it
        let env = Environment {
            vars: HashMap::new(),
            current_dir: PathBuf::from("."),
            should_exit: false,
        };
        assert_eq!(env.get_var("PATH"), None);
    }
}
