//! Startup configuration: a `KEY=VALUE` file that customizes the prompt.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Base prompt every configuration starts from.
const BASE_PROMPT: &str = "$ ";

/// Name of the per-user configuration file, resolved under `HOME`.
const CONFIG_FILE_NAME: &str = ".krill.conf";

/// Settings loaded at startup. Currently only the prompt is configurable.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prompt string printed before every line edit.
    pub prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: BASE_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the given path.
    ///
    /// A missing or unreadable file yields the defaults. Malformed lines are
    /// tolerated individually: blank lines, `#` comments and lines without a
    /// `=` are skipped. Only the `PROMPT` key is consumed; its value is
    /// appended to the base prompt.
    pub fn load(path: &Path) -> Self {
        let mut config = Self::default();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no config file, using defaults");
                return config;
            }
        };

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else {
                continue;
            };
            if key == "PROMPT" {
                config.prompt = format!("{BASE_PROMPT}{val}");
            }
        }
        config
    }

    /// Load configuration from `$HOME/.krill.conf`, falling back to defaults
    /// when `HOME` is unset or the file is absent.
    pub fn load_default() -> Self {
        match std::env::var("HOME") {
            Ok(home) => Self::load(&PathBuf::from(home).join(CONFIG_FILE_NAME)),
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::env as stdenv;
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let mut path = stdenv::temp_dir();
        path.push(format!("krill_conf_{}_{}", name, std::process::id()));
        let mut f = fs::File::create(&path).expect("create temp config");
        write!(f, "{contents}").expect("write temp config");
        path
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(&PathBuf::from("/nonexistent/krill.conf"));
        assert_eq!(config.prompt, "$ ");
    }

    #[test]
    fn test_prompt_key_appends_to_base() {
        let path = temp_config("prompt", "PROMPT=krill> \n");
        let config = Config::load(&path);
        assert_eq!(config.prompt, "$ krill> ");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_comments_blanks_and_malformed_lines_are_skipped() {
        let path = temp_config(
            "tolerant",
            "# a comment\n\nnot a key value pair\nOTHER=ignored\nPROMPT=>>\n",
        );
        let config = Config::load(&path);
        assert_eq!(config.prompt, "$ >>");
        let _ = fs::remove_file(path);
    }
}
