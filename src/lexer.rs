//! A deliberately thin tokenizer: whitespace splitting plus `$VAR` substitution.
//!
//! There is no quoting or escaping grammar; a token that begins with `$` is
//! replaced wholesale by the named variable's value, and dropped when the
//! variable is unset or empty.

use crate::env::Environment;

/// Split a command line into an argument vector.
pub fn split_line(line: &str, env: &Environment) -> Vec<String> {
    line.split_whitespace()
        .filter_map(|tok| match tok.strip_prefix('$') {
            Some(name) => match env.get_var(name) {
                Some(val) if !val.is_empty() => Some(val.to_string()),
                _ => None,
            },
            None => Some(tok.to_string()),
        })
        .collect()
}
