//! Shared utilities for rbp.

use std::borrow::Cow;
use std::path::Path;

/// Quote one word for a POSIX shell, leaving plain words untouched.
pub fn shell_quote(word: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(word))
}

/// Quote a path for a POSIX shell.
pub fn shell_quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy()).into_owned()
}

/// Join words into one shell command line.
pub fn join_command<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| shell_quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `name` is usable as a shell variable name.
pub fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
