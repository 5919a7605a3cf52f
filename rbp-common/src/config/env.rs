//! Environment variable overrides with type safety.
//!
//! Every getter takes the value inherited from the lower layers (defaults or
//! the config file) and returns it unchanged unless the `RBP_` variable is
//! set. Parse failures are collected so they can all be reported at once.

use super::source::{ConfigSource, Sourced};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

type Lookup = Box<dyn Fn(&str) -> Option<String>>;

/// Type-safe `RBP_*` environment parser.
pub struct EnvParser {
    prefix: &'static str,
    lookup: Lookup,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Parser reading the process environment.
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Parser reading variables through `lookup` instead of the process env.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + 'static) -> Self {
        Self {
            prefix: "RBP_",
            lookup: Box::new(lookup),
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn read(&self, name: &str) -> (String, Option<String>) {
        let var_name = self.var_name(name);
        let value = (self.lookup)(&var_name);
        (var_name, value)
    }

    pub fn get_string(&mut self, name: &str, inherited: Sourced<String>) -> Sourced<String> {
        match self.read(name) {
            (var, Some(value)) => Sourced::from_env(value, var),
            (_, None) => inherited,
        }
    }

    /// Optional string; an empty variable clears the inherited value.
    pub fn get_optional_string(
        &mut self,
        name: &str,
        inherited: Sourced<Option<String>>,
    ) -> Sourced<Option<String>> {
        match self.read(name) {
            (var, Some(value)) if value.is_empty() => Sourced::from_env(None, var),
            (var, Some(value)) => Sourced::from_env(Some(value), var),
            (_, None) => inherited,
        }
    }

    /// Accepts 1/true/yes/on and 0/false/no/off/"" (case-insensitive).
    pub fn get_bool(&mut self, name: &str, inherited: Sourced<bool>) -> Sourced<bool> {
        let (var, Some(value)) = self.read(name) else {
            return inherited;
        };
        match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Sourced::from_env(true, var),
            "0" | "false" | "no" | "off" | "" => Sourced::from_env(false, var),
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                inherited
            }
        }
    }

    pub fn get_u16_range(
        &mut self,
        name: &str,
        inherited: Sourced<u16>,
        min: u16,
        max: u16,
    ) -> Sourced<u16> {
        let (var, Some(value)) = self.read(name) else {
            return inherited;
        };
        match value.trim().parse::<u16>() {
            Ok(n) if (min..=max).contains(&n) => Sourced::from_env(n, var),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                inherited
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var,
                    expected: "unsigned 16-bit integer".to_string(),
                    value,
                });
                inherited
            }
        }
    }

    /// Path with `~` expansion.
    pub fn get_path(&mut self, name: &str, inherited: Sourced<PathBuf>) -> Sourced<PathBuf> {
        match self.read(name) {
            (var, Some(value)) => {
                Sourced::from_env(PathBuf::from(shellexpand::tilde(&value).as_ref()), var)
            }
            (_, None) => inherited,
        }
    }

    pub fn get_log_level(&mut self, name: &str, inherited: Sourced<String>) -> Sourced<String> {
        let (var, Some(value)) = self.read(name) else {
            return inherited;
        };
        let lower = value.to_lowercase();
        match lower.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => Sourced::from_env(lower, var),
            _ => {
                self.errors.push(EnvError::InvalidLogLevel { var, value });
                inherited
            }
        }
    }

    /// Comma-separated list; an empty variable yields an empty list.
    pub fn get_string_list(
        &mut self,
        name: &str,
        inherited: Sourced<Vec<String>>,
    ) -> Sourced<Vec<String>> {
        match self.read(name) {
            (var, Some(value)) => {
                let items = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                Sourced::from_env(items, var)
            }
            (_, None) => inherited,
        }
    }

    /// Any `FromStr` value; `expected` names the accepted forms in errors.
    pub fn get_parsed<T: FromStr>(
        &mut self,
        name: &str,
        inherited: Sourced<T>,
        expected: &str,
    ) -> Sourced<T> {
        let (var, Some(value)) = self.read(name) else {
            return inherited;
        };
        match value.trim().parse::<T>() {
            Ok(parsed) => Sourced::from_env(parsed, var),
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var,
                    expected: expected.to_string(),
                    value,
                });
                inherited
            }
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a value that came from the config file or the defaults.
pub(crate) fn layered<T>(value: T, from_file: bool) -> Sourced<T> {
    let source = if from_file {
        ConfigSource::File
    } else {
        ConfigSource::Default
    };
    Sourced::inherited(value, source)
}
