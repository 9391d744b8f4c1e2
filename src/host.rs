//! The collaborator interface to the surrounding platform.
//!
//! The core never touches the filesystem, environment, or process
//! arguments directly; it asks a [`Host`]. [`SystemHost`] is the real
//! implementation, [`MemoryHost`] an in-memory one for tests and
//! embedding.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;

use crate::error::ConfigError;

/// Platform services required by the configuration layer.
pub trait Host: Send + Sync {
    /// Reads a text resource. Returns `Ok(None)` when the resource does
    /// not exist; any other I/O failure is an error.
    fn read_text(&self, source: &str) -> Result<Option<String>, ConfigError>;

    /// Reads a named environment variable.
    fn env_var(&self, key: &str) -> Option<String>;

    /// Reads a named CLI flag. `--flag=value` and `--flag value` yield
    /// the value; a bare `--flag` yields the empty string.
    fn arg(&self, flag: &str) -> Option<String>;
}

/// [`Host`] backed by the real filesystem, environment, and process
/// arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    fn read_text(&self, source: &str) -> Result<Option<String>, ConfigError> {
        match fs::read_to_string(source) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::read_error(source, e)),
        }
    }

    fn env_var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn arg(&self, flag: &str) -> Option<String> {
        find_arg(env::args().skip(1), flag)
    }
}

/// Scans an argument list for `--flag=value`, `--flag value`, or a bare
/// `--flag`.
fn find_arg(args: impl Iterator<Item = String>, flag: &str) -> Option<String> {
    let bare = format!("--{flag}");
    let assigned = format!("--{flag}=");

    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix(&assigned) {
            return Some(value.to_string());
        }
        if arg == bare {
            return match args.peek() {
                Some(next) if !next.starts_with("--") => Some(next.clone()),
                _ => Some(String::new()),
            };
        }
    }
    None
}

/// In-memory [`Host`] for tests: files, environment, and arguments are
/// plain maps.
///
/// # Example
///
/// ```
/// use trellis::{Host, MemoryHost};
///
/// let host = MemoryHost::new()
///     .with_file("config.json", r#"{ "name": "api" }"#)
///     .with_env("APP_ENV", "staging")
///     .with_arg("verbose", "");
///
/// assert_eq!(host.env_var("APP_ENV").as_deref(), Some("staging"));
/// assert_eq!(host.arg("verbose").as_deref(), Some(""));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    files: HashMap<String, String>,
    env: HashMap<String, String>,
    args: HashMap<String, String>,
}

impl MemoryHost {
    /// Creates an empty host: no files, no environment, no arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a readable text resource.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(name.into(), contents.into());
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Adds a CLI flag. Use an empty value for a bare flag.
    #[must_use]
    pub fn with_arg(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(flag.into(), value.into());
        self
    }
}

impl Host for MemoryHost {
    fn read_text(&self, source: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.files.get(source).cloned())
    }

    fn env_var(&self, key: &str) -> Option<String> {
        self.env.get(key).cloned()
    }

    fn arg(&self, flag: &str) -> Option<String> {
        self.args.get(flag).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<'a>(list: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
        list.iter().map(ToString::to_string)
    }

    #[test]
    fn test_find_arg_assigned() {
        assert_eq!(
            find_arg(args(&["--port=9000", "--verbose"]), "port").as_deref(),
            Some("9000")
        );
    }

    #[test]
    fn test_find_arg_separate_value() {
        assert_eq!(
            find_arg(args(&["--port", "9000"]), "port").as_deref(),
            Some("9000")
        );
    }

    #[test]
    fn test_find_arg_bare_flag() {
        assert_eq!(
            find_arg(args(&["--verbose", "--port=1"]), "verbose").as_deref(),
            Some("")
        );
        assert_eq!(find_arg(args(&["--verbose"]), "verbose").as_deref(), Some(""));
    }

    #[test]
    fn test_find_arg_absent() {
        assert_eq!(find_arg(args(&["--other=1"]), "port"), None);
    }

    #[test]
    fn test_system_host_missing_file_is_none() {
        let host = SystemHost;
        assert!(host
            .read_text("/nonexistent/trellis-test-config.json")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_memory_host_lookups() {
        let host = MemoryHost::new()
            .with_file("a.json", "{}")
            .with_env("KEY", "value");

        assert_eq!(host.read_text("a.json").unwrap().as_deref(), Some("{}"));
        assert!(host.read_text("b.json").unwrap().is_none());
        assert_eq!(host.env_var("KEY").as_deref(), Some("value"));
        assert!(host.env_var("OTHER").is_none());
        assert!(host.arg("port").is_none());
    }
}
