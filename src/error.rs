//! Validation and configuration error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A tree-structured validation failure.
///
/// A leaf error describes one concrete problem (a wrong type, a missing
/// value, an unexpected field). A parent error carries a generic message
/// ("Object does not match schema") and aggregates the actionable detail
/// in its children, so a caller sees every problem in one pass.
///
/// The `path` locates the failure in the value tree, one segment per
/// object key or array index descended.
///
/// # Example
///
/// ```
/// use trellis::Structure;
///
/// let schema = Structure::object(vec![("name", Structure::string())]);
/// let input = serde_json::json!({ "name": 42, "extra": true });
///
/// let error = schema.process(Some(&input)).unwrap_err();
/// assert_eq!(error.children().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    message: String,
    path: Vec<String>,
    children: Vec<ValidationError>,
}

impl ValidationError {
    /// Creates a leaf error at the given path.
    #[must_use]
    pub fn new(message: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            message: message.into(),
            path,
            children: Vec::new(),
        }
    }

    /// Creates an aggregate error whose detail lives in `children`.
    #[must_use]
    pub fn with_children(
        message: impl Into<String>,
        path: Vec<String>,
        children: Vec<ValidationError>,
    ) -> Self {
        Self {
            message: message.into(),
            path,
            children,
        }
    }

    /// Wraps a foreign error (for example a URL parse failure) at the
    /// given path.
    ///
    /// A `ValidationError` is never re-wrapped: code that already holds
    /// one propagates it with `?`, keeping the innermost path intact.
    #[must_use]
    pub fn chain(source: &dyn std::error::Error, path: Vec<String>) -> Self {
        Self::new(source.to_string(), path)
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the path segments identifying where the failure occurred.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Returns the child errors of an aggregate; empty for a leaf.
    #[must_use]
    pub fn children(&self) -> &[ValidationError] {
        &self.children
    }

    /// Returns the dot-joined path, or `"."` for the root.
    #[must_use]
    pub fn dotted_path(&self) -> String {
        if self.path.is_empty() {
            ".".to_string()
        } else {
            self.path.join(".")
        }
    }

    /// Formats as `"<dotted path> — <message>"`.
    #[must_use]
    pub fn one_liner(&self) -> String {
        format!("{} — {}", self.dotted_path(), self.message)
    }

    /// Iterates the leaf errors, depth-first.
    ///
    /// Aggregate nodes are never yielded; arbitrarily deep nesting is
    /// flattened down to the deepest problems. A leaf error yields itself.
    #[must_use]
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves { stack: vec![self] }
    }

    /// Renders a multi-line human-readable report: the top message
    /// followed by each leaf one-liner, indented two spaces and sorted
    /// lexicographically for deterministic output.
    #[must_use]
    pub fn to_friendly_string(&self) -> String {
        let mut lines: Vec<String> = self.leaves().map(|leaf| leaf.one_liner()).collect();
        lines.sort();

        let mut out = self.message.clone();
        for line in &lines {
            out.push_str("\n  ");
            out.push_str(line);
        }
        out
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.one_liner())
    }
}

impl std::error::Error for ValidationError {}

impl<'a> IntoIterator for &'a ValidationError {
    type Item = &'a ValidationError;
    type IntoIter = Leaves<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.leaves()
    }
}

/// Depth-first iterator over the leaf errors of a [`ValidationError`].
#[derive(Debug)]
pub struct Leaves<'a> {
    stack: Vec<&'a ValidationError>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a ValidationError;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(error) = self.stack.pop() {
            if error.children.is_empty() {
                return Some(error);
            }
            for child in error.children.iter().rev() {
                self.stack.push(child);
            }
        }
        None
    }
}

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration did not match its structure.
    #[error("configuration failed validation: {0}")]
    Validation(#[from] ValidationError),

    /// Failed to read a configuration source.
    #[error("failed to read configuration source: {path}")]
    ReadError {
        /// Path to the source.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error.
    #[error("failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    /// Creates a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }
}
