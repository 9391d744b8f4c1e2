//! Top-level configuration loading.
//!
//! [`ConfigLoader::load`] reads a configuration document, validates it
//! against a [`Structure`], resolves every deferred `external` sub-tree,
//! and returns the fully-resolved value. A missing document is not an
//! error: the structure is validated against an empty object, so every
//! field resolves through its flag, variable, or fallback.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis::{field, ConfigLoader, MemoryHost, Structure};
//!
//! let schema = Structure::object(vec![
//!     ("env", field::string("development").variable("APP_ENV").build()),
//! ]);
//!
//! let loader = ConfigLoader::with_host(Arc::new(MemoryHost::new()));
//! let value = loader.load("missing.json", &schema)?;
//! assert_eq!(value["env"], "development");
//! # Ok::<(), trellis::ConfigError>(())
//! ```

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::{Context, DeferredWorkList};
use crate::error::ConfigError;
use crate::host::{Host, SystemHost};
use crate::structure::Structure;

/// Loads configuration documents against a [`Structure`].
pub struct ConfigLoader {
    host: Arc<dyn Host>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader over the real filesystem, environment, and
    /// process arguments.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: Arc::new(SystemHost),
        }
    }

    /// Creates a loader over an explicit [`Host`].
    #[must_use]
    pub fn with_host(host: Arc<dyn Host>) -> Self {
        Self { host }
    }

    /// Loads a `.env` file into the process environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Loads `source`, validates it, and resolves all deferred work.
    ///
    /// A missing source validates an empty object instead of failing. A
    /// top-level `$schema` key in the document is stripped before
    /// validation, per JSON Schema convention, rather than rejected as an
    /// additional field. Validation failures are logged as a friendly
    /// multi-line report before being returned; no error is swallowed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the document does not
    /// match the structure, or a read/parse error for a source that
    /// exists but cannot be used.
    pub fn load(&self, source: &str, structure: &Structure) -> Result<Value, ConfigError> {
        match self.try_load(source, structure) {
            Ok(value) => Ok(value),
            Err(ConfigError::Validation(error)) => {
                tracing::error!(
                    source,
                    "configuration failed validation:\n{}",
                    error.to_friendly_string()
                );
                Err(ConfigError::Validation(error))
            }
            Err(error) => {
                tracing::error!(source, error = %error, "failed to load configuration");
                Err(error)
            }
        }
    }

    fn try_load(&self, source: &str, structure: &Structure) -> Result<Value, ConfigError> {
        let deferred = DeferredWorkList::new();
        let context = Context::for_load(Arc::clone(&self.host), deferred.clone());

        let input = match self.host.read_text(source)? {
            Some(text) => strip_schema_key(parse_document(source, &text)?),
            None => Value::Object(Map::new()),
        };

        let mut value = structure.process_in(Some(&input), &context)?;
        self.drain(&deferred, &mut value)?;
        Ok(value)
    }

    /// Drains the deferred work list until it is truly empty.
    ///
    /// Each task reads its source (falling back to the inline value the
    /// main document carried at that position), validates it at the
    /// recorded path, and merges the result into the placeholder slot.
    /// Validating may enqueue further tasks (a nested `external`), so
    /// the loop re-checks the list rather than taking one snapshot.
    fn drain(&self, deferred: &DeferredWorkList, root: &mut Value) -> Result<(), ConfigError> {
        while let Some(task) = deferred.pop() {
            let raw = match self.host.read_text(&task.source)? {
                Some(text) => Some(strip_schema_key(parse_document(&task.source, &text)?)),
                None => task.inline.clone(),
            };

            let context = Context::resume(
                Arc::clone(&self.host),
                deferred.clone(),
                task.path.clone(),
            );
            let resolved = task.structure.process_in(raw.as_ref(), &context)?;
            merge_at_path(root, &task.path, resolved);
        }
        Ok(())
    }
}

/// Parses a document by extension: `.toml` via the TOML parser,
/// everything else as JSON.
fn parse_document(source: &str, text: &str) -> Result<Value, ConfigError> {
    let is_toml = Path::new(source)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    if is_toml {
        Ok(toml::from_str(text)?)
    } else {
        Ok(serde_json::from_str(text)?)
    }
}

/// Removes a top-level `$schema` key so self-documenting configuration
/// files do not trip the closed-schema check.
fn strip_schema_key(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
    }
    value
}

/// Merges `value` into the slot at `path`, the storage location the
/// placeholder already occupies: objects gain the resolved keys, arrays
/// the resolved items.
fn merge_at_path(root: &mut Value, path: &[String], value: Value) {
    let Some(slot) = locate(root, path) else {
        return;
    };
    match (slot, value) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, item) in incoming {
                target.insert(key, item);
            }
        }
        (Value::Array(target), Value::Array(incoming)) => {
            target.extend(incoming);
        }
        (slot, incoming) => *slot = incoming,
    }
}

fn locate<'a>(root: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;
    use crate::host::MemoryHost;
    use serde_json::json;
    use std::io::Write;

    fn loader(host: MemoryHost) -> ConfigLoader {
        ConfigLoader::with_host(Arc::new(host))
    }

    #[test]
    fn test_missing_file_resolves_fallbacks() {
        let schema = Structure::object(vec![(
            "env",
            field::string("development").variable("APP_ENV").build(),
        )]);

        let value = loader(MemoryHost::new()).load("missing.json", &schema).unwrap();
        assert_eq!(value, json!({ "env": "development" }));
    }

    #[test]
    fn test_document_values_validated() {
        let schema = Structure::object(vec![
            ("name", Structure::string()),
            ("port", field::number(80.0).build()),
        ]);
        let host =
            MemoryHost::new().with_file("config.json", r#"{ "name": "api", "port": 3000 }"#);

        let value = loader(host).load("config.json", &schema).unwrap();
        assert_eq!(value, json!({ "name": "api", "port": 3000 }));
    }

    #[test]
    fn test_schema_key_stripped() {
        let schema = Structure::object(vec![("name", Structure::string())]);
        let host = MemoryHost::new().with_file(
            "config.json",
            r#"{ "$schema": "https://example.com/schema.json", "name": "a" }"#,
        );

        let value = loader(host).load("config.json", &schema).unwrap();
        assert_eq!(value, json!({ "name": "a" }));
    }

    #[test]
    fn test_flag_beats_variable_beats_document() {
        let schema = Structure::object(vec![(
            "port",
            field::number(80.0).flag("port").variable("APP_PORT").build(),
        )]);
        let host = MemoryHost::new()
            .with_file("config.json", r#"{ "port": 3000 }"#)
            .with_env("APP_PORT", "8080")
            .with_arg("port", "9000");

        let value = loader(host).load("config.json", &schema).unwrap();
        assert_eq!(value, json!({ "port": 9000.0 }));
    }

    #[test]
    fn test_validation_error_propagates() {
        let schema = Structure::object(vec![("name", Structure::string())]);
        let host = MemoryHost::new().with_file("config.json", r#"{ "name": 42 }"#);

        let error = loader(host).load("config.json", &schema).unwrap_err();
        assert!(matches!(error, ConfigError::Validation(_)));
    }

    #[test]
    fn test_malformed_json_propagates() {
        let schema = Structure::object(vec![]);
        let host = MemoryHost::new().with_file("config.json", "{ not json");

        let error = loader(host).load("config.json", &schema).unwrap_err();
        assert!(matches!(error, ConfigError::Json(_)));
    }

    #[test]
    fn test_toml_document() {
        let schema = Structure::object(vec![
            ("name", Structure::string()),
            ("port", Structure::number()),
        ]);
        let host = MemoryHost::new().with_file("config.toml", "name = \"api\"\nport = 3000\n");

        let value = loader(host).load("config.toml", &schema).unwrap();
        assert_eq!(value["name"], "api");
        assert_eq!(value["port"], json!(3000));
    }

    // ==================== External Tests ====================

    #[test]
    fn test_external_merge() {
        let person = Structure::object(vec![
            ("name", Structure::string()),
            ("age", Structure::number()),
        ]);
        let schema = Structure::object(vec![(
            "person",
            Structure::external("object.json", person),
        )]);
        let host = MemoryHost::new()
            .with_file("config.json", r#"{ "person": {} }"#)
            .with_file(
                "object.json",
                r#"{ "name": "Geoff Testington", "age": 42 }"#,
            );

        let value = loader(host).load("config.json", &schema).unwrap();
        assert_eq!(
            value,
            json!({ "person": { "name": "Geoff Testington", "age": 42 } })
        );
    }

    #[test]
    fn test_external_array_merge() {
        let schema = Structure::object(vec![(
            "names",
            Structure::external("names.json", Structure::array(Structure::string())),
        )]);
        let host = MemoryHost::new()
            .with_file("config.json", r#"{ "names": [] }"#)
            .with_file("names.json", r#"["a", "b"]"#);

        let value = loader(host).load("config.json", &schema).unwrap();
        assert_eq!(value, json!({ "names": ["a", "b"] }));
    }

    #[test]
    fn test_external_missing_file_uses_inline_value() {
        let schema = Structure::object(vec![(
            "person",
            Structure::external(
                "absent.json",
                Structure::object(vec![("name", Structure::string_with("anonymous"))]),
            ),
        )]);
        let host =
            MemoryHost::new().with_file("config.json", r#"{ "person": { "name": "inline" } }"#);

        let value = loader(host).load("config.json", &schema).unwrap();
        assert_eq!(value, json!({ "person": { "name": "inline" } }));
    }

    #[test]
    fn test_external_placeholder_returned_before_drain() {
        let schema = Structure::external(
            "object.json",
            Structure::object(vec![("name", Structure::string())]),
        );
        let deferred = DeferredWorkList::new();
        let context = Context::for_load(Arc::new(MemoryHost::new()), deferred.clone());

        let placeholder = schema.process_in(Some(&json!({})), &context).unwrap();
        assert_eq!(placeholder, json!({}));
        assert_eq!(deferred.len(), 1);
    }

    #[test]
    fn test_nested_external_drains_enqueued_work() {
        // outer.json itself contains an external section: resolving the
        // first task enqueues a second, which the drain loop must pick up.
        let inner = Structure::object(vec![("name", Structure::string())]);
        let outer = Structure::object(vec![("inner", Structure::external("inner.json", inner))]);
        let schema = Structure::object(vec![("outer", Structure::external("outer.json", outer))]);

        let host = MemoryHost::new()
            .with_file("config.json", r#"{ "outer": {} }"#)
            .with_file("outer.json", r#"{ "inner": {} }"#)
            .with_file("inner.json", r#"{ "name": "deep" }"#);

        let value = loader(host).load("config.json", &schema).unwrap();
        assert_eq!(value, json!({ "outer": { "inner": { "name": "deep" } } }));
    }

    #[test]
    fn test_external_validation_failure_propagates() {
        let schema = Structure::object(vec![(
            "person",
            Structure::external(
                "object.json",
                Structure::object(vec![("age", Structure::number())]),
            ),
        )]);
        let host = MemoryHost::new()
            .with_file("config.json", r#"{ "person": {} }"#)
            .with_file("object.json", r#"{ "age": "old" }"#);

        let error = loader(host).load("config.json", &schema).unwrap_err();
        let ConfigError::Validation(error) = error else {
            panic!("expected a validation error");
        };
        let leaves: Vec<_> = error.leaves().collect();
        assert_eq!(leaves[0].path(), ["person", "age"]);
    }

    #[test]
    fn test_system_host_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{ "name": "on-disk" }}"#).unwrap();

        let schema = Structure::object(vec![("name", Structure::string())]);
        let value = ConfigLoader::new()
            .load(path.to_str().unwrap(), &schema)
            .unwrap();
        assert_eq!(value, json!({ "name": "on-disk" }));
    }

    #[test]
    fn test_merge_at_path_object_and_array() {
        let mut root = json!({ "a": { "b": {} }, "list": [] });
        merge_at_path(
            &mut root,
            &["a".to_string(), "b".to_string()],
            json!({ "x": 1 }),
        );
        merge_at_path(&mut root, &["list".to_string()], json!([1, 2]));
        assert_eq!(root, json!({ "a": { "b": { "x": 1 } }, "list": [1, 2] }));
    }
}
