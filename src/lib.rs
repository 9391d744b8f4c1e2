//! Composable schema validation and layered configuration loading.
//!
//! This crate provides two layers:
//!
//! - [`Structure`], a composable validator and coercer for untyped
//!   JSON-like values, with primitive structures (string, number,
//!   boolean, url, literal, null, any) and combinators (object, array,
//!   union). Failures come back as one path-aware [`ValidationError`]
//!   tree that reports every problem in a single pass.
//! - [`ConfigLoader`] plus [`field`] builders: value-source resolution
//!   on top of structures. Each field resolves through a layered
//!   precedence policy (CLI flag → environment variable → document
//!   value → fallback), sections can be split into separate files with
//!   [`Structure::external`], and the whole tree can describe itself as
//!   a usage table or JSON Schema.
//!
//! # Overview
//!
//! Build a structure once at startup, then load against it:
//!
//! ```
//! use std::sync::Arc;
//! use trellis::{field, ConfigLoader, MemoryHost, Structure};
//!
//! let schema = Structure::object(vec![
//!     ("env", field::string("development").variable("APP_ENV").build()),
//!     ("port", field::number(8080.0).flag("port").variable("APP_PORT").build()),
//!     ("verbose", field::boolean(false).flag("verbose").build()),
//! ]);
//!
//! // An in-memory host stands in for the filesystem, environment, and
//! // process arguments; ConfigLoader::new() uses the real ones.
//! let host = MemoryHost::new()
//!     .with_env("APP_ENV", "staging")
//!     .with_arg("verbose", "");
//!
//! let loader = ConfigLoader::with_host(Arc::new(host));
//! let value = loader.load("config.json", &schema)?;
//!
//! assert_eq!(value["env"], "staging");     // environment variable
//! assert_eq!(value["port"], 8080.0);       // fallback, nothing set
//! assert_eq!(value["verbose"], true);      // bare flag means true
//! # Ok::<(), trellis::ConfigError>(())
//! ```
//!
//! # Configuration documents
//!
//! Documents are JSON (or TOML, by file extension). A top-level
//! `$schema` key is recognized and stripped before validation, so
//! configuration files may point at the schema exported by
//! [`Structure::get_schema`] without tripping the closed-schema check:
//!
//! ```json
//! {
//!     "$schema": "./config.schema.json",
//!     "env": "production",
//!     "port": 443
//! }
//! ```
//!
//! # Error reporting
//!
//! Validation never stops at the first problem. Object and array
//! structures collect every failure and aggregate them under one parent
//! error; [`ValidationError::to_friendly_string`] renders the full
//! report, one dotted path per offending field.

#![warn(missing_docs)]

mod context;
mod error;
pub mod field;
mod host;
mod loader;
mod structure;
mod usage;

pub use context::{Context, DeferredWorkList};
pub use error::{ConfigError, Leaves, ValidationError};
pub use field::{Field, FieldBuilder, Source};
pub use host::{Host, MemoryHost, SystemHost};
pub use loader::ConfigLoader;
pub use structure::{Literal, Structure, SCHEMA_DRAFT};
pub use usage::{describe, usage, Description, FieldSpec};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_end_to_end_load_and_describe() {
        let schema = Structure::object(vec![
            ("env", field::string("development").variable("APP_ENV").build()),
            ("port", field::number(8080.0).flag("port").build()),
        ]);

        let host = MemoryHost::new().with_file(
            "config.json",
            r#"{ "$schema": "./config.schema.json", "env": "production" }"#,
        );
        let value = ConfigLoader::with_host(Arc::new(host))
            .load("config.json", &schema)
            .unwrap();

        assert_eq!(value, json!({ "env": "production", "port": 8080.0 }));

        let description = describe(&schema);
        assert_eq!(description.fields.len(), 2);
        assert_eq!(schema.get_schema()["$schema"], json!(SCHEMA_DRAFT));
    }

    #[test]
    fn test_friendly_report_lists_every_problem() {
        let schema = Structure::object(vec![
            ("name", Structure::string()),
            ("port", Structure::number()),
        ]);

        let error = schema
            .process(Some(&json!({ "name": 1, "port": "x", "extra": true })))
            .unwrap_err();
        let report = error.to_friendly_string();

        assert!(report.starts_with("Object does not match schema"));
        assert!(report.contains("extra — Additional field not allowed"));
        assert!(report.contains("name — Expected a string"));
        assert!(report.contains("port — Expected a number"));
    }
}
