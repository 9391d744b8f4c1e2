//! Self-description: field descriptors, usage text, and JSON Schema.
//!
//! A [`Structure`] built from [`field`](crate::field) builders can
//! describe itself: every configuration field contributes a
//! [`FieldSpec`] with its dotted name, type, flag, variable, and
//! fallback. [`usage`] renders those descriptors as a Markdown table
//! for `--help`-style output; [`Structure::get_schema`] exports the
//! same tree as JSON Schema.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::structure::Structure;

/// Describes one configuration field for usage text and tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Dotted, bracketed path name, e.g. `"database.url"` or `"names[]"`.
    pub name: String,
    /// Type tag: `"string"`, `"number"`, `"boolean"`, or `"url"`.
    pub kind: String,
    /// Declared CLI flag, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    /// Declared environment variable, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    /// Fallback rendered as plain text.
    pub fallback: String,
}

/// The self-description of a structure: its fallback tree and the flat
/// list of configuration fields it contains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    /// The value the structure resolves to with no input at all.
    pub fallback: Value,
    /// Every configuration field, in declaration order.
    pub fields: Vec<FieldSpec>,
}

impl Description {
    fn empty() -> Self {
        Self {
            fallback: Value::Null,
            fields: Vec::new(),
        }
    }
}

/// Describes a structure tree.
///
/// Plain structures that carry no configuration fields yield an empty
/// description and are silently skipped by object and array parents, so
/// configuration-aware and plain structures mix freely.
#[must_use]
pub fn describe(structure: &Structure) -> Description {
    describe_node(structure, "")
}

fn describe_node(structure: &Structure, name: &str) -> Description {
    match structure {
        Structure::Field(field) => Description {
            fallback: field.fallback_value(),
            fields: vec![FieldSpec {
                name: name.to_string(),
                kind: field.kind_name().to_string(),
                flag: field.flag().map(ToString::to_string),
                variable: field.variable().map(ToString::to_string),
                fallback: field.fallback_text(),
            }],
        },
        Structure::Object { fields } => {
            let mut fallback = Map::new();
            let mut specs = Vec::new();
            for (key, child) in fields {
                let child_name = if name.is_empty() {
                    key.clone()
                } else {
                    format!("{name}.{key}")
                };
                let description = describe_node(child, &child_name);
                if description.fields.is_empty() {
                    continue;
                }
                fallback.insert(key.clone(), description.fallback);
                specs.extend(description.fields);
            }
            Description {
                fallback: Value::Object(fallback),
                fields: specs,
            }
        }
        Structure::Array { items } => {
            let description = describe_node(items, &format!("{name}[]"));
            Description {
                fallback: Value::Array(Vec::new()),
                fields: description.fields,
            }
        }
        Structure::External { target, .. } => describe_node(target, name),
        _ => Description::empty(),
    }
}

/// Renders human-readable usage text.
///
/// Produces a Markdown pipe table of every field (sorted by name, absent
/// cells rendered with `missing`), followed by the stringified fallback
/// defaults and, when `current` is supplied, the live resolved value as
/// pretty JSON.
#[must_use]
pub fn usage(structure: &Structure, current: Option<&Value>, missing: &str) -> String {
    let description = describe(structure);
    let mut fields = description.fields;
    fields.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out = String::new();
    out.push_str("| name | type | flag | variable | fallback |\n");
    out.push_str("| --- | --- | --- | --- | --- |\n");
    for field in &fields {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            field.name,
            field.kind,
            field.flag.as_deref().unwrap_or(missing),
            field.variable.as_deref().unwrap_or(missing),
            field.fallback,
        );
    }

    out.push_str("\nDefault:\n");
    out.push_str(&description.fallback.to_string());
    out.push('\n');

    if let Some(value) = current {
        out.push_str("\nCurrent:\n");
        out.push_str(&serde_json::to_string_pretty(value).unwrap_or_default());
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;
    use serde_json::json;
    use url::Url;

    fn sample() -> Structure {
        Structure::object(vec![
            (
                "database",
                Structure::object(vec![(
                    "url",
                    field::url(Url::parse("https://db.example.com").unwrap())
                        .variable("DATABASE_URL")
                        .build(),
                )]),
            ),
            ("names", Structure::array(field::string("anon").build())),
            ("port", field::number(80.0).flag("port").build()),
            // Plain structure, not configuration-aware: skipped.
            ("meta", Structure::any()),
        ])
    }

    #[test]
    fn test_describe_prefixes_names() {
        let description = describe(&sample());
        let names: Vec<_> = description.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["database.url", "names[]", "port"]);
    }

    #[test]
    fn test_describe_field_details() {
        let description = describe(&sample());
        let url = &description.fields[0];
        assert_eq!(url.kind, "url");
        assert_eq!(url.variable.as_deref(), Some("DATABASE_URL"));
        assert_eq!(url.fallback, "https://db.example.com/");
        assert!(url.flag.is_none());
    }

    #[test]
    fn test_describe_fallback_tree() {
        let description = describe(&sample());
        assert_eq!(
            description.fallback,
            json!({
                "database": { "url": "https://db.example.com/" },
                "names": [],
                "port": 80.0,
            })
        );
    }

    #[test]
    fn test_describe_plain_structure_is_empty() {
        let description = describe(&Structure::string());
        assert_eq!(description.fallback, Value::Null);
        assert!(description.fields.is_empty());
    }

    #[test]
    fn test_usage_table_sorted_with_placeholders() {
        let text = usage(&sample(), None, "—");
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "| name | type | flag | variable | fallback |");
        assert_eq!(
            lines[2],
            "| database.url | url | — | DATABASE_URL | https://db.example.com/ |"
        );
        assert_eq!(lines[3], "| names[] | string | — | — | anon |");
        assert_eq!(lines[4], "| port | number | port | — | 80 |");
        assert!(text.contains("\nDefault:\n"));
        assert!(!text.contains("Current:"));
    }

    #[test]
    fn test_usage_includes_current_value() {
        let current = json!({ "port": 9000 });
        let text = usage(&sample(), Some(&current), "-");
        assert!(text.contains("Current:"));
        assert!(text.contains("\"port\": 9000"));
    }
}
