//! Configuration-resolved primitive fields.
//!
//! A field is a primitive [`Structure`] whose effective value is chosen
//! by a layered precedence policy before type coercion:
//!
//! 1. CLI flag (when a `flag` name is declared and present)
//! 2. environment variable (when a `variable` name is declared and present)
//! 3. the value already at this position in the loaded document
//! 4. the fallback
//!
//! Every field requires a typed fallback at construction, so a schema
//! built from fields always resolves to a complete value even when no
//! document, flags, or environment are present.
//!
//! # Example
//!
//! ```
//! use trellis::{field, Structure};
//!
//! let schema = Structure::object(vec![
//!     ("env", field::string("development").variable("APP_ENV").build()),
//!     ("port", field::number(8080.0).flag("port").variable("APP_PORT").build()),
//!     ("verbose", field::boolean(false).flag("verbose").build()),
//! ]);
//!
//! // Without a loader there are no flag/variable sources; fallbacks apply.
//! let value = schema.process(None).unwrap();
//! assert_eq!(value["env"], "development");
//! ```

use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::context::Context;
use crate::error::ValidationError;
use crate::structure::{finite_number, Structure};

/// Where a field's value was resolved from, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// A CLI flag.
    Argument,
    /// An environment variable.
    Variable,
    /// The value already present in the document being processed.
    Current,
    /// The declared fallback.
    Fallback,
}

/// The typed kind of a field, with its required fallback.
#[derive(Debug, Clone)]
pub(crate) enum FieldKind {
    String { fallback: String },
    Number { fallback: f64 },
    Boolean { fallback: bool },
    Url { fallback: Url },
}

/// A configuration-resolved primitive inside a [`Structure`] tree.
#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldKind,
    flag: Option<String>,
    variable: Option<String>,
}

/// Builds a [`Field`] and wraps it into a [`Structure`].
///
/// Created by [`string`], [`number`], [`boolean`] or [`url`]; the
/// fallback is a required constructor argument, so a field without one
/// cannot be expressed.
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    field: Field,
}

/// A string field with the given fallback.
#[must_use]
pub fn string(fallback: impl Into<String>) -> FieldBuilder {
    FieldBuilder::new(FieldKind::String {
        fallback: fallback.into(),
    })
}

/// A number field with the given fallback.
#[must_use]
pub fn number(fallback: f64) -> FieldBuilder {
    FieldBuilder::new(FieldKind::Number { fallback })
}

/// A boolean field with the given fallback.
#[must_use]
pub fn boolean(fallback: bool) -> FieldBuilder {
    FieldBuilder::new(FieldKind::Boolean { fallback })
}

/// A URL field with the given fallback. Taking a parsed [`Url`] keeps
/// an invalid fallback unrepresentable.
#[must_use]
pub fn url(fallback: Url) -> FieldBuilder {
    FieldBuilder::new(FieldKind::Url { fallback })
}

impl FieldBuilder {
    fn new(kind: FieldKind) -> Self {
        Self {
            field: Field {
                kind,
                flag: None,
                variable: None,
            },
        }
    }

    /// Declares the CLI flag this field resolves from.
    #[must_use]
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.field.flag = Some(name.into());
        self
    }

    /// Declares the environment variable this field resolves from.
    #[must_use]
    pub fn variable(mut self, name: impl Into<String>) -> Self {
        self.field.variable = Some(name.into());
        self
    }

    /// Finishes the field as a [`Structure`].
    #[must_use]
    pub fn build(self) -> Structure {
        Structure::Field(self.field)
    }
}

impl From<FieldBuilder> for Structure {
    fn from(builder: FieldBuilder) -> Self {
        builder.build()
    }
}

impl Field {
    /// The type tag used in field descriptors and usage tables.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            FieldKind::String { .. } => "string",
            FieldKind::Number { .. } => "number",
            FieldKind::Boolean { .. } => "boolean",
            FieldKind::Url { .. } => "url",
        }
    }

    /// The declared CLI flag, if any.
    #[must_use]
    pub fn flag(&self) -> Option<&str> {
        self.flag.as_deref()
    }

    /// The declared environment variable, if any.
    #[must_use]
    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    /// The fallback as a JSON value.
    #[must_use]
    pub fn fallback_value(&self) -> Value {
        match &self.kind {
            FieldKind::String { fallback } => Value::String(fallback.clone()),
            FieldKind::Number { fallback } => {
                serde_json::Number::from_f64(*fallback).map_or(Value::Null, Value::Number)
            }
            FieldKind::Boolean { fallback } => Value::Bool(*fallback),
            FieldKind::Url { fallback } => Value::String(fallback.to_string()),
        }
    }

    /// The fallback rendered as plain text for usage tables.
    #[must_use]
    pub fn fallback_text(&self) -> String {
        match &self.kind {
            FieldKind::String { fallback } => fallback.clone(),
            FieldKind::Number { fallback } => fallback.to_string(),
            FieldKind::Boolean { fallback } => fallback.to_string(),
            FieldKind::Url { fallback } => fallback.to_string(),
        }
    }

    pub(crate) fn schema(&self) -> Value {
        match &self.kind {
            FieldKind::String { fallback } => json!({ "type": "string", "default": fallback }),
            FieldKind::Number { fallback } => json!({ "type": "number", "default": fallback }),
            FieldKind::Boolean { fallback } => json!({ "type": "boolean", "default": fallback }),
            FieldKind::Url { fallback } => json!({
                "type": "string",
                "format": "uri",
                "default": fallback.as_str(),
            }),
        }
    }

    pub(crate) fn process(
        &self,
        input: Option<&Value>,
        context: &Context,
    ) -> Result<Value, ValidationError> {
        let (source, value) = self.resolve(input, context);
        self.coerce(source, value, context)
    }

    /// Picks the highest-precedence available source. Flag and variable
    /// lookups need a host; a plain `process` call has none, so only
    /// Current and Fallback apply there.
    fn resolve(&self, input: Option<&Value>, context: &Context) -> (Source, Value) {
        if let (Some(flag), Some(host)) = (&self.flag, context.host()) {
            if let Some(value) = host.arg(flag) {
                return (Source::Argument, Value::String(value));
            }
        }
        if let (Some(variable), Some(host)) = (&self.variable, context.host()) {
            if let Some(value) = host.env_var(variable) {
                return (Source::Variable, Value::String(value));
            }
        }
        if let Some(current) = input {
            return (Source::Current, current.clone());
        }
        (Source::Fallback, self.fallback_value())
    }

    /// Coerces the resolved value to the field's kind. Flag and
    /// environment values arrive as strings and are parsed; values from
    /// the document or fallback must already have the right type.
    fn coerce(
        &self,
        source: Source,
        value: Value,
        context: &Context,
    ) -> Result<Value, ValidationError> {
        match &self.kind {
            FieldKind::String { .. } => match value {
                Value::String(s) => Ok(Value::String(s)),
                _ => Err(ValidationError::new(
                    "Expected a string",
                    context.path().to_vec(),
                )),
            },
            FieldKind::Number { .. } => match value {
                Value::Number(n) => Ok(Value::Number(n)),
                Value::String(s) => {
                    let parsed: f64 = s.trim().parse().map_err(|_| {
                        ValidationError::new("Expected a number", context.path().to_vec())
                    })?;
                    finite_number(parsed, context)
                }
                _ => Err(ValidationError::new(
                    "Expected a number",
                    context.path().to_vec(),
                )),
            },
            FieldKind::Boolean { .. } => match value {
                Value::Bool(b) => Ok(Value::Bool(b)),
                Value::String(s) => match s.as_str() {
                    // A bare `--flag` resolves to the empty string and
                    // means presence, hence true.
                    "" if source == Source::Argument => Ok(Value::Bool(true)),
                    "1" | "true" | "yes" => Ok(Value::Bool(true)),
                    "0" | "false" | "no" => Ok(Value::Bool(false)),
                    _ => Err(ValidationError::new(
                        "Not a boolean",
                        context.path().to_vec(),
                    )),
                },
                _ => Err(ValidationError::new(
                    "Not a boolean",
                    context.path().to_vec(),
                )),
            },
            FieldKind::Url { .. } => match value {
                Value::String(s) => Url::parse(&s)
                    .map(|url| Value::String(url.to_string()))
                    .map_err(|e| ValidationError::chain(&e, context.path().to_vec())),
                _ => Err(ValidationError::new(
                    "Not a string or URL",
                    context.path().to_vec(),
                )),
            },
        }
    }
}
