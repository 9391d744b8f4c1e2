//! The composable validator/coercer engine.
//!
//! A [`Structure`] pairs a JSON-Schema-shaped descriptor with an
//! executable validation function: [`Structure::process`] coerces a raw
//! [`serde_json::Value`] into a validated one or fails with a typed,
//! path-aware [`ValidationError`]. Primitive structures validate leaves;
//! object, array and union structures compose child structures into
//! trees. A structure is immutable after construction and may be shared
//! across parents and validated concurrently.
//!
//! # Example
//!
//! ```
//! use trellis::Structure;
//! use serde_json::json;
//!
//! let schema = Structure::object(vec![
//!     ("name", Structure::string()),
//!     ("port", Structure::number_with(8080.0)),
//! ]);
//!
//! let value = schema.process(Some(&json!({ "name": "api" }))).unwrap();
//! assert_eq!(value, json!({ "name": "api", "port": 8080.0 }));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use url::Url;

use crate::context::{Context, DeferredTask};
use crate::error::ValidationError;
use crate::field::Field;

/// The JSON Schema draft URI advertised by [`Structure::get_schema`].
pub const SCHEMA_DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";

/// A scalar value accepted by [`Structure::literal`].
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// A string literal.
    String(String),
    /// A number literal.
    Number(f64),
    /// A boolean literal.
    Boolean(bool),
}

impl Literal {
    /// Returns the type tag used in mismatch messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
        }
    }

    /// Returns the literal as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Boolean(b) => Value::Bool(*b),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String(expected), Value::String(actual)) => expected == actual,
            (Self::Number(expected), Value::Number(actual)) => actual.as_f64() == Some(*expected),
            (Self::Boolean(expected), Value::Bool(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self::Number(value as f64)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// A composable validator and coercer for one shape of value.
///
/// Children are reference-counted, so a structure instance may be shared
/// across multiple parents (ownership forms a DAG, never a cycle).
#[derive(Debug, Clone)]
pub enum Structure {
    /// Accepts strings; missing input resolves to the fallback.
    String {
        /// Value used when the input is absent.
        fallback: Option<String>,
    },
    /// Accepts finite numbers; missing input resolves to the fallback.
    Number {
        /// Value used when the input is absent.
        fallback: Option<f64>,
    },
    /// Accepts booleans; missing input resolves to the fallback.
    Boolean {
        /// Value used when the input is absent.
        fallback: Option<bool>,
    },
    /// Accepts absolute URLs given as strings, normalized to their
    /// canonical form.
    Url {
        /// Value used when the input is absent. Being a parsed [`Url`],
        /// the fallback is known valid at construction time.
        fallback: Option<Url>,
    },
    /// Accepts exactly one scalar value. Always required.
    Literal {
        /// The expected value.
        value: Literal,
    },
    /// Accepts exactly `null`.
    Null,
    /// Accepts every value unchanged.
    Any,
    /// Accepts plain objects whose keys are all declared; validates each
    /// declared field and rejects every undeclared one.
    Object {
        /// Declared fields, in declaration order.
        fields: Vec<(String, Arc<Structure>)>,
    },
    /// Accepts arrays whose items all satisfy the item structure.
    Array {
        /// Structure every item must satisfy.
        items: Arc<Structure>,
    },
    /// Accepts the first matching candidate.
    Union {
        /// Candidate structures, tried in declaration order.
        variants: Vec<Arc<Structure>>,
    },
    /// A configuration-resolved primitive built through [`crate::field`].
    Field(Field),
    /// A sub-tree loaded from a separate source during
    /// [`ConfigLoader::load`](crate::ConfigLoader::load).
    External {
        /// Name of the external source to read.
        source: String,
        /// Structure the external document must satisfy.
        target: Arc<Structure>,
    },
}

impl Structure {
    /// A required string.
    #[must_use]
    pub fn string() -> Self {
        Self::String { fallback: None }
    }

    /// A string with a fallback for absent input.
    #[must_use]
    pub fn string_with(fallback: impl Into<String>) -> Self {
        Self::String {
            fallback: Some(fallback.into()),
        }
    }

    /// A required number.
    #[must_use]
    pub fn number() -> Self {
        Self::Number { fallback: None }
    }

    /// A number with a fallback for absent input.
    #[must_use]
    pub fn number_with(fallback: f64) -> Self {
        Self::Number {
            fallback: Some(fallback),
        }
    }

    /// A required boolean.
    #[must_use]
    pub fn boolean() -> Self {
        Self::Boolean { fallback: None }
    }

    /// A boolean with a fallback for absent input.
    #[must_use]
    pub fn boolean_with(fallback: bool) -> Self {
        Self::Boolean {
            fallback: Some(fallback),
        }
    }

    /// A required URL.
    #[must_use]
    pub fn url() -> Self {
        Self::Url { fallback: None }
    }

    /// A URL with a fallback for absent input. Taking a parsed [`Url`]
    /// makes an invalid fallback unrepresentable.
    #[must_use]
    pub fn url_with(fallback: Url) -> Self {
        Self::Url {
            fallback: Some(fallback),
        }
    }

    /// Exactly one scalar value; no fallback, always required.
    #[must_use]
    pub fn literal(value: impl Into<Literal>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// Exactly `null`.
    #[must_use]
    pub fn null() -> Self {
        Self::Null
    }

    /// Any value, unchanged.
    #[must_use]
    pub fn any() -> Self {
        Self::Any
    }

    /// An object with the given declared fields.
    ///
    /// Undeclared input keys are rejected ("Additional field not
    /// allowed"), keeping the schema closed.
    #[must_use]
    pub fn object(fields: Vec<(&str, Structure)>) -> Self {
        Self::Object {
            fields: fields
                .into_iter()
                .map(|(name, structure)| (name.to_string(), Arc::new(structure)))
                .collect(),
        }
    }

    /// An array whose items all satisfy `items`.
    #[must_use]
    pub fn array(items: Structure) -> Self {
        Self::Array {
            items: Arc::new(items),
        }
    }

    /// The first of `variants` to accept the input.
    #[must_use]
    pub fn union(variants: Vec<Structure>) -> Self {
        Self::Union {
            variants: variants.into_iter().map(Arc::new).collect(),
        }
    }

    /// A sub-tree resolved from a separate source.
    ///
    /// Only usable under a [`ConfigLoader`](crate::ConfigLoader): the
    /// loader returns a placeholder immediately and merges the real
    /// contents in once the deferred work list drains. If the source
    /// does not exist, the inline value found at this position in the
    /// main document is validated instead.
    #[must_use]
    pub fn external(source: impl Into<String>, target: Structure) -> Self {
        Self::External {
            source: source.into(),
            target: Arc::new(target),
        }
    }

    /// Returns this node's JSON-Schema-shaped descriptor.
    #[must_use]
    pub fn schema(&self) -> Value {
        match self {
            Self::String { fallback } => {
                with_default(json!({ "type": "string" }), fallback.as_ref().map(|f| json!(f)))
            }
            Self::Number { fallback } => {
                with_default(json!({ "type": "number" }), fallback.map(|f| json!(f)))
            }
            Self::Boolean { fallback } => {
                with_default(json!({ "type": "boolean" }), fallback.map(|f| json!(f)))
            }
            Self::Url { fallback } => with_default(
                json!({ "type": "string", "format": "uri" }),
                fallback.as_ref().map(|f| json!(f.as_str())),
            ),
            Self::Literal { value } => json!({ "const": value.to_value() }),
            Self::Null => json!({ "type": "null" }),
            Self::Any => json!({}),
            Self::Object { fields } => {
                let properties: Map<String, Value> = fields
                    .iter()
                    .map(|(name, structure)| (name.clone(), structure.schema()))
                    .collect();
                json!({
                    "type": "object",
                    "properties": properties,
                    "default": {},
                    "additionalProperties": false,
                })
            }
            Self::Array { items } => json!({
                "type": "array",
                "items": items.schema(),
                "default": [],
            }),
            Self::Union { variants } => {
                let one_of: Vec<Value> = variants.iter().map(|v| v.schema()).collect();
                json!({ "oneOf": one_of })
            }
            Self::Field(field) => field.schema(),
            Self::External { target, .. } => target.schema(),
        }
    }

    /// Returns the schema with the `$schema` draft URI merged in, per
    /// JSON Schema convention.
    #[must_use]
    pub fn get_schema(&self) -> Value {
        let mut schema = self.schema();
        if let Value::Object(map) = &mut schema {
            map.insert("$schema".to_string(), Value::String(SCHEMA_DRAFT.to_string()));
        }
        schema
    }

    /// Validates and coerces `input` with a fresh default context.
    ///
    /// `None` models an absent value; `Some(&Value::Null)` is a present
    /// `null`. Every failure surfaces as a [`ValidationError`] carrying
    /// the path at which it occurred.
    pub fn process(&self, input: Option<&Value>) -> Result<Value, ValidationError> {
        self.process_in(input, &Context::new())
    }

    /// Validates and coerces `input` under an explicit context.
    pub fn process_in(
        &self,
        input: Option<&Value>,
        context: &Context,
    ) -> Result<Value, ValidationError> {
        match self {
            Self::String { fallback } => process_string(input, fallback.as_deref(), context),
            Self::Number { fallback } => process_number(input, *fallback, context),
            Self::Boolean { fallback } => process_boolean(input, *fallback, context),
            Self::Url { fallback } => process_url(input, fallback.as_ref(), context),
            Self::Literal { value } => process_literal(input, value, context),
            Self::Null => match input {
                Some(Value::Null) => Ok(Value::Null),
                _ => Err(ValidationError::new("Expected null", context.path().to_vec())),
            },
            Self::Any => Ok(input.cloned().unwrap_or(Value::Null)),
            Self::Object { fields } => process_object(input, fields, context),
            Self::Array { items } => process_array(input, items, context),
            Self::Union { variants } => process_union(input, variants, context),
            Self::Field(field) => field.process(input, context),
            Self::External { source, target } => process_external(input, source, target, context),
        }
    }
}

fn missing_value(context: &Context) -> ValidationError {
    ValidationError::new("Missing value", context.path().to_vec())
}

fn process_string(
    input: Option<&Value>,
    fallback: Option<&str>,
    context: &Context,
) -> Result<Value, ValidationError> {
    match input {
        None => fallback
            .map(|f| Value::String(f.to_string()))
            .ok_or_else(|| missing_value(context)),
        Some(Value::String(s)) => Ok(Value::String(s.clone())),
        Some(_) => Err(ValidationError::new(
            "Expected a string",
            context.path().to_vec(),
        )),
    }
}

fn process_number(
    input: Option<&Value>,
    fallback: Option<f64>,
    context: &Context,
) -> Result<Value, ValidationError> {
    match input {
        None => match fallback {
            Some(f) => finite_number(f, context),
            None => Err(missing_value(context)),
        },
        Some(Value::Number(n)) => Ok(Value::Number(n.clone())),
        Some(_) => Err(ValidationError::new(
            "Expected a number",
            context.path().to_vec(),
        )),
    }
}

/// Rejects NaN and infinities, which have no JSON representation.
pub(crate) fn finite_number(value: f64, context: &Context) -> Result<Value, ValidationError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ValidationError::new("Not a number", context.path().to_vec()))
}

fn process_boolean(
    input: Option<&Value>,
    fallback: Option<bool>,
    context: &Context,
) -> Result<Value, ValidationError> {
    match input {
        // Missing booleans follow the string/number policy: fallback if
        // present, otherwise "Missing value".
        None => fallback
            .map(Value::Bool)
            .ok_or_else(|| missing_value(context)),
        Some(Value::Bool(b)) => Ok(Value::Bool(*b)),
        Some(_) => Err(ValidationError::new(
            "Not a boolean",
            context.path().to_vec(),
        )),
    }
}

fn process_url(
    input: Option<&Value>,
    fallback: Option<&Url>,
    context: &Context,
) -> Result<Value, ValidationError> {
    match input {
        None => fallback
            .map(|f| Value::String(f.to_string()))
            .ok_or_else(|| missing_value(context)),
        Some(Value::String(s)) => Url::parse(s)
            .map(|url| Value::String(url.to_string()))
            .map_err(|e| ValidationError::chain(&e, context.path().to_vec())),
        Some(_) => Err(ValidationError::new(
            "Not a string or URL",
            context.path().to_vec(),
        )),
    }
}

fn process_literal(
    input: Option<&Value>,
    expected: &Literal,
    context: &Context,
) -> Result<Value, ValidationError> {
    match input {
        None => Err(missing_value(context)),
        Some(value) if expected.matches(value) => Ok(value.clone()),
        Some(_) => Err(ValidationError::new(
            format!("Expected {} literal: {}", expected.type_name(), expected),
            context.path().to_vec(),
        )),
    }
}

fn process_object(
    input: Option<&Value>,
    fields: &[(String, Arc<Structure>)],
    context: &Context,
) -> Result<Value, ValidationError> {
    // An absent object resolves to its schema default `{}`, so nested
    // sections fall back field by field.
    let empty = Value::Object(Map::new());
    let value = input.unwrap_or(&empty);

    let Some(map) = value.as_object() else {
        return Err(ValidationError::new(
            "Expected an object",
            context.path().to_vec(),
        ));
    };

    let mut out = Map::new();
    let mut errors = Vec::new();

    // Declared fields first, in declaration order, collecting every
    // failure instead of stopping at the first.
    for (name, structure) in fields {
        let child = context.child(name.clone());
        match structure.process_in(map.get(name), &child) {
            Ok(value) => {
                out.insert(name.clone(), value);
            }
            Err(error) => errors.push(error),
        }
    }

    let declared: HashSet<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
    for key in map.keys() {
        if !declared.contains(key.as_str()) {
            errors.push(ValidationError::new(
                "Additional field not allowed",
                context.path_to(key),
            ));
        }
    }

    if errors.is_empty() {
        Ok(Value::Object(out))
    } else {
        Err(ValidationError::with_children(
            "Object does not match schema",
            context.path().to_vec(),
            errors,
        ))
    }
}

fn process_array(
    input: Option<&Value>,
    items: &Arc<Structure>,
    context: &Context,
) -> Result<Value, ValidationError> {
    let empty = Value::Array(Vec::new());
    let value = input.unwrap_or(&empty);

    let Some(entries) = value.as_array() else {
        return Err(ValidationError::new(
            "Expected an array",
            context.path().to_vec(),
        ));
    };

    let mut out = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let child = context.child(index.to_string());
        match items.process_in(Some(entry), &child) {
            Ok(value) => out.push(value),
            Err(error) => errors.push(error),
        }
    }

    if errors.is_empty() {
        Ok(Value::Array(out))
    } else {
        Err(ValidationError::with_children(
            "Array item does not match schema",
            context.path().to_vec(),
            errors,
        ))
    }
}

fn process_union(
    input: Option<&Value>,
    variants: &[Arc<Structure>],
    context: &Context,
) -> Result<Value, ValidationError> {
    // Each candidate is tried with a fresh default context; sub-errors
    // are discarded in favor of one message at the outer path.
    for variant in variants {
        if let Ok(value) = variant.process_in(input, &Context::new()) {
            return Ok(value);
        }
    }
    Err(ValidationError::new(
        "Value does not match any type in the union",
        context.path().to_vec(),
    ))
}

fn process_external(
    input: Option<&Value>,
    source: &str,
    target: &Arc<Structure>,
    context: &Context,
) -> Result<Value, ValidationError> {
    let Some(deferred) = context.deferred() else {
        return Err(ValidationError::new(
            "external() requires loading through a ConfigLoader",
            context.path().to_vec(),
        ));
    };

    deferred.push(DeferredTask {
        path: context.path().to_vec(),
        source: source.to_string(),
        structure: Arc::clone(target),
        inline: input.cloned(),
    });

    // The placeholder occupies the result slot until the drain loop
    // merges the resolved contents into it.
    let placeholder = match target.schema().get("type").and_then(Value::as_str) {
        Some("array") => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    };
    Ok(placeholder)
}

fn with_default(mut schema: Value, default: Option<Value>) -> Value {
    if let (Value::Object(map), Some(default)) = (&mut schema, default) {
        map.insert("default".to_string(), default);
    }
    schema
}
