//! Typed builder for the structured-query text sent to applications.
//!
//! Arguments are rendered with proper escaping so user-provided values
//! (player names, chain ids) can never change the shape of a request.

use crate::error::{PulseError, Result};
use serde_json::Value;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Query,
    Mutation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    UInt(u64),
    Bool(bool),
    Str(String),
    /// Bare identifier, e.g. an enum variant such as `COLOR_A`.
    Enum(String),
}

impl Arg {
    fn render(&self, out: &mut String) {
        match self {
            Arg::Int(v) => {
                let _ = write!(out, "{}", v);
            }
            Arg::UInt(v) => {
                let _ = write!(out, "{}", v);
            }
            Arg::Bool(v) => {
                let _ = write!(out, "{}", v);
            }
            // JSON string escaping is a subset of what the grammar accepts.
            Arg::Str(v) => out.push_str(&Value::String(v.clone()).to_string()),
            Arg::Enum(v) => out.push_str(v),
        }
    }
}

impl From<u64> for Arg {
    fn from(v: u64) -> Self {
        Arg::UInt(v)
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Arg::UInt(v.into())
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    args: Vec<(String, Arg)>,
    selection: Vec<Field>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            selection: Vec::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    /// Selects scalar sub-fields by name.
    pub fn select(mut self, names: &[&str]) -> Self {
        self.selection.extend(names.iter().map(|n| Field::new(*n)));
        self
    }

    /// Selects a nested object field.
    pub fn with(mut self, field: Field) -> Self {
        self.selection.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, out: &mut String) {
        out.push_str(&self.name);
        if !self.args.is_empty() {
            out.push('(');
            for (i, (name, value)) in self.args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push_str(": ");
                value.render(out);
            }
            out.push(')');
        }
        if !self.selection.is_empty() {
            out.push_str(" { ");
            for (i, field) in self.selection.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                field.render(out);
            }
            out.push_str(" }");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    kind: RequestKind,
    fields: Vec<Field>,
}

impl Request {
    pub fn query(field: Field) -> Self {
        Self {
            kind: RequestKind::Query,
            fields: vec![field],
        }
    }

    pub fn mutation(field: Field) -> Self {
        Self {
            kind: RequestKind::Mutation,
            fields: vec![field],
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn is_mutation(&self) -> bool {
        self.kind == RequestKind::Mutation
    }

    /// Name of the first top-level field, used for logging.
    pub fn operation_name(&self) -> &str {
        self.fields.first().map(Field::name).unwrap_or("")
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(match self.kind {
            RequestKind::Query => "query { ",
            RequestKind::Mutation => "mutation { ",
        });
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            field.render(&mut out);
        }
        out.push_str(" }");
        out
    }

    /// JSON envelope posted to the endpoint.
    pub fn body(&self) -> Value {
        serde_json::json!({ "query": self.render() })
    }
}

/// Extracts `data` from a response, turning an `errors` array into an error.
pub fn parse_response(text: &str) -> Result<Value> {
    let mut response: Value = serde_json::from_str(text)?;

    if let Some(errors) = response.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect();
            return Err(PulseError::ledger(messages.join("; ")));
        }
    }

    Ok(response
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}
