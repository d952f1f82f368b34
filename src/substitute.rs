//! Placeholder substitution over configuration trees.
//!
//! Strings may contain `${name}` placeholders, replaced from a [`Params`]
//! dictionary, and `${command:name}` placeholders. The only command understood
//! is `inherit`: inside a sequence that is itself the value of a mapping key,
//! `${inherit:key}` splices the sibling sequence stored under `key` into the
//! enclosing sequence at the placeholder's position.
//!
//! The walk never mutates its input. Each call builds a new tree and threads
//! the chain of enclosing containers explicitly so `inherit` lookups read the
//! untouched original.
//!
//! ```
//! use crossbuild::substitute::{Params, substitute};
//! use serde_json::json;
//!
//! let params = Params::new().with("root", "/opt/gcc");
//! let flags = json!({
//!     "CC": ["-Wall", "-I${root}/include"],
//!     "CXX": ["${inherit:CC}", "-fno-rtti"],
//! });
//! let out = substitute(&flags, &params);
//! assert_eq!(
//!     out,
//!     json!({
//!         "CC": ["-Wall", "-I/opt/gcc/include"],
//!         "CXX": ["-Wall", "-I${root}/include", "-fno-rtti"],
//!     })
//! );
//! ```

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::ffi::OsString;

/// Command name that splices a sibling sequence.
pub const INHERIT_COMMAND: &str = "inherit";

/// Named replacement values available to `${name}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Capture every process environment variable whose name and value are
    /// valid UTF-8.
    #[must_use]
    pub fn from_process_env() -> Self {
        std::env::vars_os()
            .filter_map(|(key, value)| Some((into_utf8(key)?, into_utf8(value)?)))
            .collect()
    }

    /// Return a copy of the dictionary with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key` to `value`, replacing any previous entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

fn into_utf8(value: OsString) -> Option<String> {
    value.into_string().ok()
}

/// Substitute placeholders throughout `value`, returning a new tree.
///
/// Sequences are rebuilt element by element: an element whose substitution
/// yields the empty string is dropped, and an element resolved through
/// `${inherit:key}` is replaced by every element of the inherited sequence.
/// Mapping values are replaced only when the substitution yields a non-empty
/// string; otherwise the original value is kept. Scalars are copied as-is.
#[must_use]
pub fn substitute(value: &Value, params: &Params) -> Value {
    substitute_value(value, params, None)
}

/// Substitute `${name}` placeholders within a single string.
///
/// Unknown names and `${command:name}` placeholders expand to nothing.
#[must_use]
pub fn substitute_str(input: &str, params: &Params) -> String {
    expand_text(input, |placeholder| match placeholder {
        Placeholder::Named(name) => params.get(name).unwrap_or_default().to_owned(),
        Placeholder::Command { .. } => String::new(),
    })
}

/// Chain of containers enclosing the value under substitution, innermost
/// first.
#[derive(Debug, Clone, Copy)]
struct Ancestors<'a> {
    container: &'a Value,
    outer: Option<&'a Ancestors<'a>>,
}

impl<'a> Ancestors<'a> {
    /// Find the sequence an `${inherit:name}` placeholder refers to.
    ///
    /// Requires the innermost container to be a sequence and the one above it
    /// to be a mapping holding a sequence under `name`.
    fn inherited_sequence(&self, name: &str) -> Option<&'a Vec<Value>> {
        let grandparent = self.outer?.container;
        match (self.container, grandparent) {
            (Value::Array(_), Value::Object(map)) => map.get(name).and_then(Value::as_array),
            _ => None,
        }
    }
}

/// Outcome of substituting a string in place.
#[derive(Debug, Clone, PartialEq)]
enum Substituted {
    Text(String),
    Splice(Vec<Value>),
}

fn substitute_value(value: &Value, params: &Params, ancestors: Option<&Ancestors<'_>>) -> Value {
    match value {
        Value::Array(items) => Value::Array(substitute_sequence(value, items, params, ancestors)),
        Value::Object(map) => Value::Object(substitute_mapping(value, map, params, ancestors)),
        Value::String(text) => Value::String(substitute_str(text, params)),
        scalar => scalar.clone(),
    }
}

fn substitute_sequence(
    container: &Value,
    items: &[Value],
    params: &Params,
    ancestors: Option<&Ancestors<'_>>,
) -> Vec<Value> {
    let frame = Ancestors {
        container,
        outer: ancestors,
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(text) = item else {
            out.push(substitute_value(item, params, Some(&frame)));
            continue;
        };
        match substitute_string(text, params, &frame) {
            Substituted::Splice(elements) => out.extend(elements),
            Substituted::Text(expanded) if expanded.is_empty() => {}
            Substituted::Text(expanded) => out.push(Value::String(expanded)),
        }
    }
    out
}

fn substitute_mapping(
    container: &Value,
    map: &Map<String, Value>,
    params: &Params,
    ancestors: Option<&Ancestors<'_>>,
) -> Map<String, Value> {
    let frame = Ancestors {
        container,
        outer: ancestors,
    };
    map.iter()
        .map(|(key, item)| {
            let next = match item {
                Value::String(text) => match substitute_string(text, params, &frame) {
                    Substituted::Splice(elements) => Value::Array(elements),
                    Substituted::Text(expanded) if expanded.is_empty() => item.clone(),
                    Substituted::Text(expanded) => Value::String(expanded),
                },
                nested => substitute_value(nested, params, Some(&frame)),
            };
            (key.clone(), next)
        })
        .collect()
}

fn substitute_string(text: &str, params: &Params, frame: &Ancestors<'_>) -> Substituted {
    let mut splice: Option<Vec<Value>> = None;
    let expanded = expand_text(text, |placeholder| match placeholder {
        Placeholder::Named(name) => params.get(name).unwrap_or_default().to_owned(),
        Placeholder::Command { command, name } => {
            if command == INHERIT_COMMAND {
                if let Some(items) = frame.inherited_sequence(name) {
                    splice = Some(
                        items
                            .iter()
                            .filter_map(|item| spliced_element(item, params))
                            .collect(),
                    );
                }
            }
            String::new()
        }
    });
    splice.map_or(Substituted::Text(expanded), Substituted::Splice)
}

/// Substitute one element copied from an inherited sequence.
///
/// Strings that expand to nothing are dropped, as they would be in the
/// sequence they came from. Nested `${inherit:..}` placeholders have no
/// sequence context here and so expand to nothing.
fn spliced_element(item: &Value, params: &Params) -> Option<Value> {
    match item {
        Value::String(text) => {
            let expanded = substitute_str(text, params);
            (!expanded.is_empty()).then_some(Value::String(expanded))
        }
        other => Some(substitute_value(other, params, None)),
    }
}

/// A parsed `${...}` occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder<'a> {
    Named(&'a str),
    Command { command: &'a str, name: &'a str },
}

impl<'a> Placeholder<'a> {
    fn parse(body: &'a str) -> Self {
        match body.split_once(':') {
            Some((command, name)) => Self::Command { command, name },
            None => Self::Named(body),
        }
    }
}

const fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | ':')
}

/// Replace every well-formed placeholder in `input` with `resolve`'s output.
///
/// Text that merely resembles a placeholder (`${}`, `${a b}`, an unterminated
/// `${x`) is copied through unchanged.
fn expand_text<F>(input: &str, mut resolve: F) -> String
where
    F: FnMut(Placeholder<'_>) -> String,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        let Some(body) = tail.strip_prefix("${") else {
            rest = tail;
            break;
        };
        let end = body.find(|ch: char| !is_name_char(ch)).unwrap_or(body.len());
        let (name, after) = body.split_at(end);
        match after.strip_prefix('}') {
            Some(remaining) if !name.is_empty() => {
                out.push_str(&resolve(Placeholder::parse(name)));
                rest = remaining;
            }
            _ => {
                out.push_str("${");
                rest = body;
            }
        }
    }
    out.push_str(rest);
    out
}
