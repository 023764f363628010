//! Requirement queries — how a turn asks for a model.
//!
//! Grammar (informal):
//! ```text
//! query      = NAME                      ; exact registered name
//!            | provider ":" conditions
//!            | TEXT                      ; anything else is a name filter
//! provider   = IDENT | "auto" | ""       ; auto/empty mean "any provider"
//! conditions = condition ("," condition)*
//! condition  = key [op] value
//! op         = ">" | "<" | ">=" | "<=" | "="     ; missing op means "="
//! ```
//!
//! The structured form is a map `key -> "<op><value>"`, e.g.
//! `{"contextLength": ">=100000", "provider": "openai"}`.
//!
//! Comparison semantics are pinned for compatibility with existing
//! requirement strings: `=` is loose (type-coercing) equality and the
//! inequality operators are relational comparisons with numeric coercion,
//! both following ECMAScript's abstract comparison rules. See
//! [`loose_equals`] and [`relational`].

use regex_lite::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use switchyard_core::error::{Error, Result};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl CompareOp {
    /// Parse an operator token. An empty token means equality.
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "" | "=" => Ok(CompareOp::Eq),
            ">" => Ok(CompareOp::Gt),
            "<" => Ok(CompareOp::Lt),
            ">=" => Ok(CompareOp::Gte),
            "<=" => Ok(CompareOp::Lte),
            other => Err(Error::validation(format!(
                "unknown comparison operator '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
        }
    }
}

/// One `key <op> value` constraint. The value stays a raw string.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub op: CompareOp,
    pub value: String,
}

impl Condition {
    pub fn new(key: impl Into<String>, op: CompareOp, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    /// Evaluate against a field value (`None` when the field is absent).
    pub fn matches(&self, field: Option<&Value>) -> bool {
        let Some(field) = field else {
            return false;
        };
        match self.op {
            CompareOp::Eq => loose_equals(field, &self.value),
            CompareOp::Gt => relational(field, &self.value) == Some(Ordering::Greater),
            CompareOp::Lt => relational(field, &self.value) == Some(Ordering::Less),
            CompareOp::Gte => matches!(
                relational(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CompareOp::Lte => matches!(
                relational(field, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.key, self.op.as_str(), self.value)
    }
}

/// A query as the caller wrote it.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelQuery {
    /// A name or a `provider:conditions` string
    Text(String),
    /// Key → `"<op><value>"`
    Structured(BTreeMap<String, String>),
}

impl From<&str> for ModelQuery {
    fn from(s: &str) -> Self {
        ModelQuery::Text(s.to_string())
    }
}

impl From<String> for ModelQuery {
    fn from(s: String) -> Self {
        ModelQuery::Text(s)
    }
}

impl From<BTreeMap<String, String>> for ModelQuery {
    fn from(map: BTreeMap<String, String>) -> Self {
        ModelQuery::Structured(map)
    }
}

impl std::fmt::Display for ModelQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelQuery::Text(s) => f.write_str(s),
            ModelQuery::Structured(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// A parsed, typed filter: every condition must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirements {
    pub conditions: Vec<Condition>,
}

fn condition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^<>=!]+)([<>=!]*)(.*)$").expect("condition regex is valid")
    })
}

fn comparison_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([<>=!]*)(.*)$").expect("comparison regex is valid"))
}

impl Requirements {
    /// Parse a query. `is_registered_name` decides whether a bare string is
    /// an exact registered name, which takes priority over the colon form.
    pub fn parse(query: &ModelQuery, is_registered_name: impl Fn(&str) -> bool) -> Result<Self> {
        let conditions = match query {
            ModelQuery::Text(text) => Self::parse_text(text, is_registered_name)?,
            ModelQuery::Structured(map) => Self::parse_structured(map)?,
        };

        // `auto` or an empty provider means any provider
        let conditions = conditions
            .into_iter()
            .filter(|c| !(c.key == "provider" && (c.value == "auto" || c.value.is_empty())))
            .collect();

        Ok(Self { conditions })
    }

    fn parse_text(text: &str, is_registered_name: impl Fn(&str) -> bool) -> Result<Vec<Condition>> {
        if is_registered_name(text) {
            return Ok(vec![Condition::new("name", CompareOp::Eq, text)]);
        }

        let Some((provider, rest)) = text.split_once(':') else {
            return Ok(vec![Condition::new("name", CompareOp::Eq, text)]);
        };

        let mut conditions = vec![Condition::new("provider", CompareOp::Eq, provider.trim())];
        for part in rest.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let caps = condition_regex()
                .captures(part)
                .ok_or_else(|| Error::validation(format!("malformed requirement '{part}'")))?;
            let key = caps.get(1).map_or("", |m| m.as_str()).trim();
            let op = CompareOp::parse(caps.get(2).map_or("", |m| m.as_str()))?;
            let value = caps.get(3).map_or("", |m| m.as_str()).trim();
            conditions.push(Condition::new(key, op, value));
        }
        Ok(conditions)
    }

    fn parse_structured(map: &BTreeMap<String, String>) -> Result<Vec<Condition>> {
        map.iter()
            .map(|(key, comparison)| {
                let comparison = comparison.trim();
                let caps = comparison_regex().captures(comparison).ok_or_else(|| {
                    Error::validation(format!("malformed requirement '{key}: {comparison}'"))
                })?;
                let op = CompareOp::parse(caps.get(1).map_or("", |m| m.as_str()))?;
                let value = caps.get(2).map_or("", |m| m.as_str()).trim();
                Ok(Condition::new(key.clone(), op, value))
            })
            .collect()
    }

    /// The numeric value of a `contextLength` constraint, if one is present.
    pub fn context_length_hint(&self) -> Option<f64> {
        self.conditions
            .iter()
            .filter(|c| c.key == "contextLength")
            .map(|c| to_number(&c.value))
            .find(|n| n.is_finite())
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

// ── ECMAScript comparison semantics ───────────────────────────────────────

/// ECMAScript `ToNumber` applied to a string.
pub fn to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = t.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).map_or(f64::NAN, |n| n as f64);
        }
    }
    // Rust accepts spellings like "inf" and "NaN" that ECMAScript does not
    if !t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Convert a JSON field to a primitive: numbers stay numbers, everything
/// else becomes the string ECMAScript would produce.
enum Primitive {
    Num(f64),
    Str(String),
}

fn to_primitive(value: &Value) -> Primitive {
    match value {
        Value::Null => Primitive::Num(0.0),
        Value::Bool(b) => Primitive::Num(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => Primitive::Num(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => Primitive::Str(s.clone()),
        Value::Array(items) => Primitive::Str(
            items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Primitive::Str("[object Object]".into()),
    }
}

/// Loose equality (`field == raw`) between a field and a raw query string.
pub fn loose_equals(field: &Value, raw: &str) -> bool {
    match field {
        // null only loosely equals null/undefined, never a string
        Value::Null => false,
        Value::String(s) => s == raw,
        other => match to_primitive(other) {
            Primitive::Num(n) => n == to_number(raw),
            Primitive::Str(s) => s == raw,
        },
    }
}

/// Relational comparison of a field against a raw query string.
///
/// Two strings compare by UTF-16 code units; otherwise both sides are
/// coerced to numbers. `None` means the comparison is undefined (NaN), which
/// makes every inequality operator false.
pub fn relational(field: &Value, raw: &str) -> Option<Ordering> {
    match to_primitive(field) {
        Primitive::Str(s) => Some(s.encode_utf16().cmp(raw.encode_utf16())),
        Primitive::Num(n) => n.partial_cmp(&to_number(raw)),
    }
}
