// ── Server field maps ──
//
// Decoded responses arrive as loosely-typed name/value pairs. Each object
// variant declares a fixed schema of the fields it recognises; decoding
// coerces those to their declared kind and keeps everything else aside.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single value as delivered by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

/// Field name -> value, in the order the server sent them.
pub type FieldMap = IndexMap<String, FieldValue>;

/// The kind a schema field is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Bool,
    /// Whitespace-separated list (tags).
    List,
}

/// One entry in a variant's schema table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub(crate) const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
    }
}

pub(crate) const fn integer(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Integer,
    }
}

pub(crate) const fn float(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Float,
    }
}

pub(crate) const fn boolean(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Bool,
    }
}

pub(crate) const fn list(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::List,
    }
}

/// Text form of a typed field value, for lookups by schema name.
pub(crate) fn shown(value: Option<impl ToString>) -> Option<String> {
    value.map(|v| v.to_string())
}

/// Split a raw tag string on whitespace. Empty input yields an empty list.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

impl FieldValue {
    /// Coerce this value to `kind`. Returns `Ok(None)` for values that mean
    /// "absent" (empty strings for non-text kinds).
    #[allow(
        clippy::as_conversions,
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation
    )]
    pub fn coerce(self, kind: FieldKind) -> Result<Option<Self>, String> {
        match (kind, self) {
            (FieldKind::Text, Self::Text(s)) => Ok(Some(Self::Text(s))),
            (FieldKind::Text, Self::Integer(n)) => Ok(Some(Self::Text(n.to_string()))),
            (FieldKind::Text, Self::Float(f)) => Ok(Some(Self::Text(f.to_string()))),
            (FieldKind::Text, Self::Bool(b)) => Ok(Some(Self::Text(b.to_string()))),
            (FieldKind::Text, Self::List(items)) => Ok(Some(Self::Text(items.join(" ")))),

            (FieldKind::List, Self::Text(s)) => Ok(Some(Self::List(split_tags(&s)))),
            (FieldKind::List, Self::List(items)) => Ok(Some(Self::List(
                items.iter().flat_map(|s| split_tags(s)).collect(),
            ))),

            (FieldKind::Integer, Self::Integer(n)) => Ok(Some(Self::Integer(n))),
            (FieldKind::Integer, Self::Text(s)) => parse_integer(&s),
            (FieldKind::Integer, Self::Float(f)) if f.fract() == 0.0 => {
                Ok(Some(Self::Integer(f as i64)))
            }

            (FieldKind::Float, Self::Float(f)) => Ok(Some(Self::Float(f))),
            (FieldKind::Float, Self::Integer(n)) => Ok(Some(Self::Float(n as f64))),
            (FieldKind::Float, Self::Text(s)) => parse_float(&s),

            (FieldKind::Bool, Self::Bool(b)) => Ok(Some(Self::Bool(b))),
            (FieldKind::Bool, Self::Integer(n)) => Ok(Some(Self::Bool(n != 0))),
            (FieldKind::Bool, Self::Text(s)) => parse_bool(&s),

            (kind, other) => Err(format!("cannot read {other:?} as {kind:?}")),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

fn parse_integer(raw: &str) -> Result<Option<FieldValue>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(|n| Some(FieldValue::Integer(n)))
        .map_err(|e| format!("'{trimmed}' is not an integer: {e}"))
}

/// PRTG renders percentages and durations with units (`"99.9876 %"`,
/// `"12 s"`), so only the leading numeric token is parsed.
fn parse_float(raw: &str) -> Result<Option<FieldValue>, String> {
    let Some(token) = raw.split_whitespace().next() else {
        return Ok(None);
    };
    let token = token.trim_end_matches('%').replace(',', ".");
    token
        .parse::<f64>()
        .map(|f| Some(FieldValue::Float(f)))
        .map_err(|e| format!("'{raw}' is not a number: {e}"))
}

/// Booleans show up as `true`/`false`, `1`/`0`, or the server's `-1`.
fn parse_bool(raw: &str) -> Result<Option<FieldValue>, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "1" | "-1" | "yes" => Ok(Some(FieldValue::Bool(true))),
        "false" | "0" | "no" => Ok(Some(FieldValue::Bool(false))),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

// ── Schema validation ───────────────────────────────────────────────

/// Fields recognised by a schema, already coerced to their declared kinds.
///
/// Built by [`Validated::apply`], which moves recognised fields out of the
/// raw map. Whatever remains in the raw map is unknown to the schema.
#[derive(Debug, Default)]
pub(crate) struct Validated {
    values: IndexMap<&'static str, FieldValue>,
}

impl Validated {
    pub(crate) fn apply(&mut self, fields: &mut FieldMap, schema: &[FieldSpec]) -> Result<(), String> {
        for spec in schema {
            let Some(raw) = fields.shift_remove(spec.name) else {
                continue;
            };
            let coerced = raw
                .coerce(spec.kind)
                .map_err(|reason| format!("field '{}': {reason}", spec.name))?;
            if let Some(value) = coerced {
                self.values.insert(spec.name, value);
            }
        }
        Ok(())
    }

    pub(crate) fn text(&mut self, name: &str) -> Option<String> {
        match self.values.shift_remove(name) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn integer(&mut self, name: &str) -> Option<i64> {
        self.values.shift_remove(name).and_then(|v| v.as_integer())
    }

    pub(crate) fn float(&mut self, name: &str) -> Option<f64> {
        self.values.shift_remove(name).and_then(|v| v.as_float())
    }

    pub(crate) fn boolean(&mut self, name: &str) -> Option<bool> {
        self.values.shift_remove(name).and_then(|v| v.as_bool())
    }

    pub(crate) fn list(&mut self, name: &str) -> Vec<String> {
        match self.values.shift_remove(name) {
            Some(FieldValue::List(items)) => items,
            _ => Vec::new(),
        }
    }
}
