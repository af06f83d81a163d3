//! Page snapshot values.
//!
//! A [`PageSnapshot`] is the structured representation of one page in one
//! environment. Leaves are [`SnapshotValue`]s, a closed sum type the diff
//! engine matches on exhaustively.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape category of a snapshot value. Two values must share a shape to be
/// compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Sequence,
    Mapping,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Scalar => "scalar",
            Shape::Sequence => "sequence",
            Shape::Mapping => "mapping",
        }
    }
}

/// A single value inside a page snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<SnapshotValue>),
    Map(BTreeMap<String, SnapshotValue>),
}

impl SnapshotValue {
    pub fn shape(&self) -> Shape {
        match self {
            SnapshotValue::List(_) => Shape::Sequence,
            SnapshotValue::Map(_) => Shape::Mapping,
            SnapshotValue::Null
            | SnapshotValue::Bool(_)
            | SnapshotValue::Int(_)
            | SnapshotValue::Float(_)
            | SnapshotValue::Text(_) => Shape::Scalar,
        }
    }

    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SnapshotValue::Int(i) => Some(*i as f64),
            SnapshotValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SnapshotValue::Null)
    }

    /// Value equality where `1` and `1.0` are the same number and NaN
    /// equals NaN.
    pub fn same_as(&self, other: &SnapshotValue) -> bool {
        match (self, other) {
            (SnapshotValue::List(a), SnapshotValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            (SnapshotValue::Map(a), SnapshotValue::Map(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.same_as(other)))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
                _ => self == other,
            },
        }
    }
}

impl fmt::Display for SnapshotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotValue::Null => Ok(()),
            SnapshotValue::Bool(b) => write!(f, "{b}"),
            SnapshotValue::Int(i) => write!(f, "{i}"),
            SnapshotValue::Float(x) => write!(f, "{x}"),
            SnapshotValue::Text(s) => f.write_str(s),
            SnapshotValue::List(_) | SnapshotValue::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<serde_json::Value> for SnapshotValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => SnapshotValue::Null,
            Value::Bool(b) => SnapshotValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SnapshotValue::Int(i),
                None => SnapshotValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SnapshotValue::Text(s),
            Value::Array(items) => {
                SnapshotValue::List(items.into_iter().map(SnapshotValue::from).collect())
            }
            Value::Object(map) => SnapshotValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, SnapshotValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for SnapshotValue {
    fn from(value: &str) -> Self {
        SnapshotValue::Text(value.to_string())
    }
}

impl From<String> for SnapshotValue {
    fn from(value: String) -> Self {
        SnapshotValue::Text(value)
    }
}

impl From<i64> for SnapshotValue {
    fn from(value: i64) -> Self {
        SnapshotValue::Int(value)
    }
}

impl From<f64> for SnapshotValue {
    fn from(value: f64) -> Self {
        SnapshotValue::Float(value)
    }
}

impl<T: Into<SnapshotValue>> From<Vec<T>> for SnapshotValue {
    fn from(values: Vec<T>) -> Self {
        SnapshotValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Structured data for one page in one environment.
///
/// Items are addressed by dot-paths (`content.title`, `performance.nodes`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageSnapshot(BTreeMap<String, SnapshotValue>);

impl PageSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from a JSON object. Returns `None` for non-objects.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match SnapshotValue::from(value) {
            SnapshotValue::Map(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Insert a top-level item.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SnapshotValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert at a dot-path, creating intermediate maps.
    pub fn with(mut self, dotted: &str, value: impl Into<SnapshotValue>) -> Self {
        self.set(dotted, value);
        self
    }

    /// Set a value at a dot-path, creating or replacing intermediate maps.
    pub fn set(&mut self, dotted: &str, value: impl Into<SnapshotValue>) {
        let mut parts = dotted.split('.').peekable();
        let mut current = &mut self.0;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                current.insert(part.to_string(), value.into());
                return;
            }
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| SnapshotValue::Map(BTreeMap::new()));
            if !matches!(entry, SnapshotValue::Map(_)) {
                *entry = SnapshotValue::Map(BTreeMap::new());
            }
            let SnapshotValue::Map(map) = entry else {
                return;
            };
            current = map;
        }
    }

    /// Resolve a dot-path. `Null` leaves are reported as absent.
    pub fn get(&self, dotted: &str) -> Option<&SnapshotValue> {
        let mut parts = dotted.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            match current {
                SnapshotValue::Map(map) => current = map.get(part)?,
                _ => return None,
            }
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
