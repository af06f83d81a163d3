//! Records that flow through the pipeline: sample paths, convergence
//! records, page pairs, diff records and report messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::SnapshotError;
use crate::domain::snapshot::{PageSnapshot, SnapshotValue};

/// A normalized URL path (plus query string) selected for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SamplePath(String);

impl SamplePath {
    pub fn new(path: impl Into<String>) -> Self {
        SamplePath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SamplePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SamplePath {
    fn from(path: &str) -> Self {
        SamplePath(path.to_string())
    }
}

impl AsRef<str> for SamplePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which deployment a piece of data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    Staging,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Staging => f.write_str("staging"),
        }
    }
}

/// Outcome of acquiring data for one path in one environment.
///
/// Exactly one of `snapshot` / `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceRecord {
    pub path: SamplePath,
    pub snapshot: Option<PageSnapshot>,
    pub error: Option<SnapshotError>,
}

impl ConvergenceRecord {
    pub fn resolved(path: SamplePath, snapshot: PageSnapshot) -> Self {
        Self {
            path,
            snapshot: Some(snapshot),
            error: None,
        }
    }

    pub fn invalid(path: SamplePath, error: SnapshotError) -> Self {
        Self {
            path,
            snapshot: None,
            error: Some(error),
        }
    }
}

/// Production and staging data for one path, ready for diffing.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePair {
    pub path: SamplePath,
    pub production: Option<PageSnapshot>,
    pub staging: Option<PageSnapshot>,
    /// Set when either side failed; the pair is then skipped by the diff engine.
    pub error: Option<String>,
}

/// Kind of a single difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Present only in staging.
    Add,
    /// Present only in production.
    Remove,
    Change,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKind::Add => f.write_str("add"),
            DiffKind::Remove => f.write_str("remove"),
            DiffKind::Change => f.write_str("change"),
        }
    }
}

/// A single difference between production and staging for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRecord {
    pub path: SamplePath,
    pub item: String,
    #[serde(rename = "type")]
    pub kind: DiffKind,
    /// Dot-joined location inside the item; empty for whole-item differences.
    pub element: String,
    pub production: SnapshotValue,
    pub staging: SnapshotValue,
}

/// A stringified diff record, tagged with the module that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub module: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub item: String,
    pub element: String,
    pub production: String,
    pub staging: String,
}

impl Message {
    pub fn from_diff(module: &str, diff: &DiffRecord) -> Self {
        Self {
            module: module.to_string(),
            path: diff.path.to_string(),
            kind: diff.kind.to_string(),
            item: diff.item.clone(),
            element: diff.element.clone(),
            production: diff.production.to_string(),
            staging: diff.staging.to_string(),
        }
    }
}

/// A recoverable error for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathError {
    pub path: SamplePath,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_stringifies_all_values() {
        let diff = DiffRecord {
            path: SamplePath::from("/about/"),
            item: "performance".to_string(),
            kind: DiffKind::Change,
            element: "nodes".to_string(),
            production: SnapshotValue::Int(100),
            staging: SnapshotValue::Float(120.5),
        };

        let msg = Message::from_diff("headless", &diff);
        assert_eq!(msg.module, "headless");
        assert_eq!(msg.path, "/about/");
        assert_eq!(msg.kind, "change");
        assert_eq!(msg.production, "100");
        assert_eq!(msg.staging, "120.5");
    }

    #[test]
    fn test_diff_kind_serializes_as_type() {
        let diff = DiffRecord {
            path: SamplePath::from("/"),
            item: "content.h1".to_string(),
            kind: DiffKind::Add,
            element: String::new(),
            production: SnapshotValue::Null,
            staging: SnapshotValue::from("Welcome"),
        };
        let raw = serde_json::to_value(&diff).expect("serialize");
        assert_eq!(raw["type"], "add");
        assert_eq!(raw["path"], "/");
    }
}
