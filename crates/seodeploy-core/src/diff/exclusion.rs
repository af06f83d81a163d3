//! Exclusion tree: which snapshot items to ignore or tolerate.
//!
//! Mirrors the shape of a page snapshot. Leaves are either a boolean
//! (`true` ignores the item) or a number (percentage tolerance for numeric
//! leaves). Anything else is a configuration error, caught when the tree
//! is walked.
//!
//! ```toml
//! [modules.contentking.ignore]
//! schema = true
//! [modules.contentking.ignore.content]
//! title = false
//! [modules.headless.ignore.performance]
//! nodes = 10.0
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Result, SeoError};

/// One node of the exclusion tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExclusionRule {
    /// `true` skips the item, `false` compares it exactly.
    Ignore(bool),
    /// Allowed percentage difference for numeric leaves.
    Tolerance(f64),
    Nested(BTreeMap<String, ExclusionRule>),
    /// Any other leaf; rejected at diff time.
    Unsupported(serde_json::Value),
}

/// The full exclusion tree for one module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSpec(BTreeMap<String, ExclusionRule>);

impl ExclusionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a leaf at a dot-path.
    pub fn with(mut self, dotted: &str, rule: ExclusionRule) -> Self {
        let mut parts = dotted.split('.').peekable();
        let mut current = &mut self.0;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                current.insert(part.to_string(), rule);
                break;
            }
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| ExclusionRule::Nested(BTreeMap::new()));
            if !matches!(entry, ExclusionRule::Nested(_)) {
                *entry = ExclusionRule::Nested(BTreeMap::new());
            }
            let ExclusionRule::Nested(map) = entry else {
                break;
            };
            current = map;
        }
        self
    }

    /// Every leaf as `(dot-path, rule)`, depth-first in key order.
    pub fn leaves(&self) -> Vec<(String, &ExclusionRule)> {
        let mut out = Vec::new();
        collect_leaves("", &self.0, &mut out);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject leaves that are neither boolean nor numeric.
    pub fn validate(&self) -> Result<()> {
        for (item, rule) in self.leaves() {
            if let ExclusionRule::Unsupported(value) = rule {
                return Err(unsupported(&item, value));
            }
        }
        Ok(())
    }
}

pub(crate) fn unsupported(item: &str, value: &serde_json::Value) -> SeoError {
    SeoError::Config(format!(
        "ignore values must be boolean or numeric; item {item} has {value}"
    ))
}

fn collect_leaves<'a>(
    prefix: &str,
    map: &'a BTreeMap<String, ExclusionRule>,
    out: &mut Vec<(String, &'a ExclusionRule)>,
) {
    for (key, rule) in map {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match rule {
            ExclusionRule::Nested(children) => collect_leaves(&dotted, children, out),
            leaf => out.push((dotted, leaf)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_toml_mixes_bools_and_tolerances() {
        let raw = r#"
            schema = true
            [content]
            title = false
            h1 = true
            [performance]
            nodes = 10
            script_duration = 2.5
        "#;
        let spec: ExclusionSpec = toml::from_str(raw).expect("parse");
        let leaves: Vec<(String, ExclusionRule)> = spec
            .leaves()
            .into_iter()
            .map(|(k, r)| (k, r.clone()))
            .collect();

        assert_eq!(
            leaves,
            vec![
                ("content.h1".to_string(), ExclusionRule::Ignore(true)),
                ("content.title".to_string(), ExclusionRule::Ignore(false)),
                ("performance.nodes".to_string(), ExclusionRule::Tolerance(10.0)),
                (
                    "performance.script_duration".to_string(),
                    ExclusionRule::Tolerance(2.5)
                ),
                ("schema".to_string(), ExclusionRule::Ignore(true)),
            ]
        );
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_string_leaf_fails_validation() {
        let spec: ExclusionSpec = toml::from_str("[content]\ntitle = \"yes\"").expect("parse");
        let err = spec.validate().expect_err("unsupported leaf");
        assert!(err.to_string().contains("content.title"));
    }

    #[test]
    fn test_builder_nests_dot_paths() {
        let spec = ExclusionSpec::new()
            .with("coverage.css.unused_pc", ExclusionRule::Tolerance(5.0))
            .with("coverage.js.unused_pc", ExclusionRule::Ignore(true));
        let keys: Vec<String> = spec.leaves().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["coverage.css.unused_pc", "coverage.js.unused_pc"]);
    }
}
