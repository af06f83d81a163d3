use tracing::debug;

use crate::diff::compare::compare;
use crate::diff::exclusion::{unsupported, ExclusionRule, ExclusionSpec};
use crate::domain::{DiffKind, DiffRecord, PagePair, PathError, Result, SnapshotValue};

/// Diff every page pair against every leaf of the exclusion tree.
///
/// Errored pairs go straight to the error list. For the rest, each leaf
/// item is compared:
/// - `true` skips the item,
/// - `false` compares exactly, a number compares with that tolerance,
/// - both sides absent is not a difference,
/// - one side absent yields a whole-item `add` or `remove` record.
///
/// Records are ordered by pair, then by leaf in key order. Type mismatches
/// and unsupported leaves abort with an error.
pub fn run_diffs(
    pairs: &[PagePair],
    exclusions: &ExclusionSpec,
) -> Result<(Vec<DiffRecord>, Vec<PathError>)> {
    exclusions.validate()?;
    let leaves = exclusions.leaves();

    let mut diffs = Vec::new();
    let mut errors = Vec::new();

    for pair in pairs {
        if let Some(error) = &pair.error {
            errors.push(PathError {
                path: pair.path.clone(),
                error: error.clone(),
            });
            continue;
        }

        for (item, rule) in &leaves {
            let tolerance = match rule {
                ExclusionRule::Ignore(true) => {
                    debug!(path = %pair.path, item = %item, "ignoring item");
                    continue;
                }
                ExclusionRule::Ignore(false) => None,
                ExclusionRule::Tolerance(t) => Some(*t),
                ExclusionRule::Unsupported(value) => return Err(unsupported(item, value)),
                ExclusionRule::Nested(_) => continue,
            };

            let production = pair.production.as_ref().and_then(|s| s.get(item));
            let staging = pair.staging.as_ref().and_then(|s| s.get(item));

            match (production, staging) {
                (None, None) => {
                    debug!(path = %pair.path, item = %item, "no values found");
                }
                (None, Some(b)) => diffs.push(whole_item(pair, item, DiffKind::Add, SnapshotValue::Null, b.clone())),
                (Some(a), None) => diffs.push(whole_item(pair, item, DiffKind::Remove, a.clone(), SnapshotValue::Null)),
                (Some(a), Some(b)) => diffs.extend(compare(&pair.path, item, a, b, tolerance)?),
            }
        }
    }

    Ok((diffs, errors))
}

fn whole_item(
    pair: &PagePair,
    item: &str,
    kind: DiffKind,
    production: SnapshotValue,
    staging: SnapshotValue,
) -> DiffRecord {
    DiffRecord {
        path: pair.path.clone(),
        item: item.to_string(),
        kind,
        element: String::new(),
        production,
        staging,
    }
}
