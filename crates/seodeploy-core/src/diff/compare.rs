use std::collections::BTreeMap;

use crate::domain::{DiffKind, DiffRecord, Result, SamplePath, SeoError, SnapshotValue};

/// Whether two numbers are equal within `tolerance` percent of `production`.
///
/// The boundary is inclusive: a difference of exactly `tolerance`% is not a
/// change, even when the decimal inputs are not exact in binary.
pub fn within_tolerance(production: f64, staging: f64, tolerance: f64) -> bool {
    if production == staging || (production.is_nan() && staging.is_nan()) {
        return true;
    }
    let allowed = tolerance * production.abs() * (1.0 + TOLERANCE_EPSILON);
    (staging - production).abs() * 100.0 <= allowed
}

/// Relative slack absorbing binary rounding of decimal inputs.
const TOLERANCE_EPSILON: f64 = 1e-9;

/// Compare the production and staging values of one item.
///
/// Both values must share a shape (scalar, sequence or mapping), otherwise
/// [`SeoError::TypeMismatch`] is returned.
///
/// - Sequences are compared as sets: `add` records for elements only in
///   staging (staging order), then `remove` records for elements only in
///   production.
/// - Mappings recurse over their sorted keys; `element` is the dot-joined
///   key path of each differing leaf. Keys present on one side only yield
///   `add`/`remove` records.
/// - Scalars yield a single `change` record when they differ. Numeric
///   leaves compared with a `tolerance` only change when the relative
///   difference exceeds it.
pub fn compare(
    path: &SamplePath,
    item: &str,
    production: &SnapshotValue,
    staging: &SnapshotValue,
    tolerance: Option<f64>,
) -> Result<Vec<DiffRecord>> {
    let (a, b) = (production.shape(), staging.shape());
    if a != b {
        return Err(SeoError::TypeMismatch {
            path: path.to_string(),
            item: item.to_string(),
            production: a.as_str(),
            staging: b.as_str(),
        });
    }

    let mut differ = Differ {
        path,
        item,
        tolerance,
        out: Vec::new(),
    };
    differ.value("", production, staging);
    Ok(differ.out)
}

struct Differ<'a> {
    path: &'a SamplePath,
    item: &'a str,
    tolerance: Option<f64>,
    out: Vec<DiffRecord>,
}

impl Differ<'_> {
    fn push(&mut self, kind: DiffKind, element: &str, production: SnapshotValue, staging: SnapshotValue) {
        self.out.push(DiffRecord {
            path: self.path.clone(),
            item: self.item.to_string(),
            kind,
            element: element.to_string(),
            production,
            staging,
        });
    }

    fn value(&mut self, element: &str, a: &SnapshotValue, b: &SnapshotValue) {
        match (a, b) {
            (SnapshotValue::List(xs), SnapshotValue::List(ys)) => self.sets(element, xs, ys),
            (SnapshotValue::Map(ma), SnapshotValue::Map(mb)) => self.maps(element, ma, mb),
            _ if a.shape() == b.shape() => self.scalars(element, a, b),
            // Nested shape mismatch inside a mapping.
            _ => self.push(DiffKind::Change, element, a.clone(), b.clone()),
        }
    }

    fn scalars(&mut self, element: &str, a: &SnapshotValue, b: &SnapshotValue) {
        let unchanged = match (self.tolerance, a.as_f64(), b.as_f64()) {
            (Some(tol), Some(x), Some(y)) => within_tolerance(x, y, tol),
            _ => a.same_as(b),
        };
        if !unchanged {
            self.push(DiffKind::Change, element, a.clone(), b.clone());
        }
    }

    fn sets(&mut self, element: &str, xs: &[SnapshotValue], ys: &[SnapshotValue]) {
        let added = only_in(ys, xs);
        let removed = only_in(xs, ys);
        for v in added {
            self.push(DiffKind::Add, element, SnapshotValue::Null, v.clone());
        }
        for v in removed {
            self.push(DiffKind::Remove, element, v.clone(), SnapshotValue::Null);
        }
    }

    fn maps(
        &mut self,
        element: &str,
        ma: &BTreeMap<String, SnapshotValue>,
        mb: &BTreeMap<String, SnapshotValue>,
    ) {
        for (key, a) in ma {
            if let Some(b) = mb.get(key) {
                self.value(&child(element, key), a, b);
            }
        }
        for (key, b) in mb.iter().filter(|(k, _)| !ma.contains_key(*k)) {
            self.push(DiffKind::Add, &child(element, key), SnapshotValue::Null, b.clone());
        }
        for (key, a) in ma.iter().filter(|(k, _)| !mb.contains_key(*k)) {
            self.push(DiffKind::Remove, &child(element, key), a.clone(), SnapshotValue::Null);
        }
    }
}

fn child(element: &str, key: &str) -> String {
    if element.is_empty() {
        key.to_string()
    } else {
        format!("{element}.{key}")
    }
}

/// Distinct elements of `xs` (in order) that have no equal in `ys`.
fn only_in<'v>(xs: &'v [SnapshotValue], ys: &[SnapshotValue]) -> Vec<&'v SnapshotValue> {
    let mut out: Vec<&SnapshotValue> = Vec::new();
    for x in xs {
        if ys.iter().any(|y| y.same_as(x)) || out.iter().any(|seen| seen.same_as(x)) {
            continue;
        }
        out.push(x);
    }
    out
}
