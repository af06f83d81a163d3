//! Turning ContentKing URL reports into page snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use seodeploy_core::{PageSnapshot, SnapshotError, SnapshotValue, StatusRecord};

/// Issue names reported for every page, flagged `"issue"` when open.
pub const CONTENTKING_ISSUES: &[&str] = &[
    "analytics/analytics_missing",
    "analytics/visual_analytics_missing",
    "h1/duplicate",
    "h1/incorrect_length",
    "h1/missing",
    "h1/too_many",
    "canonical_link/incorrectly_canonicalized",
    "canonical_link/missing",
    "canonical_link/points_to_unindexable",
    "canonical_link/too_many",
    "images/alt_attribute",
    "images/title_attribute",
    "links/broken",
    "links/redirected",
    "links/to_canonicalized",
    "meta_description/duplicate",
    "meta_description/incorrect_length",
    "meta_description/missing",
    "meta_description/too_many",
    "title/duplicate",
    "title/incorrect_length",
    "title/missing",
    "title/too_many",
    "open_graph/description_incorrect_length",
    "open_graph/description_missing",
    "open_graph/image_missing",
    "open_graph/title_incorrect_length",
    "open_graph/title_missing",
    "open_graph/url_missing",
    "twitter_cards/description_incorrect_length",
    "twitter_cards/description_missing",
    "twitter_cards/image_missing",
    "twitter_cards/site_missing",
    "twitter_cards/title_incorrect_length",
    "twitter_cards/title_missing",
    "twitter_cards/type_invalid",
    "twitter_cards/type_missing",
    "xml_sitemap/incorrectly_missing",
    "xml_sitemap/incorrectly_present",
];

/// Parse a crawl timestamp. Offsets are honoured; naive times are UTC.
pub fn parse_checked_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Build a status record from a URL report.
///
/// Returns `Ok(None)` when the report has no `time_col` value.
pub fn status_from_report(
    report: &Value,
    time_col: &str,
) -> Result<Option<StatusRecord>, SnapshotError> {
    let Some(raw) = report.get(time_col).and_then(Value::as_str) else {
        return Ok(None);
    };
    let checked_at = parse_checked_at(raw).ok_or_else(|| {
        SnapshotError::Malformed(format!("unparseable {time_col} timestamp: {raw}"))
    })?;

    Ok(Some(StatusRecord {
        checked_at,
        snapshot: snapshot_from_report(report)?,
    }))
}

/// Extract `content.<type>`, `issues.<name>` and `schema` from a report.
pub fn snapshot_from_report(report: &Value) -> Result<PageSnapshot, SnapshotError> {
    let mut snapshot = PageSnapshot::new();

    let items = report
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| SnapshotError::Malformed("missing content list".to_string()))?;

    let mut content: BTreeMap<String, SnapshotValue> = BTreeMap::new();
    for item in items {
        let Some(kind) = item.get("type").and_then(Value::as_str) else {
            continue;
        };
        let value = SnapshotValue::from(item.get("content").cloned().unwrap_or(Value::Null));
        match content
            .entry(kind.to_string())
            .or_insert_with(|| SnapshotValue::List(Vec::new()))
        {
            SnapshotValue::List(values) => values.push(value),
            other => *other = SnapshotValue::List(vec![value]),
        }
    }
    snapshot.insert("content", SnapshotValue::Map(content));

    let open: Vec<&str> = report
        .get("open_issues")
        .and_then(Value::as_array)
        .map(|issues| {
            issues
                .iter()
                .filter_map(|i| i.get("name").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    let issues: BTreeMap<String, SnapshotValue> = CONTENTKING_ISSUES
        .iter()
        .map(|name| {
            let flag = if open.contains(name) { "issue" } else { "" };
            (name.to_string(), SnapshotValue::from(flag))
        })
        .collect();
    snapshot.insert("issues", SnapshotValue::Map(issues));

    if let Some(schema) = report.get("schema_org") {
        snapshot.insert("schema", SnapshotValue::from(schema.clone()));
    }

    Ok(snapshot)
}
