use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Message;

/// CSV column order of the run report.
pub const CSV_HEADER: [&str; 7] = [
    "module",
    "path",
    "type",
    "item",
    "element",
    "production",
    "staging",
];

/// Pass/fail tally for one module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleSummary {
    pub module: String,
    pub passing: bool,
    pub messages: usize,
    pub errors: usize,
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started: DateTime<Utc>,
    pub samples: usize,
    pub modules: Vec<ModuleSummary>,
    /// AND over all module pass flags.
    pub passing: bool,
}

impl RunSummary {
    pub fn new(run_id: Uuid, started: DateTime<Utc>, samples: usize, modules: Vec<ModuleSummary>) -> Self {
        let passing = modules.iter().all(|m| m.passing);
        Self {
            run_id,
            started,
            samples,
            modules,
            passing,
        }
    }

    pub fn error_count(&self) -> usize {
        self.modules.iter().map(|m| m.errors).sum()
    }

    /// Flat summary printed at the end of a run.
    ///
    /// Keys: `run_id`, `started`, `samples`, `modules`, `<module> passing`,
    /// `<module> errors`, `passing`.
    pub fn to_flat_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("run_id".into(), self.run_id.to_string().into());
        map.insert("started".into(), self.started.to_rfc3339().into());
        map.insert("samples".into(), self.samples.into());
        map.insert(
            "modules".into(),
            self.modules
                .iter()
                .map(|m| m.module.clone())
                .collect::<Vec<_>>()
                .join(",")
                .into(),
        );
        for m in &self.modules {
            map.insert(format!("{} passing", m.module), m.passing.into());
            map.insert(format!("{} errors", m.module), m.errors.into());
        }
        map.insert("passing".into(), self.passing.into());
        serde_json::Value::Object(map)
    }
}

/// Render the summary as pretty JSON.
pub fn render_summary(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(&summary.to_flat_json()).context("serialize run summary")
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Render all messages as CSV with a header row.
pub fn render_messages_csv(messages: &[Message]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');
    for m in messages {
        let row = [
            &m.module,
            &m.path,
            &m.kind,
            &m.item,
            &m.element,
            &m.production,
            &m.staging,
        ];
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Write the CSV run report.
pub fn write_messages_csv(path: &Path, messages: &[Message]) -> Result<()> {
    std::fs::write(path, render_messages_csv(messages))
        .with_context(|| format!("write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(production: &str, staging: &str) -> Message {
        Message {
            module: "headless".into(),
            path: "/a?b=1".into(),
            kind: "change".into(),
            item: "content.title".into(),
            element: String::new(),
            production: production.into(),
            staging: staging.into(),
        }
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let csv = render_messages_csv(&[message("Hello, world", "Say \"hi\"\nnow")]);
        let mut lines = csv.splitn(2, '\n');
        assert_eq!(
            lines.next(),
            Some("module,path,type,item,element,production,staging")
        );
        assert_eq!(
            lines.next(),
            Some("headless,/a?b=1,change,content.title,,\"Hello, world\",\"Say \"\"hi\"\"\nnow\"\n")
        );
    }

    #[test]
    fn test_empty_report_is_header_only() {
        assert_eq!(
            render_messages_csv(&[]),
            "module,path,type,item,element,production,staging\n"
        );
    }

    #[test]
    fn test_summary_is_and_over_modules() {
        let summary = RunSummary::new(
            Uuid::new_v4(),
            Utc::now(),
            10,
            vec![
                ModuleSummary {
                    module: "contentking".into(),
                    passing: true,
                    messages: 0,
                    errors: 2,
                },
                ModuleSummary {
                    module: "headless".into(),
                    passing: false,
                    messages: 3,
                    errors: 0,
                },
            ],
        );
        assert!(!summary.passing);
        assert_eq!(summary.error_count(), 2);

        let flat = summary.to_flat_json();
        assert_eq!(flat["samples"], 10);
        assert_eq!(flat["modules"], "contentking,headless");
        assert_eq!(flat["contentking passing"], true);
        assert_eq!(flat["contentking errors"], 2);
        assert_eq!(flat["headless passing"], false);
        assert_eq!(flat["passing"], false);
    }

    #[test]
    fn test_no_modules_passes() {
        let summary = RunSummary::new(Uuid::new_v4(), Utc::now(), 0, Vec::new());
        assert!(summary.passing);
    }

    #[test]
    fn test_write_csv_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("output.csv");
        write_messages_csv(&file, &[message("a", "b")]).expect("write");
        let raw = std::fs::read_to_string(&file).expect("read");
        assert!(raw.ends_with("headless,/a?b=1,change,content.title,,a,b\n"));
    }
}
