//! Result formatters
//!
//! Provides table, JSON, CSV and summary renderings of the result map.
//! Results are emitted in sorted key order so output is deterministic
//! regardless of completion order.

use std::collections::BTreeMap;

use crate::executor::ResultMap;
use crate::models::{RunSummary, TestResult, TestStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format the whole result map.
    pub fn format_results(&self, results: &ResultMap) -> String {
        let sorted: BTreeMap<&String, &TestResult> = results.iter().collect();

        match self.format {
            OutputFormat::Table => {
                let width = sorted.keys().map(|name| name.len()).max().unwrap_or(0);
                let mut output = String::new();
                for (name, result) in &sorted {
                    output.push_str(&format!(
                        "{:width$}  {} [{:>6}ms]",
                        name,
                        self.status_label(result.status),
                        result.duration_ms(),
                    ));
                    if let Some(caught) = &result.caught {
                        output.push_str(&format!(" - {caught}"));
                    }
                    output.push('\n');
                }
                output
            }
            OutputFormat::Json => serde_json::to_string(&sorted).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&sorted).unwrap_or_default(),
            OutputFormat::Csv => {
                let mut output = String::from("name,class,method,status,duration_ms,error\n");
                for (name, result) in &sorted {
                    output.push_str(&self.format_result_csv(name, result));
                    output.push('\n');
                }
                output
            }
            OutputFormat::Summary => {
                let mut output = String::new();
                for (name, result) in &sorted {
                    output.push_str(&format!("{} {}\n", result.status.symbol(), name));
                }
                output
            }
        }
    }

    /// Format the aggregated run summary.
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            _ => format!(
                "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n{summary}"
            ),
        }
    }

    fn status_label(&self, status: TestStatus) -> String {
        if self.colorize {
            match status {
                TestStatus::Success => "\x1b[32m✓ SUCCESS\x1b[0m".to_string(),
                TestStatus::Failure => "\x1b[31m✗ FAILURE\x1b[0m".to_string(),
                TestStatus::Skipped => "\x1b[33m○ SKIPPED\x1b[0m".to_string(),
                TestStatus::Created => "· CREATED".to_string(),
            }
        } else {
            format!("{} {}", status.symbol(), status)
        }
    }

    fn format_result_csv(&self, name: &str, result: &TestResult) -> String {
        format!(
            "{},{},{},{},{},\"{}\"",
            name,
            result.test_class,
            result.method_name,
            result.status,
            result.duration_ms(),
            result
                .caught
                .as_ref()
                .map(|caught| caught.to_string().replace('"', "\"\""))
                .unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::CaseFailure;
    use std::collections::HashMap;

    fn sample_results() -> ResultMap {
        let mut results = HashMap::new();

        let mut passed = TestResult::new("login_ok", "portal.LoginTests");
        passed.mark(TestStatus::Success);
        results.insert("portal.LoginTests.login_ok".to_string(), passed);

        let mut failed = TestResult::new("login_bad", "portal.LoginTests");
        failed.mark_with(
            TestStatus::Failure,
            CaseFailure::Assertion("banner \"welcome\" missing".into()),
        );
        results.insert("portal.LoginTests.login_bad".to_string(), failed);

        results
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("table"), Some(OutputFormat::Table));
        assert_eq!(
            OutputFormat::from_str("JSON-Pretty"),
            Some(OutputFormat::JsonPretty)
        );
        assert_eq!(OutputFormat::from_str("xml"), None);
    }

    #[test]
    fn test_table_output_is_sorted() {
        let formatter = ResultFormatter::new(OutputFormat::Table).no_color();
        let output = formatter.format_results(&sample_results());

        let bad = output.find("login_bad").unwrap();
        let ok = output.find("login_ok").unwrap();
        assert!(bad < ok);
        assert!(output.contains("FAILURE"));
        assert!(output.contains("banner"));
    }

    #[test]
    fn test_json_output_parses_back() {
        let formatter = ResultFormatter::new(OutputFormat::Json);
        let output = formatter.format_results(&sample_results());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(value.get("portal.LoginTests.login_ok").is_some());
    }

    #[test]
    fn test_csv_escapes_quotes() {
        let formatter = ResultFormatter::new(OutputFormat::Csv);
        let output = formatter.format_results(&sample_results());
        assert!(output.starts_with("name,class,method,status,duration_ms,error\n"));
        assert!(output.contains("\"\"welcome\"\""));
    }

    #[test]
    fn test_summary_lines() {
        let formatter = ResultFormatter::new(OutputFormat::Summary);
        let output = formatter.format_results(&sample_results());
        assert_eq!(output.lines().count(), 2);
    }
}
