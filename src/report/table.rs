use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::detect::Issue;
use super::builder::AuditReport;

const MAX_ROWS_SHOWN: usize = 6;

#[derive(Debug, Clone, Tabled)]
pub struct IssueTableRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Column")]
    pub column: String,
    #[tabled(rename = "Rows")]
    pub rows: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

impl IssueTableRow {
    pub fn new(index: usize, issue: &Issue) -> Self {
        let column = if issue.columns.is_empty() {
            "-".to_string()
        } else {
            issue.columns.join(", ")
        };

        let rows = if issue.rows.is_empty() {
            "-".to_string()
        } else {
            let shown: Vec<String> = issue
                .rows
                .iter()
                .take(MAX_ROWS_SHOWN)
                .map(|r| r.to_string())
                .collect();
            if issue.rows.len() > MAX_ROWS_SHOWN {
                format!("{}, ... ({} total)", shown.join(", "), issue.rows.len())
            } else {
                shown.join(", ")
            }
        };

        Self {
            index,
            kind: issue.kind.as_str().to_string(),
            severity: issue.severity.as_str().to_string(),
            column,
            rows,
            description: truncate(&issue.description, 80),
        }
    }
}

pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Markdown table of issues followed by the summary counters.
pub fn render_table(report: &AuditReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} ({} rows, {} columns, {} issue(s))\n",
        report.verdict.symbol(),
        report.verdict,
        report.rows,
        report.columns,
        report.total_issues
    ));

    if !report.issues.is_empty() {
        let rows: Vec<IssueTableRow> = report
            .issues
            .iter()
            .enumerate()
            .map(|(i, issue)| IssueTableRow::new(i + 1, issue))
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::markdown());
        out.push('\n');
        out.push_str(&table.to_string());
        out.push('\n');
    }

    if !report.notes.is_empty() {
        out.push_str("\nNotes:\n");
        for note in &report.notes {
            out.push_str(&format!("  - {}\n", note));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{IssueKind, Severity};
    use crate::report::build;

    #[test]
    fn test_row_list_is_shortened() {
        let issue = Issue::new(IssueKind::NullExplosion, Severity::Warning, "nulls")
            .with_column("a")
            .with_rows((0..10).collect());
        let row = IssueTableRow::new(1, &issue);
        assert!(row.rows.ends_with("(10 total)"));
    }

    #[test]
    fn test_dataset_level_issue_has_dash_column() {
        let issue = Issue::new(IssueKind::DuplicateRows, Severity::Warning, "dups");
        assert_eq!(IssueTableRow::new(1, &issue).column, "-");
    }

    #[test]
    fn test_render_table_contains_verdict() {
        let report = build(
            vec![Issue::new(IssueKind::Outlier, Severity::Warning, "far out").with_column("sales")],
            Severity::Error,
        );
        let text = render_table(&report);
        assert!(text.contains("PASSED WITH WARNINGS"));
        assert!(text.contains("far out"));
        assert!(text.contains("Severity"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
