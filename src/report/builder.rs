use serde::Serialize;

use crate::dataset::Dataset;
use crate::detect::{Findings, Issue, IssueKind, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Clean,
    PassedWithWarnings,
    Failed,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Clean => "CLEAN",
            Verdict::PassedWithWarnings => "PASSED WITH WARNINGS",
            Verdict::Failed => "FAILED",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Verdict::Clean => "✓",
            Verdict::PassedWithWarnings => "⚠",
            Verdict::Failed => "✗",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindCount {
    pub kind: IssueKind,
    pub count: usize,
}

/// One audit cycle's result. Never modified after `build`; the next
/// audit produces a new report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub rows: usize,
    pub columns: usize,
    pub total_issues: usize,
    pub verdict: Verdict,
    pub fail_on: Severity,
    pub by_kind: Vec<KindCount>,
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Order issues by kind, then severity (highest first), then first column,
/// and decide the verdict. Ties keep detector order.
pub fn build(mut issues: Vec<Issue>, fail_on: Severity) -> AuditReport {
    issues.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| b.severity.cmp(&a.severity))
            .then_with(|| a.column().unwrap_or("").cmp(b.column().unwrap_or("")))
    });

    let verdict = if issues.iter().any(|i| i.is_at_least(fail_on)) {
        Verdict::Failed
    } else if issues.is_empty() {
        Verdict::Clean
    } else {
        Verdict::PassedWithWarnings
    };

    let by_kind = IssueKind::ALL
        .iter()
        .map(|kind| KindCount {
            kind: *kind,
            count: issues.iter().filter(|i| i.kind == *kind).count(),
        })
        .filter(|c| c.count > 0)
        .collect();

    AuditReport {
        rows: 0,
        columns: 0,
        total_issues: issues.len(),
        verdict,
        fail_on,
        by_kind,
        issues,
        notes: Vec::new(),
    }
}

impl AuditReport {
    /// Build from detector findings and fill in the dataset counters.
    pub fn from_findings(findings: Findings, dataset: &Dataset, fail_on: Severity) -> Self {
        let mut report = build(findings.issues, fail_on);
        report.rows = dataset.row_count();
        report.columns = dataset.column_count();
        report.notes = findings.notes;
        report
    }

    pub fn is_clean(&self) -> bool {
        self.verdict == Verdict::Clean
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    /// Issues grouped by kind, in report order, skipping empty kinds.
    pub fn groups(&self) -> Vec<(IssueKind, Vec<&Issue>)> {
        IssueKind::ALL
            .iter()
            .map(|kind| (*kind, self.issues_of(*kind).collect::<Vec<_>>()))
            .filter(|(_, issues)| !issues.is_empty())
            .collect()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(kind: IssueKind, severity: Severity, column: &str) -> Issue {
        Issue::new(kind, severity, "x").with_column(column)
    }

    #[test]
    fn test_empty_is_clean() {
        let report = build(Vec::new(), Severity::Error);
        assert_eq!(report.verdict, Verdict::Clean);
        assert!(report.is_clean());
        assert!(report.by_kind.is_empty());
    }

    #[test]
    fn test_warnings_only_pass() {
        let report = build(vec![issue(IssueKind::Outlier, Severity::Warning, "a")], Severity::Error);
        assert_eq!(report.verdict, Verdict::PassedWithWarnings);
        assert_eq!(report.verdict.to_string(), "PASSED WITH WARNINGS");
    }

    #[test]
    fn test_threshold_fails() {
        let report = build(vec![issue(IssueKind::Outlier, Severity::Error, "a")], Severity::Error);
        assert_eq!(report.verdict, Verdict::Failed);

        let lenient = build(vec![issue(IssueKind::Outlier, Severity::Error, "a")], Severity::Critical);
        assert_eq!(lenient.verdict, Verdict::PassedWithWarnings);
    }

    #[test]
    fn test_ordering() {
        let report = build(
            vec![
                issue(IssueKind::BusinessRule, Severity::Error, "a"),
                issue(IssueKind::NullExplosion, Severity::Warning, "b"),
                issue(IssueKind::NullExplosion, Severity::Warning, "a"),
                issue(IssueKind::NullExplosion, Severity::Critical, "z"),
                issue(IssueKind::SchemaDrift, Severity::Warning, "c"),
            ],
            Severity::Error,
        );
        let order: Vec<(IssueKind, &str)> = report
            .issues
            .iter()
            .map(|i| (i.kind, i.column().unwrap_or("")))
            .collect();
        assert_eq!(
            order,
            vec![
                (IssueKind::SchemaDrift, "c"),
                (IssueKind::NullExplosion, "z"),
                (IssueKind::NullExplosion, "a"),
                (IssueKind::NullExplosion, "b"),
                (IssueKind::BusinessRule, "a"),
            ]
        );
        assert_eq!(report.groups().len(), 3);
        assert_eq!(report.highest_severity(), Some(Severity::Critical));
    }
}
