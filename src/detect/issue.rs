use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed issue taxonomy. Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    SchemaDrift,
    NullExplosion,
    DuplicateRows,
    Outlier,
    BusinessRule,
}

impl IssueKind {
    pub const ALL: [IssueKind; 5] = [
        IssueKind::SchemaDrift,
        IssueKind::NullExplosion,
        IssueKind::DuplicateRows,
        IssueKind::Outlier,
        IssueKind::BusinessRule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::SchemaDrift => "schema_drift",
            IssueKind::NullExplosion => "null_explosion",
            IssueKind::DuplicateRows => "duplicate_rows",
            IssueKind::Outlier => "outlier",
            IssueKind::BusinessRule => "business_rule",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            IssueKind::SchemaDrift => "Schema drift",
            IssueKind::NullExplosion => "Null values",
            IssueKind::DuplicateRows => "Duplicate rows",
            IssueKind::Outlier => "Outliers",
            IssueKind::BusinessRule => "Business rules",
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One offending cell, rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedValue {
    pub row: usize,
    pub value: String,
    /// Distance beyond the violated bound, for numeric findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub columns: Vec<String>,
    pub rows: Vec<usize>,
    pub severity: Severity,
    pub description: String,
    /// Null ratio, duplicate count, outlier count or violation count.
    pub metric: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flagged: Vec<FlaggedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl Issue {
    pub fn new(kind: IssueKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            columns: Vec::new(),
            rows: Vec::new(),
            severity,
            description: description.into(),
            metric: 0.0,
            flagged: Vec::new(),
            rule: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn with_rows(mut self, rows: Vec<usize>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_flagged(mut self, flagged: Vec<FlaggedValue>) -> Self {
        self.flagged = flagged;
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// First affected column, used for ordering and targeting.
    pub fn column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    pub fn is_at_least(&self, threshold: Severity) -> bool {
        self.severity >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_kind_order_matches_taxonomy() {
        let mut kinds = IssueKind::ALL.to_vec();
        kinds.reverse();
        kinds.sort();
        assert_eq!(kinds, IssueKind::ALL.to_vec());
        assert!(IssueKind::SchemaDrift < IssueKind::BusinessRule);
    }

    #[test]
    fn test_issue_builder() {
        let issue = Issue::new(IssueKind::Outlier, Severity::Warning, "1 outlier")
            .with_column("sales")
            .with_rows(vec![6])
            .with_metric(1.0);
        assert_eq!(issue.column(), Some("sales"));
        assert_eq!(issue.rows, vec![6]);
        assert!(issue.is_at_least(Severity::Warning));
        assert!(!issue.is_at_least(Severity::Error));
    }

    #[test]
    fn test_severity_serde_lowercase() {
        let s: Severity = serde_yaml::from_str("critical").unwrap();
        assert_eq!(s, Severity::Critical);
        assert_eq!(serde_json::to_string(&Severity::Info).unwrap(), "\"info\"");
    }
}
