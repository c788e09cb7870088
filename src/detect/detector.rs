use std::collections::HashMap;
use serde::Serialize;

use crate::dataset::{Dataset, SemanticType, Value};
use crate::policy::AuditPolicy;
use super::baseline::SchemaBaseline;
use super::issue::{FlaggedValue, Issue, IssueKind, Severity};
use super::rules::{rule_issue, violations};
use super::stats::{fit_outlier_bounds, OutlierFit};
use super::whitelist::Whitelist;

/// Maximum example row indices quoted in a duplicate description.
const DUPLICATE_EXAMPLES: usize = 5;

/// Everything a detector may consult besides the dataset itself.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    pub policy: &'a AuditPolicy,
    pub whitelist: &'a Whitelist,
    pub baseline: Option<&'a SchemaBaseline>,
}

/// Issues plus notes about checks that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Findings {
    pub issues: Vec<Issue>,
    pub notes: Vec<String>,
}

impl Findings {
    fn extend(&mut self, other: Findings) {
        self.issues.extend(other.issues);
        self.notes.extend(other.notes);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    SchemaDrift,
    NullExplosion,
    DuplicateRows,
    Outlier,
    BusinessRule,
}

impl Detector {
    pub const ALL: [Detector; 5] = [
        Detector::SchemaDrift,
        Detector::NullExplosion,
        Detector::DuplicateRows,
        Detector::Outlier,
        Detector::BusinessRule,
    ];

    pub fn kind(&self) -> IssueKind {
        match self {
            Detector::SchemaDrift => IssueKind::SchemaDrift,
            Detector::NullExplosion => IssueKind::NullExplosion,
            Detector::DuplicateRows => IssueKind::DuplicateRows,
            Detector::Outlier => IssueKind::Outlier,
            Detector::BusinessRule => IssueKind::BusinessRule,
        }
    }

    pub fn scan(&self, dataset: &Dataset, ctx: &ScanContext<'_>) -> Findings {
        match self {
            Detector::SchemaDrift => scan_schema(dataset, ctx),
            Detector::NullExplosion => scan_nulls(dataset, ctx),
            Detector::DuplicateRows => scan_duplicates(dataset),
            Detector::Outlier => scan_outliers(dataset, ctx),
            Detector::BusinessRule => scan_rules(dataset, ctx),
        }
    }
}

pub fn scan_all(dataset: &Dataset, ctx: &ScanContext<'_>) -> Findings {
    let mut findings = Findings::default();
    for detector in Detector::ALL {
        findings.extend(detector.scan(dataset, ctx));
    }
    findings
}

fn scan_schema(dataset: &Dataset, ctx: &ScanContext<'_>) -> Findings {
    let issues = match ctx.baseline {
        Some(baseline) => baseline
            .compare(dataset)
            .into_iter()
            .map(|change| change.into_issue())
            .collect(),
        None => Vec::new(),
    };
    Findings { issues, notes: Vec::new() }
}

fn scan_nulls(dataset: &Dataset, ctx: &ScanContext<'_>) -> Findings {
    let mut findings = Findings::default();
    let total = dataset.row_count();
    if total == 0 {
        return findings;
    }

    for column in dataset.columns() {
        if ctx.whitelist.matches(column.name(), &Value::Null) {
            continue;
        }
        let rows = column.null_rows();
        let ratio = rows.len() as f64 / total as f64;
        if let Some(severity) = ctx.policy.nulls.severity_for(ratio) {
            findings.issues.push(
                Issue::new(
                    IssueKind::NullExplosion,
                    severity,
                    format!(
                        "Column '{}' is {:.1}% null ({} of {} rows)",
                        column.name(),
                        ratio * 100.0,
                        rows.len(),
                        total
                    ),
                )
                .with_column(column.name())
                .with_rows(rows)
                .with_metric(ratio),
            );
        }
    }
    findings
}

/// Rows that repeat an earlier row exactly, grouped by their first
/// occurrence. The first row of each group is never listed.
pub fn duplicate_groups(dataset: &Dataset) -> Vec<(usize, Vec<usize>)> {
    let mut first_seen: HashMap<Vec<&Value>, usize> = HashMap::new();
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut group_index: HashMap<usize, usize> = HashMap::new();

    for row in 0..dataset.row_count() {
        let Some(values) = dataset.row(row) else {
            continue;
        };
        match first_seen.get(&values) {
            Some(&first) => {
                let slot = *group_index.entry(first).or_insert_with(|| {
                    groups.push((first, Vec::new()));
                    groups.len() - 1
                });
                groups[slot].1.push(row);
            }
            None => {
                first_seen.insert(values, row);
            }
        }
    }
    groups
}

fn scan_duplicates(dataset: &Dataset) -> Findings {
    let groups = duplicate_groups(dataset);
    if groups.is_empty() {
        return Findings::default();
    }

    let mut rows: Vec<usize> = groups.iter().flat_map(|(_, dups)| dups.iter().copied()).collect();
    rows.sort_unstable();

    let examples = rows
        .iter()
        .take(DUPLICATE_EXAMPLES)
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let issue = Issue::new(
        IssueKind::DuplicateRows,
        Severity::Warning,
        format!(
            "{} duplicate row(s) in {} group(s), e.g. rows {}",
            rows.len(),
            groups.len(),
            examples
        ),
    )
    .with_metric(rows.len() as f64)
    .with_rows(rows);

    Findings {
        issues: vec![issue],
        notes: Vec::new(),
    }
}

fn scan_outliers(dataset: &Dataset, ctx: &ScanContext<'_>) -> Findings {
    let mut findings = Findings::default();

    for column in dataset.columns() {
        if column.semantic_type() != SemanticType::Numeric {
            continue;
        }

        let bounds = match fit_outlier_bounds(column, &ctx.policy.outliers) {
            OutlierFit::Bounds(b) => b,
            OutlierFit::Constant => {
                findings.notes.push(format!(
                    "Column '{}': insufficient variance, outlier check skipped",
                    column.name()
                ));
                continue;
            }
            OutlierFit::TooFewValues(_) => continue,
        };

        let flagged: Vec<FlaggedValue> = column
            .values()
            .iter()
            .enumerate()
            .filter(|(_, v)| !ctx.whitelist.matches(column.name(), v))
            .filter_map(|(row, v)| {
                let deviation = bounds.deviation(v.as_f64()?)?;
                Some(FlaggedValue {
                    row,
                    value: v.to_string(),
                    deviation: Some(deviation),
                })
            })
            .collect();

        if flagged.is_empty() {
            continue;
        }

        findings.issues.push(
            Issue::new(
                IssueKind::Outlier,
                Severity::Warning,
                format!(
                    "{} value(s) in '{}' outside {}",
                    flagged.len(),
                    column.name(),
                    bounds.describe()
                ),
            )
            .with_column(column.name())
            .with_rows(flagged.iter().map(|f| f.row).collect())
            .with_metric(flagged.len() as f64)
            .with_flagged(flagged),
        );
    }
    findings
}

fn scan_rules(dataset: &Dataset, ctx: &ScanContext<'_>) -> Findings {
    let mut findings = Findings::default();

    for rule in &ctx.policy.rules {
        match violations(dataset, rule, ctx.whitelist) {
            Ok(found) => findings.issues.extend(rule_issue(rule, found)),
            Err(e) => findings
                .notes
                .push(format!("Rule '{}' skipped: {}", rule.name, e)),
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::WhitelistEntry;

    fn numbers(values: &[i64]) -> Dataset {
        Dataset::from_rows(&["sales"], values.iter().map(|v| vec![Value::Int(*v)]).collect()).unwrap()
    }

    fn ctx<'a>(policy: &'a AuditPolicy, whitelist: &'a Whitelist) -> ScanContext<'a> {
        ScanContext { policy, whitelist, baseline: None }
    }

    #[test]
    fn test_outlier_flags_only_beyond_bounds() {
        let ds = numbers(&[1, 2, 2, 3, 4, 5, 100]);
        let policy = AuditPolicy::default();
        let wl = Whitelist::new();
        let findings = Detector::Outlier.scan(&ds, &ctx(&policy, &wl));
        assert_eq!(findings.issues.len(), 1);
        let issue = &findings.issues[0];
        assert_eq!(issue.rows, vec![6]);
        assert_eq!(issue.flagged[0].deviation, Some(90.5));
    }

    #[test]
    fn test_whitelisted_outlier_suppressed() {
        let ds = numbers(&[1, 2, 2, 3, 4, 5, 100]);
        let policy = AuditPolicy::default();
        let mut wl = Whitelist::new();
        wl.add(WhitelistEntry::value("sales", "100"));
        let findings = Detector::Outlier.scan(&ds, &ctx(&policy, &wl));
        assert!(findings.issues.is_empty());
    }

    #[test]
    fn test_constant_column_gets_note() {
        let ds = numbers(&[3, 3, 3, 3, 3]);
        let policy = AuditPolicy::default();
        let wl = Whitelist::new();
        let findings = Detector::Outlier.scan(&ds, &ctx(&policy, &wl));
        assert!(findings.issues.is_empty());
        assert_eq!(findings.notes.len(), 1);
        assert!(findings.notes[0].contains("insufficient variance"));
    }

    #[test]
    fn test_identifier_columns_skip_outliers() {
        let ds = Dataset::from_rows(
            &["order_id"],
            [1, 2, 2, 3, 4, 5, 100].iter().map(|v| vec![Value::Int(*v)]).collect(),
        )
        .unwrap();
        let policy = AuditPolicy::default();
        let wl = Whitelist::new();
        assert!(Detector::Outlier.scan(&ds, &ctx(&policy, &wl)).issues.is_empty());
    }

    #[test]
    fn test_duplicate_groups() {
        let ds = Dataset::from_rows(
            &["k", "v"],
            vec![
                vec![Value::text("A"), Value::Int(1)],
                vec![Value::text("A"), Value::Int(1)],
                vec![Value::text("B"), Value::Int(2)],
                vec![Value::text("A"), Value::Int(1)],
            ],
        )
        .unwrap();
        assert_eq!(duplicate_groups(&ds), vec![(0, vec![1, 3])]);
        let findings = scan_duplicates(&ds);
        assert_eq!(findings.issues[0].metric, 2.0);
        assert!(findings.issues[0].description.contains("1 group(s)"));
    }

    #[test]
    fn test_null_severity() {
        let ds = Dataset::from_rows(
            &["a"],
            vec![vec![Value::Null], vec![Value::Null], vec![Value::Int(1)]],
        )
        .unwrap();
        let policy = AuditPolicy::default();
        let wl = Whitelist::new();
        let findings = Detector::NullExplosion.scan(&ds, &ctx(&policy, &wl));
        assert_eq!(findings.issues[0].severity, Severity::Critical);
        assert_eq!(findings.issues[0].rows, vec![0, 1]);
    }

    #[test]
    fn test_schema_detector_without_baseline_is_silent() {
        let ds = numbers(&[1]);
        let policy = AuditPolicy::default();
        let wl = Whitelist::new();
        assert!(Detector::SchemaDrift.scan(&ds, &ctx(&policy, &wl)).issues.is_empty());
    }
}
