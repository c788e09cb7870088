use serde::Serialize;

use crate::dataset::Dataset;
use crate::detect::{Issue, IssueKind};
use crate::policy::{AuditPolicy, RuleCheck};
use crate::report::AuditReport;
use super::params::StrategyParams;
use super::strategy::StrategyId;

const SCHEMA: &[StrategyId] = &[StrategyId::DropExtraColumns];

const NULLS_NUMERIC: &[StrategyId] = &[
    StrategyId::FillMedian,
    StrategyId::FillMean,
    StrategyId::FillMode,
    StrategyId::FillZero,
    StrategyId::FillValue,
    StrategyId::DropNullRows,
];

const NULLS_OTHER: &[StrategyId] = &[
    StrategyId::FillMode,
    StrategyId::FillValue,
    StrategyId::DropNullRows,
];

const DUPLICATES: &[StrategyId] = &[StrategyId::DropDuplicates];

const OUTLIERS: &[StrategyId] = &[
    StrategyId::CapOutliers,
    StrategyId::RemoveOutlierRows,
    StrategyId::ReplaceOutliersMedian,
];

const RULES_ALL: &[StrategyId] = &[
    StrategyId::ClampToRange,
    StrategyId::MakeAbsolute,
    StrategyId::ReplaceWithMode,
    StrategyId::ReplaceWithValue,
    StrategyId::RemoveViolatingRows,
];

const RULES_RANGE: &[StrategyId] = &[
    StrategyId::ClampToRange,
    StrategyId::MakeAbsolute,
    StrategyId::RemoveViolatingRows,
];

const RULES_ALLOWED: &[StrategyId] = &[
    StrategyId::ReplaceWithMode,
    StrategyId::ReplaceWithValue,
    StrategyId::RemoveViolatingRows,
];

const RULES_OTHER: &[StrategyId] = &[
    StrategyId::RemoveViolatingRows,
    StrategyId::ReplaceWithValue,
];

/// Every strategy that can address `kind`, most preferred first.
pub fn strategies_for(kind: IssueKind) -> &'static [StrategyId] {
    match kind {
        IssueKind::SchemaDrift => SCHEMA,
        IssueKind::NullExplosion => NULLS_NUMERIC,
        IssueKind::DuplicateRows => DUPLICATES,
        IssueKind::Outlier => OUTLIERS,
        IssueKind::BusinessRule => RULES_ALL,
    }
}

/// Strategies that fit this particular issue: null fills depend on the
/// column type, rule fixes on the rule's check.
pub fn strategies_for_issue(issue: &Issue, dataset: &Dataset, policy: &AuditPolicy) -> &'static [StrategyId] {
    match issue.kind {
        IssueKind::NullExplosion => {
            let numeric = issue
                .column()
                .and_then(|c| dataset.column(c))
                .map(|c| c.is_numeric())
                .unwrap_or(false);
            if numeric {
                NULLS_NUMERIC
            } else {
                NULLS_OTHER
            }
        }
        IssueKind::BusinessRule => match issue.rule.as_deref().and_then(|r| policy.rule(r)) {
            Some(rule) => match rule.check {
                RuleCheck::Range { .. } => RULES_RANGE,
                RuleCheck::AllowedValues { .. } => RULES_ALLOWED,
                RuleCheck::Pattern { .. } | RuleCheck::NotNull => RULES_OTHER,
            },
            None => RULES_OTHER,
        },
        kind => strategies_for(kind),
    }
}

/// The fix auto-pilot applies for `issue`, with its params. Schema drift,
/// pattern and not-null rules have no default: auto-pilot never drops
/// columns or invents values for them.
pub fn default_for(issue: &Issue, dataset: &Dataset, policy: &AuditPolicy) -> Option<(StrategyId, StrategyParams)> {
    match issue.kind {
        IssueKind::SchemaDrift => None,
        IssueKind::DuplicateRows => Some((StrategyId::DropDuplicates, StrategyParams::new())),
        IssueKind::NullExplosion | IssueKind::Outlier => {
            let column = issue.column()?;
            let strategy = *strategies_for_issue(issue, dataset, policy).first()?;
            Some((strategy, StrategyParams::column(column)))
        }
        IssueKind::BusinessRule => {
            let rule = policy.rule(issue.rule.as_deref()?)?;
            let strategy = match rule.check {
                RuleCheck::Range { .. } => StrategyId::ClampToRange,
                RuleCheck::AllowedValues { .. } => StrategyId::ReplaceWithMode,
                RuleCheck::Pattern { .. } | RuleCheck::NotNull => return None,
            };
            Some((strategy, StrategyParams::rule(&rule.name)))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindStrategies {
    pub kind: IssueKind,
    pub strategies: Vec<StrategyId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueStrategies {
    /// 1-based position of the issue in the report.
    pub issue: usize,
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub strategies: Vec<StrategyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<StrategyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_params: Option<StrategyParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyMenu {
    pub by_kind: Vec<KindStrategies>,
    pub by_issue: Vec<IssueStrategies>,
    /// Auto-pilot has at least one step to run.
    pub auto_pilot: bool,
}

pub fn list_strategies(report: &AuditReport, dataset: &Dataset, policy: &AuditPolicy) -> StrategyMenu {
    let by_kind = report
        .by_kind
        .iter()
        .map(|k| KindStrategies {
            kind: k.kind,
            strategies: strategies_for(k.kind).to_vec(),
        })
        .collect();

    let by_issue: Vec<IssueStrategies> = report
        .issues
        .iter()
        .enumerate()
        .map(|(i, issue)| {
            let default = default_for(issue, dataset, policy);
            IssueStrategies {
                issue: i + 1,
                kind: issue.kind,
                column: issue.column().map(str::to_string),
                rule: issue.rule.clone(),
                strategies: strategies_for_issue(issue, dataset, policy).to_vec(),
                default: default.as_ref().map(|(s, _)| *s),
                default_params: default.map(|(_, p)| p),
            }
        })
        .collect();

    let auto_pilot = by_issue.iter().any(|i| i.default.is_some());

    StrategyMenu {
        by_kind,
        by_issue,
        auto_pilot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;
    use crate::detect::Severity;
    use crate::policy::RuleDef;

    fn dataset() -> Dataset {
        Dataset::from_rows(
            &["sales", "region"],
            vec![
                vec![Value::Int(1), Value::text("North")],
                vec![Value::Null, Value::Null],
            ],
        )
        .unwrap()
    }

    fn null_issue(column: &str) -> Issue {
        Issue::new(IssueKind::NullExplosion, Severity::Error, "nulls").with_column(column)
    }

    #[test]
    fn test_numeric_nulls_default_to_median() {
        let policy = AuditPolicy::default();
        let (strategy, params) = default_for(&null_issue("sales"), &dataset(), &policy).unwrap();
        assert_eq!(strategy, StrategyId::FillMedian);
        assert_eq!(params.column.as_deref(), Some("sales"));
    }

    #[test]
    fn test_text_nulls_default_to_mode() {
        let policy = AuditPolicy::default();
        let strategies = strategies_for_issue(&null_issue("region"), &dataset(), &policy);
        assert_eq!(strategies[0], StrategyId::FillMode);
        assert!(!strategies.contains(&StrategyId::FillMean));
    }

    #[test]
    fn test_schema_drift_has_no_default() {
        let issue = Issue::new(IssueKind::SchemaDrift, Severity::Warning, "added").with_column("x");
        assert!(default_for(&issue, &dataset(), &AuditPolicy::default()).is_none());
        assert_eq!(strategies_for(IssueKind::SchemaDrift), &[StrategyId::DropExtraColumns]);
    }

    #[test]
    fn test_rule_defaults_follow_check() {
        let mut policy = AuditPolicy::default();
        policy.rules.push(RuleDef {
            name: "non_negative".to_string(),
            column: "sales".to_string(),
            description: None,
            severity: Severity::Error,
            check: RuleCheck::Range { min: Some(0.0), max: None },
        });
        policy.rules.push(RuleDef {
            name: "present".to_string(),
            column: "sales".to_string(),
            description: None,
            severity: Severity::Error,
            check: RuleCheck::NotNull,
        });

        let range = Issue::new(IssueKind::BusinessRule, Severity::Error, "neg").with_rule("non_negative");
        let (strategy, params) = default_for(&range, &dataset(), &policy).unwrap();
        assert_eq!(strategy, StrategyId::ClampToRange);
        assert_eq!(params.rule.as_deref(), Some("non_negative"));

        let not_null = Issue::new(IssueKind::BusinessRule, Severity::Error, "null").with_rule("present");
        assert!(default_for(&not_null, &dataset(), &policy).is_none());
    }
}
