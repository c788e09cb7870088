use regex::Regex;

use crate::dataset::{Dataset, Value};
use crate::error::{Result, SurgeonError};
use crate::policy::{RuleCheck, RuleDef};
use super::issue::{FlaggedValue, Issue, IssueKind};
use super::whitelist::Whitelist;

#[derive(Debug, Clone, PartialEq)]
pub struct RuleViolation {
    pub row: usize,
    pub value: Value,
    pub deviation: Option<f64>,
}

/// Rows of `dataset` that break `rule`, skipping whitelisted values.
/// Nulls only violate `not_null`.
pub fn violations(dataset: &Dataset, rule: &RuleDef, whitelist: &Whitelist) -> Result<Vec<RuleViolation>> {
    let column = dataset.require_column(&rule.column, "business rule check")?;

    let pattern = match &rule.check {
        RuleCheck::Pattern { regex } => Some(Regex::new(regex).map_err(|e| {
            SurgeonError::InvalidParams(format!("rule '{}': invalid regex: {}", rule.name, e))
        })?),
        _ => None,
    };

    let mut found = Vec::new();
    for (row, value) in column.values().iter().enumerate() {
        let deviation = match (&rule.check, value) {
            (RuleCheck::NotNull, Value::Null) => Some(None),
            (_, Value::Null) | (RuleCheck::NotNull, _) => None,
            (RuleCheck::Range { min, max }, v) => match v.as_f64() {
                Some(x) => range_deviation(x, *min, *max).map(Some),
                None => Some(None),
            },
            (RuleCheck::AllowedValues { values }, v) => {
                let rendered = v.to_string();
                if values.iter().any(|allowed| *allowed == rendered) {
                    None
                } else {
                    Some(None)
                }
            }
            (RuleCheck::Pattern { .. }, v) => match &pattern {
                Some(re) if !re.is_match(&v.to_string()) => Some(None),
                _ => None,
            },
        };

        if let Some(deviation) = deviation {
            if !whitelist.matches(&rule.column, value) {
                found.push(RuleViolation {
                    row,
                    value: value.clone(),
                    deviation,
                });
            }
        }
    }

    Ok(found)
}

fn range_deviation(x: f64, min: Option<f64>, max: Option<f64>) -> Option<f64> {
    match (min, max) {
        (Some(lo), _) if x < lo => Some(lo - x),
        (_, Some(hi)) if x > hi => Some(x - hi),
        _ => None,
    }
}

pub fn describe_check(check: &RuleCheck) -> String {
    match check {
        RuleCheck::Range { min: Some(lo), max: Some(hi) } => format!("between {} and {}", lo, hi),
        RuleCheck::Range { min: Some(lo), max: None } => format!(">= {}", lo),
        RuleCheck::Range { min: None, max: Some(hi) } => format!("<= {}", hi),
        RuleCheck::Range { .. } => "numeric".to_string(),
        RuleCheck::AllowedValues { values } => format!("one of [{}]", values.join(", ")),
        RuleCheck::Pattern { regex } => format!("matching /{}/", regex),
        RuleCheck::NotNull => "not null".to_string(),
    }
}

/// One issue per violated rule, or `None` when every row passes.
pub fn rule_issue(rule: &RuleDef, found: Vec<RuleViolation>) -> Option<Issue> {
    if found.is_empty() {
        return None;
    }

    let description = match &rule.description {
        Some(d) => format!("{} ({} row(s))", d, found.len()),
        None => format!(
            "{} value(s) in '{}' break rule '{}' (must be {})",
            found.len(),
            rule.column,
            rule.name,
            describe_check(&rule.check)
        ),
    };

    let rows = found.iter().map(|v| v.row).collect();
    let flagged = found
        .into_iter()
        .map(|v| FlaggedValue {
            row: v.row,
            value: v.value.to_string(),
            deviation: v.deviation,
        })
        .collect::<Vec<_>>();

    Some(
        Issue::new(IssueKind::BusinessRule, rule.severity, description)
            .with_column(&rule.column)
            .with_rows(rows)
            .with_metric(flagged.len() as f64)
            .with_flagged(flagged)
            .with_rule(&rule.name),
    )
}
