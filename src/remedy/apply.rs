use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::dataset::{Column, DataType, Dataset, Value};
use crate::detect::rules::violations;
use crate::detect::stats::{self, fit_outlier_bounds, OutlierBounds, OutlierFit};
use crate::detect::{duplicate_groups, ScanContext};
use crate::error::{Result, SurgeonError};
use crate::policy::RuleCheck;
use super::composite;
use super::params::StrategyParams;
use super::strategy::StrategyId;

/// A strategy's output: the new dataset plus, for every new row, the index
/// of the row it came from.
#[derive(Debug, Clone)]
pub struct Applied {
    pub dataset: Dataset,
    pub origin: Vec<usize>,
    /// Sub-steps of a composite strategy.
    pub steps: Vec<String>,
}

impl Applied {
    fn same_rows(dataset: Dataset) -> Self {
        let origin = (0..dataset.row_count()).collect();
        Self {
            dataset,
            origin,
            steps: Vec::new(),
        }
    }

    fn keep_rows(dataset: &Dataset, keep: Vec<usize>) -> Self {
        Self {
            dataset: dataset.select_rows(&keep),
            origin: keep,
            steps: Vec::new(),
        }
    }
}

/// Run `strategy` against `dataset` without touching it.
pub fn apply(
    strategy: StrategyId,
    dataset: &Dataset,
    params: &StrategyParams,
    ctx: &ScanContext<'_>,
) -> Result<Applied> {
    params.validate_for(strategy, ctx.policy)?;

    match strategy {
        StrategyId::FillMean => {
            let column = numeric_column(dataset, params.require_column(strategy)?, strategy)?;
            let values = non_null_numbers(column);
            let mean = stats::mean(&values).ok_or_else(|| no_statistic(column, "mean"))?;
            fill_nulls(dataset, column, Value::number(mean))
        }
        StrategyId::FillMedian => {
            let column = numeric_column(dataset, params.require_column(strategy)?, strategy)?;
            let values = non_null_numbers(column);
            let median = stats::median(&values).ok_or_else(|| no_statistic(column, "median"))?;
            fill_nulls(dataset, column, Value::number(median))
        }
        StrategyId::FillMode => {
            let column = dataset.require_column(params.require_column(strategy)?, "fill-mode")?;
            let fill = mode(column.values().iter()).ok_or_else(|| no_statistic(column, "mode"))?;
            fill_nulls(dataset, column, fill)
        }
        StrategyId::FillZero => {
            let column = numeric_column(dataset, params.require_column(strategy)?, strategy)?;
            fill_nulls(dataset, column, Value::Int(0))
        }
        StrategyId::FillValue => {
            let column = dataset.require_column(params.require_column(strategy)?, "fill-value")?;
            let fill = Value::parse_literal(params.require_value(strategy)?);
            fill_nulls(dataset, column, fill)
        }
        StrategyId::DropNullRows => {
            let keep: Vec<usize> = match params.column.as_deref() {
                Some(name) => {
                    let column = dataset.require_column(name, "drop-null-rows")?;
                    (0..dataset.row_count())
                        .filter(|&r| column.get(r).map(|v| !v.is_null()).unwrap_or(false))
                        .collect()
                }
                None => (0..dataset.row_count())
                    .filter(|&r| {
                        dataset
                            .row(r)
                            .map(|row| row.iter().all(|v| !v.is_null()))
                            .unwrap_or(false)
                    })
                    .collect(),
            };
            Ok(Applied::keep_rows(dataset, keep))
        }
        StrategyId::CapOutliers => {
            let column = numeric_column(dataset, params.require_column(strategy)?, strategy)?;
            let Some(bounds) = outlier_bounds(column, ctx) else {
                return Ok(Applied::same_rows(dataset.clone()));
            };
            let rows = outlier_rows(column, &bounds, ctx);
            map_rows(dataset, column, &rows, |v| {
                v.as_f64().map(|x| Value::number(bounds.clamp(x))).unwrap_or_else(|| v.clone())
            })
        }
        StrategyId::RemoveOutlierRows => {
            let column = numeric_column(dataset, params.require_column(strategy)?, strategy)?;
            let Some(bounds) = outlier_bounds(column, ctx) else {
                return Ok(Applied::same_rows(dataset.clone()));
            };
            let drop = outlier_rows(column, &bounds, ctx);
            Ok(Applied::keep_rows(dataset, rows_except(dataset, &drop)))
        }
        StrategyId::ReplaceOutliersMedian => {
            let column = numeric_column(dataset, params.require_column(strategy)?, strategy)?;
            let Some(bounds) = outlier_bounds(column, ctx) else {
                return Ok(Applied::same_rows(dataset.clone()));
            };
            let median = stats::median(&non_null_numbers(column))
                .ok_or_else(|| no_statistic(column, "median"))?;
            let rows = outlier_rows(column, &bounds, ctx);
            map_rows(dataset, column, &rows, |_| Value::number(median))
        }
        StrategyId::DropDuplicates => {
            let drop: HashSet<usize> = duplicate_groups(dataset)
                .into_iter()
                .flat_map(|(_, dups)| dups)
                .collect();
            Ok(Applied::keep_rows(dataset, rows_except(dataset, &drop)))
        }
        StrategyId::ClampToRange => {
            let rule = params.require_rule(strategy, ctx.policy)?;
            let (min, max) = match rule.check {
                RuleCheck::Range { min, max } => (min, max),
                _ => {
                    return Err(SurgeonError::InvalidParams(format!(
                        "clamp-to-range needs a range rule, '{}' is {}",
                        rule.name,
                        rule.check.kind()
                    )))
                }
            };
            let column = dataset.require_column(&rule.column, "clamp-to-range")?;
            let rows = violation_rows(dataset, rule, ctx)?;
            let lo = min.unwrap_or(f64::NEG_INFINITY);
            let hi = max.unwrap_or(f64::INFINITY);
            map_rows(dataset, column, &rows, |v| {
                v.as_f64().map(|x| Value::number(stats::clamp_between(x, lo, hi))).unwrap_or_else(|| v.clone())
            })
        }
        StrategyId::MakeAbsolute => {
            let name = match (&params.column, &params.rule) {
                (Some(c), _) => c.clone(),
                (None, Some(_)) => params.require_rule(strategy, ctx.policy)?.column.clone(),
                (None, None) => {
                    return Err(SurgeonError::InvalidParams(
                        "make-absolute needs a column or a rule".to_string(),
                    ))
                }
            };
            let column = numeric_column(dataset, &name, strategy)?;
            let rows: HashSet<usize> = column
                .values()
                .iter()
                .enumerate()
                .filter(|(_, v)| v.as_f64().map(|x| x < 0.0).unwrap_or(false))
                .filter(|(_, v)| !ctx.whitelist.matches(column.name(), v))
                .map(|(r, _)| r)
                .collect();
            map_rows(dataset, column, &rows, |v| match v {
                Value::Int(i) => Value::Int(i.saturating_abs()),
                Value::Float(f) => Value::Float(f.abs()),
                other => other.clone(),
            })
        }
        StrategyId::ReplaceWithMode => {
            let rule = params.require_rule(strategy, ctx.policy)?;
            let column = dataset.require_column(&rule.column, "replace-with-mode")?;
            let rows = violation_rows(dataset, rule, ctx)?;
            let valid = column
                .values()
                .iter()
                .enumerate()
                .filter(|(r, _)| !rows.contains(r))
                .map(|(_, v)| v);
            let fill = mode(valid).ok_or_else(|| no_statistic(column, "mode"))?;
            map_rows(dataset, column, &rows, |_| fill.clone())
        }
        StrategyId::ReplaceWithValue => {
            let rule = params.require_rule(strategy, ctx.policy)?;
            let column = dataset.require_column(&rule.column, "replace-with-value")?;
            let rows = violation_rows(dataset, rule, ctx)?;
            let fill = Value::parse_literal(params.require_value(strategy)?);
            map_rows(dataset, column, &rows, |_| fill.clone())
        }
        StrategyId::RemoveViolatingRows => {
            let rule = params.require_rule(strategy, ctx.policy)?;
            let drop = violation_rows(dataset, rule, ctx)?;
            Ok(Applied::keep_rows(dataset, rows_except(dataset, &drop)))
        }
        StrategyId::DropExtraColumns => {
            let baseline = ctx.baseline.ok_or_else(|| {
                SurgeonError::InvalidParams(
                    "drop-extra-columns needs a schema baseline; run an audit first".to_string(),
                )
            })?;
            let extra: Vec<String> = dataset
                .column_names()
                .into_iter()
                .filter(|name| !baseline.contains(name))
                .collect();
            Ok(Applied::same_rows(dataset.drop_columns(&extra)))
        }
        StrategyId::AutoPilot => composite::auto_pilot(dataset, ctx),
    }
}

fn no_statistic(column: &Column, statistic: &'static str) -> SurgeonError {
    SurgeonError::NoStatisticAvailable {
        column: column.name().to_string(),
        statistic,
    }
}

/// A column that holds numbers, or only nulls (so the statistic is what
/// fails, not the type check).
fn numeric_column<'d>(dataset: &'d Dataset, name: &str, strategy: StrategyId) -> Result<&'d Column> {
    let column = dataset.require_column(name, strategy.as_str())?;
    if column.is_numeric() || column.dtype() == DataType::Null {
        Ok(column)
    } else {
        Err(SurgeonError::InvalidParams(format!(
            "{} needs a numeric column, '{}' is {}",
            strategy,
            name,
            column.dtype()
        )))
    }
}

fn non_null_numbers(column: &Column) -> Vec<f64> {
    column.numeric_values().into_iter().map(|(_, v)| v).collect()
}

/// Most frequent non-null value; ties go to the value seen first.
pub(crate) fn mode<'v>(values: impl Iterator<Item = &'v Value>) -> Option<Value> {
    let mut counts: HashMap<&Value, (usize, usize)> = HashMap::new();
    for (i, value) in values.enumerate() {
        if value.is_null() {
            continue;
        }
        counts.entry(value).or_insert((0, i)).0 += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, (count, first))| (*count, Reverse(*first)))
        .map(|(value, _)| value.clone())
}

fn fill_nulls(dataset: &Dataset, column: &Column, fill: Value) -> Result<Applied> {
    let rows: HashSet<usize> = column.null_rows().into_iter().collect();
    map_rows(dataset, column, &rows, |_| fill.clone())
}

fn map_rows(
    dataset: &Dataset,
    column: &Column,
    rows: &HashSet<usize>,
    f: impl Fn(&Value) -> Value,
) -> Result<Applied> {
    if rows.is_empty() {
        return Ok(Applied::same_rows(dataset.clone()));
    }
    let values = column
        .values()
        .iter()
        .enumerate()
        .map(|(r, v)| if rows.contains(&r) { f(v) } else { v.clone() })
        .collect();
    Ok(Applied::same_rows(dataset.replace_column(column.with_values(values))?))
}

fn rows_except(dataset: &Dataset, drop: &HashSet<usize>) -> Vec<usize> {
    (0..dataset.row_count()).filter(|r| !drop.contains(r)).collect()
}

fn outlier_bounds(column: &Column, ctx: &ScanContext<'_>) -> Option<OutlierBounds> {
    match fit_outlier_bounds(column, &ctx.policy.outliers) {
        OutlierFit::Bounds(b) => Some(b),
        OutlierFit::Constant | OutlierFit::TooFewValues(_) => None,
    }
}

fn outlier_rows(column: &Column, bounds: &OutlierBounds, ctx: &ScanContext<'_>) -> HashSet<usize> {
    column
        .values()
        .iter()
        .enumerate()
        .filter(|(_, v)| v.as_f64().map(|x| !bounds.contains(x)).unwrap_or(false))
        .filter(|(_, v)| !ctx.whitelist.matches(column.name(), v))
        .map(|(r, _)| r)
        .collect()
}

fn violation_rows(
    dataset: &Dataset,
    rule: &crate::policy::RuleDef,
    ctx: &ScanContext<'_>,
) -> Result<HashSet<usize>> {
    Ok(violations(dataset, rule, ctx.whitelist)?
        .into_iter()
        .map(|v| v.row)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Severity, Whitelist, WhitelistEntry};
    use crate::policy::{AuditPolicy, RuleDef};

    fn column_dataset(name: &str, values: Vec<Value>) -> Dataset {
        Dataset::from_rows(&[name], values.into_iter().map(|v| vec![v]).collect()).unwrap()
    }

    fn run(strategy: StrategyId, ds: &Dataset, params: StrategyParams, policy: &AuditPolicy) -> Result<Applied> {
        let wl = Whitelist::new();
        let ctx = ScanContext { policy, whitelist: &wl, baseline: None };
        apply(strategy, ds, &params, &ctx)
    }

    #[test]
    fn test_fill_mean() {
        let ds = column_dataset("x", vec![Value::Int(1), Value::Null, Value::Int(3)]);
        let out = run(StrategyId::FillMean, &ds, StrategyParams::column("x"), &AuditPolicy::default()).unwrap();
        let filled = out.dataset.column("x").unwrap().get(1).unwrap().as_f64();
        assert_eq!(filled, Some(2.0));
        assert_eq!(out.origin, vec![0, 1, 2]);
    }

    #[test]
    fn test_fill_mean_all_null() {
        let ds = column_dataset("x", vec![Value::Null, Value::Null]);
        let err = run(StrategyId::FillMean, &ds, StrategyParams::column("x"), &AuditPolicy::default())
            .unwrap_err();
        assert!(matches!(err, SurgeonError::NoStatisticAvailable { ref column, .. } if column == "x"));
    }

    #[test]
    fn test_fill_mean_rejects_text() {
        let ds = column_dataset("x", vec![Value::text("a"), Value::Null]);
        let err = run(StrategyId::FillMean, &ds, StrategyParams::column("x"), &AuditPolicy::default())
            .unwrap_err();
        assert!(matches!(err, SurgeonError::InvalidParams(_)));
    }

    #[test]
    fn test_fill_mode_first_occurrence_wins_ties() {
        let ds = column_dataset(
            "x",
            vec![Value::text("b"), Value::text("a"), Value::text("a"), Value::text("b"), Value::Null],
        );
        let out = run(StrategyId::FillMode, &ds, StrategyParams::column("x"), &AuditPolicy::default()).unwrap();
        assert_eq!(out.dataset.column("x").unwrap().get(4), Some(&Value::text("b")));
    }

    #[test]
    fn test_cap_outliers_preserves_rows() {
        let ds = column_dataset("x", [1, 2, 2, 3, 4, 5, 100].iter().map(|v| Value::Int(*v)).collect());
        let out = run(StrategyId::CapOutliers, &ds, StrategyParams::column("x"), &AuditPolicy::default()).unwrap();
        assert_eq!(out.dataset.row_count(), 7);
        assert_eq!(out.dataset.column("x").unwrap().get(6).unwrap().as_f64(), Some(9.5));
        assert_eq!(out.dataset.column("x").unwrap().get(0).unwrap().as_f64(), Some(1.0));
    }

    #[test]
    fn test_remove_outlier_rows() {
        let ds = column_dataset("x", [1, 2, 2, 3, 4, 5, 100].iter().map(|v| Value::Int(*v)).collect());
        let out = run(StrategyId::RemoveOutlierRows, &ds, StrategyParams::column("x"), &AuditPolicy::default())
            .unwrap();
        assert_eq!(out.origin, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cap_respects_whitelist() {
        let ds = column_dataset("x", [1, 2, 2, 3, 4, 5, 100].iter().map(|v| Value::Int(*v)).collect());
        let policy = AuditPolicy::default();
        let mut wl = Whitelist::new();
        wl.add(WhitelistEntry::value("x", "100"));
        let ctx = ScanContext { policy: &policy, whitelist: &wl, baseline: None };
        let out = apply(StrategyId::CapOutliers, &ds, &StrategyParams::column("x"), &ctx).unwrap();
        assert_eq!(out.dataset, ds);
    }

    #[test]
    fn test_drop_duplicates_keeps_first() {
        let ds = Dataset::from_rows(
            &["k", "v"],
            vec![
                vec![Value::text("A"), Value::Int(1)],
                vec![Value::text("A"), Value::Int(1)],
                vec![Value::text("B"), Value::Int(2)],
            ],
        )
        .unwrap();
        let out = run(StrategyId::DropDuplicates, &ds, StrategyParams::new(), &AuditPolicy::default()).unwrap();
        assert_eq!(out.dataset.row_count(), 2);
        assert_eq!(out.origin, vec![0, 2]);
        assert_eq!(out.dataset.row(1).unwrap()[0], &Value::text("B"));
    }

    fn range_policy() -> AuditPolicy {
        let mut policy = AuditPolicy::default();
        policy.rules.push(RuleDef {
            name: "non_negative".to_string(),
            column: "x".to_string(),
            description: None,
            severity: Severity::Error,
            check: RuleCheck::Range { min: Some(0.0), max: Some(50.0) },
        });
        policy
    }

    #[test]
    fn test_clamp_to_range() {
        let ds = column_dataset("x", vec![Value::Int(-5), Value::Int(10), Value::Int(80)]);
        let out = run(StrategyId::ClampToRange, &ds, StrategyParams::rule("non_negative"), &range_policy())
            .unwrap();
        let col = out.dataset.column("x").unwrap();
        assert_eq!(col.values(), &[Value::Int(0), Value::Int(10), Value::Int(50)]);
    }

    #[test]
    fn test_make_absolute() {
        let ds = column_dataset("x", vec![Value::Int(-5), Value::Int(10)]);
        let out = run(StrategyId::MakeAbsolute, &ds, StrategyParams::rule("non_negative"), &range_policy())
            .unwrap();
        assert_eq!(out.dataset.column("x").unwrap().get(0), Some(&Value::Int(5)));
    }

    #[test]
    fn test_remove_violating_rows() {
        let ds = column_dataset("x", vec![Value::Int(-5), Value::Int(10), Value::Int(80)]);
        let out = run(StrategyId::RemoveViolatingRows, &ds, StrategyParams::rule("non_negative"), &range_policy())
            .unwrap();
        assert_eq!(out.origin, vec![1]);
    }

    #[test]
    fn test_inverted_range_clamps_without_panic() {
        let mut policy = AuditPolicy::default();
        policy.rules.push(RuleDef {
            name: "backwards".to_string(),
            column: "x".to_string(),
            description: None,
            severity: Severity::Error,
            check: RuleCheck::Range { min: Some(10.0), max: Some(0.0) },
        });
        let ds = column_dataset("x", vec![Value::Int(5)]);
        let out = run(StrategyId::ClampToRange, &ds, StrategyParams::rule("backwards"), &policy).unwrap();
        assert_eq!(out.dataset.column("x").unwrap().get(0), Some(&Value::Int(0)));
    }

    #[test]
    fn test_nan_multiplier_caps_without_panic() {
        let mut policy = AuditPolicy::default();
        policy.outliers.multiplier = f64::NAN;
        let ds = column_dataset(
            "x",
            [1, 2, 2, 3, 4, 5, 100].iter().map(|v| Value::Int(*v)).collect(),
        );
        let out = run(StrategyId::CapOutliers, &ds, StrategyParams::column("x"), &policy).unwrap();
        assert_eq!(out.dataset.row_count(), 7);
    }

    #[test]
    fn test_clamp_needs_range_rule() {
        let mut policy = AuditPolicy::default();
        policy.rules.push(RuleDef {
            name: "present".to_string(),
            column: "x".to_string(),
            description: None,
            severity: Severity::Error,
            check: RuleCheck::NotNull,
        });
        let ds = column_dataset("x", vec![Value::Int(1)]);
        let err = run(StrategyId::ClampToRange, &ds, StrategyParams::rule("present"), &policy).unwrap_err();
        assert!(err.to_string().contains("range rule"));
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let ds = column_dataset("x", vec![Value::Int(1)]);
        let err = run(StrategyId::FillMedian, &ds, StrategyParams::column("y"), &AuditPolicy::default())
            .unwrap_err();
        assert!(matches!(err, SurgeonError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_drop_extra_columns_needs_baseline() {
        let ds = column_dataset("x", vec![Value::Int(1)]);
        let err = run(StrategyId::DropExtraColumns, &ds, StrategyParams::new(), &AuditPolicy::default())
            .unwrap_err();
        assert!(matches!(err, SurgeonError::InvalidParams(_)));
    }

    #[test]
    fn test_input_is_untouched() {
        let ds = column_dataset("x", vec![Value::Int(1), Value::Null, Value::Int(3)]);
        let before = ds.clone();
        let _ = run(StrategyId::FillMean, &ds, StrategyParams::column("x"), &AuditPolicy::default()).unwrap();
        assert_eq!(ds, before);
    }
}
