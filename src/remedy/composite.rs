use serde::Serialize;

use crate::dataset::Dataset;
use crate::detect::{scan_all, Issue, ScanContext};
use crate::error::Result;
use crate::report::build;
use super::apply::{apply, Applied};
use super::catalog::default_for;
use super::params::StrategyParams;
use super::strategy::StrategyId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    pub strategy: StrategyId,
    pub params: StrategyParams,
}

impl PlanStep {
    pub fn label(&self) -> String {
        let params = self.params.describe();
        if params.is_empty() {
            self.strategy.to_string()
        } else {
            format!("{} {}", self.strategy, params)
        }
    }
}

/// Default fixes for `issues`, in report order. Issues without a default
/// are listed as skipped.
pub fn plan(issues: &[Issue], dataset: &Dataset, ctx: &ScanContext<'_>) -> (Vec<PlanStep>, Vec<String>) {
    let mut steps: Vec<PlanStep> = Vec::new();
    let mut skipped = Vec::new();

    for issue in issues {
        match default_for(issue, dataset, ctx.policy) {
            Some((strategy, params)) => {
                let step = PlanStep { strategy, params };
                if !steps.contains(&step) {
                    steps.push(step);
                }
            }
            None => skipped.push(format!("skipped {}: {}", issue.kind, issue.description)),
        }
    }
    (steps, skipped)
}

/// Audit `dataset`, then apply every default fix in report order as one
/// compound change. Each step sees the previous step's output; a step that
/// cannot run is recorded and skipped rather than aborting the rest.
pub fn auto_pilot(dataset: &Dataset, ctx: &ScanContext<'_>) -> Result<Applied> {
    let findings = scan_all(dataset, ctx);
    let report = build(findings.issues, ctx.policy.fail_on);
    let (plan, skipped) = plan(&report.issues, dataset, ctx);

    let mut current = dataset.clone();
    let mut origin: Vec<usize> = (0..dataset.row_count()).collect();
    let mut steps = Vec::with_capacity(plan.len() + skipped.len());

    for step in &plan {
        match apply(step.strategy, &current, &step.params, ctx) {
            Ok(applied) => {
                origin = applied.origin.iter().map(|&i| origin[i]).collect();
                current = applied.dataset;
                steps.push(step.label());
            }
            Err(e) => steps.push(format!("skipped {}: {}", step.label(), e)),
        }
    }
    steps.extend(skipped);

    Ok(Applied {
        dataset: current,
        origin,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;
    use crate::detect::Whitelist;
    use crate::policy::AuditPolicy;

    #[test]
    fn test_auto_pilot_fixes_nulls_and_duplicates() {
        let ds = Dataset::from_rows(
            &["k", "v"],
            vec![
                vec![Value::text("A"), Value::Int(1)],
                vec![Value::text("A"), Value::Int(1)],
                vec![Value::text("B"), Value::Null],
                vec![Value::text("C"), Value::Int(3)],
            ],
        )
        .unwrap();
        let policy = AuditPolicy::default();
        let wl = Whitelist::new();
        let ctx = ScanContext { policy: &policy, whitelist: &wl, baseline: None };

        let out = auto_pilot(&ds, &ctx).unwrap();
        assert_eq!(out.dataset.row_count(), 3);
        assert_eq!(out.dataset.column("v").unwrap().null_count(), 0);
        assert_eq!(out.origin, vec![0, 2, 3]);
        assert!(out.steps.iter().any(|s| s.starts_with("fill-median column=v")));
        assert!(out.steps.iter().any(|s| s == "drop-duplicates"));
    }

    #[test]
    fn test_auto_pilot_on_clean_data_changes_nothing() {
        let ds = Dataset::from_rows(&["k"], vec![vec![Value::text("A")], vec![Value::text("B")]]).unwrap();
        let policy = AuditPolicy::default();
        let wl = Whitelist::new();
        let ctx = ScanContext { policy: &policy, whitelist: &wl, baseline: None };
        let out = auto_pilot(&ds, &ctx).unwrap();
        assert_eq!(out.dataset, ds);
        assert!(out.steps.is_empty());
    }
}
