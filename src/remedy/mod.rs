mod apply;
mod catalog;
mod changeset;
mod composite;
mod params;
mod preview;
mod strategy;

pub use apply::{apply, Applied};
pub use catalog::{
    default_for, list_strategies, strategies_for, strategies_for_issue, IssueStrategies,
    KindStrategies, StrategyMenu,
};
pub use changeset::{CellChange, ChangeSet};
pub use composite::{auto_pilot, plan, PlanStep};
pub use params::StrategyParams;
pub use preview::{Preview, SampleRow, SampleTable};
pub use strategy::{StrategyId, Target};

use crate::dataset::Dataset;
use crate::detect::ScanContext;
use crate::error::Result;

/// Compute a preview of `strategy` on `dataset`. Nothing is modified.
pub fn propose(
    strategy: StrategyId,
    dataset: &Dataset,
    params: StrategyParams,
    ctx: &ScanContext<'_>,
    generation: u64,
    sample_rows: usize,
) -> Result<Preview> {
    let applied = apply(strategy, dataset, &params, ctx)?;
    Preview::new(strategy, params, dataset, applied, generation, sample_rows)
}
