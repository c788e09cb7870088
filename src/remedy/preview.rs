use std::sync::Arc;
use colored::Colorize;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::error::{Result, SurgeonError};
use super::apply::Applied;
use super::changeset::ChangeSet;
use super::params::StrategyParams;
use super::strategy::StrategyId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    /// Row index in the dataset the preview was proposed against.
    pub row: usize,
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub removed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleTable {
    pub columns: Vec<String>,
    pub rows: Vec<SampleRow>,
}

impl SampleTable {
    fn lines(&self) -> String {
        let mut out = format!("columns: {}\n", self.columns.join(" | "));
        for row in &self.rows {
            if row.removed {
                out.push_str(&format!("row {}: <removed>\n", row.row));
            } else {
                out.push_str(&format!("row {}: {}\n", row.row, row.values.join(" | ")));
            }
        }
        out
    }
}

/// A computed, unapplied change. Holds the would-be dataset so a commit
/// installs exactly what was shown.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub id: Uuid,
    pub strategy: StrategyId,
    pub params: StrategyParams,
    /// Session generation the preview was computed against.
    pub generation: u64,
    pub columns: Vec<String>,
    pub before_sample: SampleTable,
    pub after_sample: SampleTable,
    pub affected_count: usize,
    pub changed_cells: usize,
    pub removed_rows: usize,
    pub removed_columns: Vec<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    #[serde(skip)]
    result: Arc<Dataset>,
}

impl Preview {
    pub fn new(
        strategy: StrategyId,
        params: StrategyParams,
        before: &Dataset,
        applied: Applied,
        generation: u64,
        sample_rows: usize,
    ) -> Result<Self> {
        let after = applied.dataset;
        if after.is_empty() {
            return Err(SurgeonError::EmptyDataset {
                rows: after.row_count(),
                columns: after.column_count(),
            });
        }

        let changes = ChangeSet::compute(before, &after, &applied.origin);
        let affected = changes.affected_rows(before.row_count());
        let sampled: Vec<usize> = affected.iter().copied().take(sample_rows).collect();

        let before_sample = SampleTable {
            columns: before.column_names(),
            rows: sampled
                .iter()
                .zip(before.render_rows(&sampled))
                .map(|(&row, values)| SampleRow { row, values, removed: false })
                .collect(),
        };

        let after_sample = SampleTable {
            columns: after.column_names(),
            rows: sampled
                .iter()
                .map(|&row| match applied.origin.iter().position(|&o| o == row) {
                    Some(new_row) => SampleRow {
                        row,
                        values: after.render_rows(&[new_row]).into_iter().next().unwrap_or_default(),
                        removed: false,
                    },
                    None => SampleRow { row, values: Vec::new(), removed: true },
                })
                .collect(),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            strategy,
            params,
            generation,
            columns: changes.touched_columns(),
            before_sample,
            after_sample,
            affected_count: affected.len(),
            changed_cells: changes.changed_cells.len(),
            removed_rows: changes.removed_rows.len(),
            removed_columns: changes.removed_columns,
            rows_before: before.row_count(),
            rows_after: after.row_count(),
            steps: applied.steps,
            result: Arc::new(after),
        })
    }

    /// The dataset a commit would install.
    pub fn result(&self) -> &Arc<Dataset> {
        &self.result
    }

    pub fn is_noop(&self) -> bool {
        self.affected_count == 0
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} row(s) affected", self.affected_count)];
        if self.changed_cells > 0 {
            parts.push(format!("{} cell(s) changed", self.changed_cells));
        }
        if self.removed_rows > 0 {
            parts.push(format!("{} row(s) removed", self.removed_rows));
        }
        if !self.removed_columns.is_empty() {
            parts.push(format!("columns dropped: {}", self.removed_columns.join(", ")));
        }
        format!(
            "{} ({} -> {} rows): {}",
            self.strategy,
            self.rows_before,
            self.rows_after,
            parts.join(", ")
        )
    }

    /// Line diff of the sampled rows, before against after.
    pub fn render_diff(&self) -> String {
        let before = self.before_sample.lines();
        let after = self.after_sample.lines();
        let diff = TextDiff::from_lines(&before, &after);

        let mut output = String::new();
        output.push_str(&self.summary());
        output.push('\n');
        output.push_str(&"───────────────────────────────────────\n".dimmed().to_string());

        for change in diff.iter_all_changes() {
            let line = change.to_string();
            let formatted = match change.tag() {
                ChangeTag::Delete => format!("- {}", line.trim_end()).red().to_string(),
                ChangeTag::Insert => format!("+ {}", line.trim_end()).green().to_string(),
                ChangeTag::Equal => format!("  {}", line.trim_end()),
            };
            output.push_str(&formatted);
            output.push('\n');
        }

        output.push_str(&"───────────────────────────────────────".dimmed().to_string());
        output
    }
}
