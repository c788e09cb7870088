use std::collections::{BTreeSet, HashSet};
use serde::Serialize;

use crate::dataset::{Dataset, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellChange {
    /// Row index in the dataset before the change.
    pub row: usize,
    pub column: String,
    pub before: Value,
    pub after: Value,
}

/// What differs between a dataset and a strategy's output, given the
/// output's row origins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    pub changed_cells: Vec<CellChange>,
    pub removed_rows: Vec<usize>,
    pub removed_columns: Vec<String>,
}

impl ChangeSet {
    pub fn compute(before: &Dataset, after: &Dataset, origin: &[usize]) -> Self {
        let kept: HashSet<usize> = origin.iter().copied().collect();
        let removed_rows = (0..before.row_count()).filter(|r| !kept.contains(r)).collect();

        let removed_columns = before
            .column_names()
            .into_iter()
            .filter(|name| after.column(name).is_none())
            .collect();

        let mut changed_cells = Vec::new();
        for column in after.columns() {
            let Some(old) = before.column(column.name()) else {
                continue;
            };
            for (new_row, &old_row) in origin.iter().enumerate() {
                let (Some(a), Some(b)) = (old.get(old_row), column.get(new_row)) else {
                    continue;
                };
                if !same_cell(a, b) {
                    changed_cells.push(CellChange {
                        row: old_row,
                        column: column.name().to_string(),
                        before: a.clone(),
                        after: b.clone(),
                    });
                }
            }
        }
        changed_cells.sort_by(|a, b| a.row.cmp(&b.row));

        Self {
            changed_cells,
            removed_rows,
            removed_columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed_cells.is_empty() && self.removed_rows.is_empty() && self.removed_columns.is_empty()
    }

    /// Rows (by original index) that a change touches. Dropping a column
    /// touches every row.
    pub fn affected_rows(&self, rows_before: usize) -> BTreeSet<usize> {
        if !self.removed_columns.is_empty() {
            return (0..rows_before).collect();
        }
        self.changed_cells
            .iter()
            .map(|c| c.row)
            .chain(self.removed_rows.iter().copied())
            .collect()
    }

    pub fn touched_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for name in self
            .changed_cells
            .iter()
            .map(|c| &c.column)
            .chain(self.removed_columns.iter())
        {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
        columns
    }
}

/// Equal, or only re-typed by column inference (`1` widened to `1.0`,
/// `5` rendered as text `"5"`).
fn same_cell(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_null() || b.is_null() {
        return false;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.to_string() == b.to_string(),
    }
}
