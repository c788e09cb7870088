use std::collections::HashSet;
use serde::Serialize;

use crate::error::{Result, SurgeonError};
use super::checksum::fingerprint;
use super::column::{Column, ColumnDescriptor, DataType};
use super::value::Value;

/// Ordered, named, typed columns of equal length.
///
/// A `Dataset` is never edited in place by the engine: every strategy
/// builds a new one, which keeps older snapshots valid for undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(|c| c.len()).unwrap_or(0);

        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != rows {
                return Err(SurgeonError::Dataset(format!(
                    "Column '{}' has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    rows
                )));
            }
            if !seen.insert(column.name()) {
                return Err(SurgeonError::Dataset(format!(
                    "Duplicate column name '{}'",
                    column.name()
                )));
            }
        }

        Ok(Self { columns, rows })
    }

    /// No columns and no rows. Only used as the placeholder of a closed session.
    pub fn empty() -> Self {
        Self { columns: Vec::new(), rows: 0 }
    }

    /// Build from row-major data; every row must have one value per name.
    pub fn from_rows(names: &[&str], rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(SurgeonError::Dataset(format!(
                    "Row {} has {} values, expected {}",
                    i,
                    row.len(),
                    names.len()
                )));
            }
            for (slot, value) in columns.iter_mut().zip(row) {
                slot.push(value);
            }
        }

        Dataset::new(
            names
                .iter()
                .zip(columns)
                .map(|(name, values)| Column::new(*name, values))
                .collect(),
        )
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Like [`Dataset::column`] but a missing column is a `SchemaMismatch`.
    pub fn require_column(&self, name: &str, operation: &'static str) -> Result<&Column> {
        self.column(name).ok_or_else(|| SurgeonError::SchemaMismatch {
            column: name.to_string(),
            operation,
        })
    }

    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.rows {
            return None;
        }
        self.columns.iter().map(|c| c.get(index)).collect()
    }

    pub fn descriptors(&self) -> Vec<ColumnDescriptor> {
        self.columns.iter().map(Column::descriptor).collect()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self)
    }

    /// Copy with `column` swapped in for the column of the same name.
    pub(crate) fn replace_column(&self, column: Column) -> Result<Self> {
        let mut columns = self.columns.clone();
        let slot = columns
            .iter_mut()
            .find(|c| c.name() == column.name())
            .ok_or_else(|| SurgeonError::SchemaMismatch {
                column: column.name().to_string(),
                operation: "replace column",
            })?;
        *slot = column;
        Dataset::new(columns)
    }

    /// Copy keeping only `rows`, in the given order.
    pub(crate) fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
            rows: rows.len(),
        }
    }

    pub(crate) fn drop_columns(&self, names: &[String]) -> Self {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| !names.iter().any(|n| n == c.name()))
            .cloned()
            .collect();
        let rows = if columns.is_empty() { 0 } else { self.rows };
        Self { columns, rows }
    }

    /// Strip surrounding whitespace from every text cell.
    pub fn trim_whitespace(self) -> Self {
        let columns = self
            .columns
            .into_iter()
            .map(|c| {
                if c.dtype() != DataType::Text {
                    return c;
                }
                let name = c.name().to_string();
                let values = c
                    .into_values()
                    .into_iter()
                    .map(|v| match v {
                        Value::Text(s) => Value::from_text(s.trim()),
                        other => other,
                    })
                    .collect();
                Column::new(name, values)
            })
            .collect();
        Self {
            columns,
            rows: self.rows,
        }
    }

    /// Render rows as display strings, for previews and tables.
    pub fn render_rows(&self, rows: &[usize]) -> Vec<Vec<String>> {
        rows.iter()
            .filter_map(|&r| self.row(r))
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect()
    }
}

/// What collaborators get back from commit and undo: enough to confirm the
/// state without touching dataset internals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub fingerprint: String,
    pub generation: u64,
    pub ledger_depth: usize,
}

impl DatasetSummary {
    pub fn new(dataset: &Dataset, generation: u64, ledger_depth: usize) -> Self {
        Self {
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            column_names: dataset.column_names(),
            fingerprint: dataset.fingerprint(),
            generation,
            ledger_depth,
        }
    }
}
