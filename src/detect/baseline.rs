use serde::Serialize;

use crate::dataset::{DataType, Dataset};
use crate::policy::ExpectedColumn;
use super::issue::{Issue, IssueKind, Severity};

/// Column names and types recorded when the session first audits (or
/// taken from the policy's expected schema). Lives as long as the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaBaseline {
    columns: Vec<(String, DataType)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    Added { column: String, dtype: DataType },
    Removed { column: String, dtype: DataType },
    Retyped { column: String, from: DataType, to: DataType },
}

impl SchemaChange {
    pub fn column(&self) -> &str {
        match self {
            SchemaChange::Added { column, .. }
            | SchemaChange::Removed { column, .. }
            | SchemaChange::Retyped { column, .. } => column,
        }
    }

    pub fn into_issue(self) -> Issue {
        match self {
            SchemaChange::Added { column, dtype } => Issue::new(
                IssueKind::SchemaDrift,
                Severity::Warning,
                format!("Column '{}' ({}) was added since the baseline", column, dtype),
            )
            .with_column(column),
            SchemaChange::Removed { column, dtype } => Issue::new(
                IssueKind::SchemaDrift,
                Severity::Error,
                format!("Column '{}' ({}) is missing from the dataset", column, dtype),
            )
            .with_column(column),
            SchemaChange::Retyped { column, from, to } => Issue::new(
                IssueKind::SchemaDrift,
                Severity::Error,
                format!("Column '{}' changed type from {} to {}", column, from, to),
            )
            .with_column(column),
        }
    }
}

impl SchemaBaseline {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self {
            columns: dataset
                .columns()
                .iter()
                .map(|c| (c.name().to_string(), c.dtype()))
                .collect(),
        }
    }

    pub fn from_expected(expected: &[ExpectedColumn]) -> Self {
        Self {
            columns: expected.iter().map(|c| (c.name.clone(), c.dtype)).collect(),
        }
    }

    pub fn columns(&self) -> &[(String, DataType)] {
        &self.columns
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Differences between the baseline and `dataset`, in baseline column
    /// order followed by added columns in dataset order.
    pub fn compare(&self, dataset: &Dataset) -> Vec<SchemaChange> {
        let mut changes = Vec::new();

        for (name, expected) in &self.columns {
            match dataset.column(name) {
                None => changes.push(SchemaChange::Removed {
                    column: name.clone(),
                    dtype: *expected,
                }),
                Some(column) if !compatible(*expected, column.dtype()) => {
                    changes.push(SchemaChange::Retyped {
                        column: name.clone(),
                        from: *expected,
                        to: column.dtype(),
                    })
                }
                Some(_) => {}
            }
        }

        for column in dataset.columns() {
            if !self.contains(column.name()) {
                changes.push(SchemaChange::Added {
                    column: column.name().to_string(),
                    dtype: column.dtype(),
                });
            }
        }

        changes
    }
}

/// An all-null column carries no type information, and ints widening to
/// floats (or a fill narrowing floats back to ints) is not drift.
fn compatible(expected: DataType, actual: DataType) -> bool {
    expected == actual
        || expected == DataType::Null
        || actual == DataType::Null
        || (expected.is_numeric() && actual.is_numeric())
}
