use std::collections::HashSet;
use serde::{Deserialize, Serialize};

use super::value::Value;

const IDENTIFIER_NAMES: &[&str] = &["id", "index", "row_num", "uuid"];
const IDENTIFIER_MIN_VALUES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Every value is null, so nothing can be inferred.
    Null,
    Int,
    Float,
    Bool,
    Date,
    Text,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Null => "null",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Bool => "bool",
            DataType::Date => "date",
            DataType::Text => "text",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }

    fn infer<'a>(values: impl Iterator<Item = &'a Value>) -> Self {
        let mut inferred: Option<DataType> = None;
        for dtype in values.filter_map(Value::data_type) {
            inferred = Some(match (inferred, dtype) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(DataType::Int), DataType::Float) | (Some(DataType::Float), DataType::Int) => {
                    DataType::Float
                }
                _ => return DataType::Text,
            });
        }
        inferred.unwrap_or(DataType::Null)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Datetime,
    Identifier,
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticType::Numeric => write!(f, "numeric"),
            SemanticType::Categorical => write!(f, "categorical"),
            SemanticType::Datetime => write!(f, "datetime"),
            SemanticType::Identifier => write!(f, "identifier"),
        }
    }
}

/// Derived view of a column, recomputed on every audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: DataType,
    pub semantic: SemanticType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    dtype: DataType,
    values: Vec<Value>,
}

impl Column {
    /// Build a column, inferring its type and normalizing values to it:
    /// ints in a float column become floats, anything in a text column
    /// becomes text.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let dtype = DataType::infer(values.iter());
        let values = values.into_iter().map(|v| v.coerce(dtype)).collect();
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.dtype.is_numeric()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    pub fn null_ratio(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.null_count() as f64 / self.values.len() as f64
        }
    }

    pub fn null_rows(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_null())
            .map(|(i, _)| i)
            .collect()
    }

    /// Non-null numeric values with their row index.
    pub fn numeric_values(&self) -> Vec<(usize, f64)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_f64().map(|f| (i, f)))
            .collect()
    }

    pub fn distinct_count(&self) -> usize {
        self.values
            .iter()
            .filter(|v| !v.is_null())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn semantic_type(&self) -> SemanticType {
        let lowered = self.name.to_lowercase();
        if IDENTIFIER_NAMES.contains(&lowered.as_str()) || lowered.ends_with("_id") {
            return SemanticType::Identifier;
        }

        match self.dtype {
            DataType::Int | DataType::Float => SemanticType::Numeric,
            DataType::Date => SemanticType::Datetime,
            DataType::Text => {
                let non_null = self.values.len() - self.null_count();
                if non_null >= IDENTIFIER_MIN_VALUES && self.distinct_count() == non_null {
                    SemanticType::Identifier
                } else {
                    SemanticType::Categorical
                }
            }
            DataType::Bool | DataType::Null => SemanticType::Categorical,
        }
    }

    pub fn descriptor(&self) -> ColumnDescriptor {
        ColumnDescriptor {
            name: self.name.clone(),
            dtype: self.dtype,
            semantic: self.semantic_type(),
            nullable: self.values.iter().any(Value::is_null),
        }
    }

    /// Same name, new values; the type is inferred again.
    pub(crate) fn with_values(&self, values: Vec<Value>) -> Self {
        Column::new(self.name.clone(), values)
    }

    pub(crate) fn select(&self, rows: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            dtype: self.dtype,
            values: rows.iter().filter_map(|&r| self.values.get(r).cloned()).collect(),
        }
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_int() {
        let col = Column::new("n", vec![Value::Int(1), Value::Null, Value::Int(3)]);
        assert_eq!(col.dtype(), DataType::Int);
        assert_eq!(col.null_count(), 1);
    }

    #[test]
    fn test_mixed_numbers_become_float() {
        let col = Column::new("n", vec![Value::Int(1), Value::Float(2.5)]);
        assert_eq!(col.dtype(), DataType::Float);
        assert_eq!(col.get(0), Some(&Value::Float(1.0)));
    }

    #[test]
    fn test_mixed_text_and_numbers_become_text() {
        let col = Column::new("n", vec![Value::Int(1), Value::text("two")]);
        assert_eq!(col.dtype(), DataType::Text);
        assert_eq!(col.get(0), Some(&Value::text("1")));
    }

    #[test]
    fn test_all_null_column() {
        let col = Column::new("n", vec![Value::Null, Value::Null]);
        assert_eq!(col.dtype(), DataType::Null);
        assert!((col.null_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_identifier_by_name() {
        let col = Column::new("customer_id", vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(col.semantic_type(), SemanticType::Identifier);
    }

    #[test]
    fn test_identifier_by_cardinality() {
        let values = (0..12).map(|i| Value::text(format!("k{}", i))).collect();
        let col = Column::new("code", values);
        assert_eq!(col.semantic_type(), SemanticType::Identifier);

        let few = Column::new("region", vec![Value::text("North"), Value::text("South")]);
        assert_eq!(few.semantic_type(), SemanticType::Categorical);
    }
}
