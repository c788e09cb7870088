use regex::Regex;
use serde::Serialize;

use crate::dataset::Value;
use crate::error::{Result, SurgeonError};
use crate::policy::WhitelistDef;

/// A value accepted by the user for one column. Exact entries compare
/// against the cell's display form, so `100` matches both `Int(100)` and
/// `Float(100.0)`.
#[derive(Debug, Clone, Serialize)]
pub struct WhitelistEntry {
    pub column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip)]
    regex: Option<Regex>,
}

impl WhitelistEntry {
    pub fn value(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: Some(value.into()),
            pattern: None,
            regex: None,
        }
    }

    pub fn pattern(column: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern)
            .map_err(|e| SurgeonError::InvalidParams(format!("invalid whitelist pattern: {}", e)))?;
        Ok(Self {
            column: column.into(),
            value: None,
            pattern: Some(pattern),
            regex: Some(regex),
        })
    }

    pub fn from_def(def: &WhitelistDef) -> Result<Self> {
        match (&def.value, &def.pattern) {
            (Some(value), None) => Ok(Self::value(&def.column, value)),
            (None, Some(pattern)) => Self::pattern(&def.column, pattern),
            _ => Err(SurgeonError::Policy(format!(
                "whitelist on '{}' needs exactly one of value or pattern",
                def.column
            ))),
        }
    }

    /// The literal or pattern text this entry was created from.
    pub fn target(&self) -> &str {
        self.value
            .as_deref()
            .or(self.pattern.as_deref())
            .unwrap_or_default()
    }

    pub fn is_pattern(&self) -> bool {
        self.regex.is_some()
    }

    pub fn matches(&self, column: &str, value: &Value) -> bool {
        if self.column != column {
            return false;
        }
        let rendered = value.to_string();
        match (&self.value, &self.regex) {
            (Some(expected), _) => *expected == rendered,
            (None, Some(regex)) => regex.is_match(&rendered),
            (None, None) => false,
        }
    }

    fn same_as(&self, other: &WhitelistEntry) -> bool {
        self.column == other.column && self.value == other.value && self.pattern == other.pattern
    }
}

#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_defs(defs: &[WhitelistDef]) -> Result<Self> {
        let mut whitelist = Self::new();
        for def in defs {
            whitelist.add(WhitelistEntry::from_def(def)?);
        }
        Ok(whitelist)
    }

    /// Returns false when an identical entry already exists.
    pub fn add(&mut self, entry: WhitelistEntry) -> bool {
        if self.entries.iter().any(|e| e.same_as(&entry)) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove every entry on `column` whose value or pattern is `target`.
    /// Returns how many were removed.
    pub fn remove(&mut self, column: &str, target: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.column == column && e.target() == target));
        before - self.entries.len()
    }

    pub fn matches(&self, column: &str, value: &Value) -> bool {
        self.entries.iter().any(|e| e.matches(column, value))
    }

    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
