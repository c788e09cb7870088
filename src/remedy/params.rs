use serde::{Deserialize, Serialize};

use crate::error::{Result, SurgeonError};
use crate::policy::{AuditPolicy, RuleDef};
use super::strategy::{StrategyId, Target};

/// Where a strategy applies. Rows are never part of the params: they are
/// recomputed from the dataset when the strategy runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Literal for fill-value / replace-with-value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            ..Self::default()
        }
    }

    pub fn rule(rule: impl Into<String>) -> Self {
        Self {
            rule: Some(rule.into()),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn require_column(&self, strategy: StrategyId) -> Result<&str> {
        self.column.as_deref().ok_or_else(|| {
            SurgeonError::InvalidParams(format!("{} needs a column", strategy))
        })
    }

    pub fn require_value(&self, strategy: StrategyId) -> Result<&str> {
        self.value.as_deref().ok_or_else(|| {
            SurgeonError::InvalidParams(format!("{} needs a value", strategy))
        })
    }

    pub fn require_rule<'p>(&self, strategy: StrategyId, policy: &'p AuditPolicy) -> Result<&'p RuleDef> {
        let name = self.rule.as_deref().ok_or_else(|| {
            SurgeonError::InvalidParams(format!("{} needs a rule", strategy))
        })?;
        policy
            .rule(name)
            .ok_or_else(|| SurgeonError::InvalidParams(format!("Unknown rule: {}", name)))
    }

    /// Check the params carry what `strategy` needs before anything runs.
    pub fn validate_for(&self, strategy: StrategyId, policy: &AuditPolicy) -> Result<()> {
        match strategy.target() {
            Target::Column => {
                self.require_column(strategy)?;
            }
            Target::Rule => {
                self.require_rule(strategy, policy)?;
            }
            Target::OptionalColumn | Target::Dataset => {}
        }
        if strategy.needs_value() {
            self.require_value(strategy)?;
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(c) = &self.column {
            parts.push(format!("column={}", c));
        }
        if let Some(r) = &self.rule {
            parts.push(format!("rule={}", r));
        }
        if let Some(v) = &self.value {
            parts.push(format!("value={}", v));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_invalid_params() {
        let err = StrategyParams::new()
            .validate_for(StrategyId::FillMean, &AuditPolicy::default())
            .unwrap_err();
        assert!(matches!(err, SurgeonError::InvalidParams(_)));
    }

    #[test]
    fn test_unknown_rule() {
        let err = StrategyParams::rule("nope")
            .validate_for(StrategyId::ClampToRange, &AuditPolicy::default())
            .unwrap_err();
        assert!(err.to_string().contains("Unknown rule"));
    }

    #[test]
    fn test_value_required() {
        let params = StrategyParams::column("region");
        assert!(params.validate_for(StrategyId::FillValue, &AuditPolicy::default()).is_err());
        let params = params.with_value("Unknown");
        assert!(params.validate_for(StrategyId::FillValue, &AuditPolicy::default()).is_ok());
    }

    #[test]
    fn test_dataset_level_needs_nothing() {
        assert!(StrategyParams::new()
            .validate_for(StrategyId::DropDuplicates, &AuditPolicy::default())
            .is_ok());
        assert_eq!(StrategyParams::column("a").with_value("0").describe(), "column=a value=0");
    }
}
