use serde::{Deserialize, Serialize};

use crate::dataset::DataType;
use crate::detect::Severity;

/// Everything that tunes an audit. Every field has a default, so an empty
/// policy file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPolicy {
    #[serde(default)]
    pub nulls: NullThresholds,
    #[serde(default)]
    pub outliers: OutlierSettings,
    #[serde(default = "default_fail_on")]
    pub fail_on: Severity,
    /// Seeds the drift baseline instead of the first audit.
    #[serde(default)]
    pub expected_schema: Option<Vec<ExpectedColumn>>,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
    #[serde(default)]
    pub whitelist: Vec<WhitelistDef>,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub load: LoadSettings,
    #[serde(default)]
    pub preview: PreviewSettings,
}

fn default_fail_on() -> Severity {
    Severity::Error
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            nulls: NullThresholds::default(),
            outliers: OutlierSettings::default(),
            fail_on: default_fail_on(),
            expected_schema: None,
            rules: Vec::new(),
            whitelist: Vec::new(),
            ledger: LedgerSettings::default(),
            load: LoadSettings::default(),
            preview: PreviewSettings::default(),
        }
    }
}

impl AuditPolicy {
    pub fn rule(&self, name: &str) -> Option<&RuleDef> {
        self.rules.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NullThresholds {
    /// Ratios above this are reported at all. 0.0 reports any null.
    #[serde(default)]
    pub warning_ratio: f64,
    #[serde(default = "default_null_error_ratio")]
    pub error_ratio: f64,
    #[serde(default = "default_null_critical_ratio")]
    pub critical_ratio: f64,
}

fn default_null_error_ratio() -> f64 {
    0.1
}

fn default_null_critical_ratio() -> f64 {
    0.4
}

impl Default for NullThresholds {
    fn default() -> Self {
        Self {
            warning_ratio: 0.0,
            error_ratio: default_null_error_ratio(),
            critical_ratio: default_null_critical_ratio(),
        }
    }
}

impl NullThresholds {
    pub fn severity_for(&self, ratio: f64) -> Option<Severity> {
        if ratio <= self.warning_ratio {
            None
        } else if ratio > self.critical_ratio {
            Some(Severity::Critical)
        } else if ratio > self.error_ratio {
            Some(Severity::Error)
        } else {
            Some(Severity::Warning)
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutlierSettings {
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Used when IQR is zero but the column still varies.
    #[serde(default = "default_zscore")]
    pub zscore_threshold: f64,
    /// Columns with fewer non-null values are not checked.
    #[serde(default = "default_min_values")]
    pub min_values: usize,
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_zscore() -> f64 {
    3.0
}

fn default_min_values() -> usize {
    4
}

impl Default for OutlierSettings {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
            zscore_threshold: default_zscore(),
            min_values: default_min_values(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: DataType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_rule_severity")]
    pub severity: Severity,
    #[serde(flatten)]
    pub check: RuleCheck,
}

fn default_rule_severity() -> Severity {
    Severity::Error
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCheck {
    /// Numeric values must lie within [min, max].
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },

    /// Values must be one of a fixed set.
    AllowedValues {
        values: Vec<String>,
    },

    /// Text values must match a regex.
    Pattern {
        regex: String,
    },

    NotNull,
}

impl RuleCheck {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleCheck::Range { .. } => "range",
            RuleCheck::AllowedValues { .. } => "allowed_values",
            RuleCheck::Pattern { .. } => "pattern",
            RuleCheck::NotNull => "not_null",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistDef {
    pub column: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Oldest entries are dropped beyond this depth. Unbounded when unset.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LoadSettings {
    #[serde(default = "default_true")]
    pub trim_whitespace: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self { trim_whitespace: true }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PreviewSettings {
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

fn default_sample_rows() -> usize {
    5
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self { sample_rows: default_sample_rows() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_policy_uses_defaults() {
        let policy: AuditPolicy = serde_yaml::from_str("{}").unwrap();
        assert_eq!(policy.fail_on, Severity::Error);
        assert!((policy.outliers.multiplier - 1.5).abs() < f64::EPSILON);
        assert!((policy.nulls.critical_ratio - 0.4).abs() < f64::EPSILON);
        assert!(policy.load.trim_whitespace);
        assert_eq!(policy.preview.sample_rows, 5);
        assert!(policy.ledger.max_depth.is_none());
    }

    #[test]
    fn test_parse_range_rule() {
        let yaml = r#"
name: non_negative_sales
column: sales
type: range
min: 0
"#;
        let rule: RuleDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.severity, Severity::Error);
        match rule.check {
            RuleCheck::Range { min, max } => {
                assert_eq!(min, Some(0.0));
                assert!(max.is_none());
            }
            _ => panic!("Expected Range"),
        }
    }

    #[test]
    fn test_parse_allowed_values_rule() {
        let yaml = r#"
name: valid_region
column: region
type: allowed_values
values: [North, South, East, West]
severity: warning
"#;
        let rule: RuleDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.severity, Severity::Warning);
        match rule.check {
            RuleCheck::AllowedValues { values } => assert_eq!(values.len(), 4),
            _ => panic!("Expected AllowedValues"),
        }
    }

    #[test]
    fn test_parse_not_null_rule() {
        let yaml = r#"
name: id_present
column: id
type: not_null
"#;
        let rule: RuleDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.check, RuleCheck::NotNull);
        assert_eq!(rule.check.kind(), "not_null");
    }

    #[test]
    fn test_null_severity_scales_with_ratio() {
        let t = NullThresholds::default();
        assert_eq!(t.severity_for(0.0), None);
        assert_eq!(t.severity_for(0.05), Some(Severity::Warning));
        assert_eq!(t.severity_for(0.2), Some(Severity::Error));
        assert_eq!(t.severity_for(0.5), Some(Severity::Critical));
    }

    #[test]
    fn test_parse_expected_schema() {
        let yaml = r#"
expected_schema:
  - name: date
    type: date
  - name: sales
    type: float
"#;
        let policy: AuditPolicy = serde_yaml::from_str(yaml).unwrap();
        let schema = policy.expected_schema.unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema[1].dtype, DataType::Float);
    }
}
