use std::collections::HashSet;
use std::fs;
use std::path::Path;
use regex::Regex;

use crate::error::{Result, SurgeonError};
use super::types::{AuditPolicy, RuleCheck};

#[derive(Debug, Clone)]
pub struct PolicyIssue {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct PolicyValidation {
    pub errors: Vec<PolicyIssue>,
    pub warnings: Vec<PolicyIssue>,
}

impl PolicyValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub struct PolicyLoader;

impl PolicyLoader {
    /// Load and validate a policy file. Validation errors are fatal,
    /// warnings are not.
    pub fn load(path: impl AsRef<Path>) -> Result<AuditPolicy> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| SurgeonError::Policy(format!("{}: {}", path.display(), e)))?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<AuditPolicy> {
        let policy: AuditPolicy = if content.trim().is_empty() {
            AuditPolicy::default()
        } else {
            serde_yaml::from_str(content)?
        };

        let validation = Self::validate(&policy);
        if let Some(first) = validation.errors.first() {
            return Err(SurgeonError::Policy(format!("[{}] {}", first.code, first.message)));
        }
        Ok(policy)
    }

    pub fn validate(policy: &AuditPolicy) -> PolicyValidation {
        let mut result = PolicyValidation::default();

        Self::check_rule_names(policy, &mut result.errors);
        Self::check_rule_definitions(policy, &mut result.errors);
        Self::check_whitelist(policy, &mut result.errors);
        Self::check_thresholds(policy, &mut result.errors, &mut result.warnings);
        Self::check_expected_schema(policy, &mut result.errors);

        result
    }

    fn check_rule_names(policy: &AuditPolicy, errors: &mut Vec<PolicyIssue>) {
        let mut seen = HashSet::new();
        for rule in &policy.rules {
            if rule.name.trim().is_empty() {
                errors.push(PolicyIssue {
                    code: "P001",
                    message: format!("rule on column '{}' has an empty name", rule.column),
                });
            } else if !seen.insert(rule.name.as_str()) {
                errors.push(PolicyIssue {
                    code: "P002",
                    message: format!("duplicate rule name: {}", rule.name),
                });
            }
        }
    }

    fn check_rule_definitions(policy: &AuditPolicy, errors: &mut Vec<PolicyIssue>) {
        for rule in &policy.rules {
            match &rule.check {
                RuleCheck::Range { min: None, max: None } => errors.push(PolicyIssue {
                    code: "P003",
                    message: format!("rule '{}': range needs min or max", rule.name),
                }),
                RuleCheck::Range { min, max }
                    if min.iter().chain(max.iter()).any(|b| !b.is_finite()) =>
                {
                    errors.push(PolicyIssue {
                        code: "P014",
                        message: format!("rule '{}': range bounds must be finite numbers", rule.name),
                    })
                }
                RuleCheck::Range { min: Some(min), max: Some(max) } if min > max => {
                    errors.push(PolicyIssue {
                        code: "P004",
                        message: format!("rule '{}': min {} > max {}", rule.name, min, max),
                    })
                }
                RuleCheck::AllowedValues { values } if values.is_empty() => {
                    errors.push(PolicyIssue {
                        code: "P005",
                        message: format!("rule '{}': allowed_values is empty", rule.name),
                    })
                }
                RuleCheck::Pattern { regex } => {
                    if let Err(e) = Regex::new(regex) {
                        errors.push(PolicyIssue {
                            code: "P006",
                            message: format!("rule '{}': invalid regex: {}", rule.name, e),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn check_whitelist(policy: &AuditPolicy, errors: &mut Vec<PolicyIssue>) {
        for entry in &policy.whitelist {
            match (&entry.value, &entry.pattern) {
                (Some(_), None) => {}
                (None, Some(pattern)) => {
                    if let Err(e) = Regex::new(pattern) {
                        errors.push(PolicyIssue {
                            code: "P007",
                            message: format!("whitelist on '{}': invalid pattern: {}", entry.column, e),
                        });
                    }
                }
                _ => errors.push(PolicyIssue {
                    code: "P008",
                    message: format!(
                        "whitelist on '{}' needs exactly one of value or pattern",
                        entry.column
                    ),
                }),
            }
        }
    }

    fn check_thresholds(
        policy: &AuditPolicy,
        errors: &mut Vec<PolicyIssue>,
        warnings: &mut Vec<PolicyIssue>,
    ) {
        let n = &policy.nulls;
        let ratios = [n.warning_ratio, n.error_ratio, n.critical_ratio];
        if ratios.iter().any(|r| !(0.0..=1.0).contains(r)) {
            errors.push(PolicyIssue {
                code: "P009",
                message: "null ratios must be between 0 and 1".to_string(),
            });
        } else if !(n.warning_ratio <= n.error_ratio && n.error_ratio <= n.critical_ratio) {
            warnings.push(PolicyIssue {
                code: "W001",
                message: "null ratios should satisfy warning <= error <= critical".to_string(),
            });
        }

        let multiplier = policy.outliers.multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            errors.push(PolicyIssue {
                code: "P010",
                message: format!("outlier multiplier must be a positive number, got {}", multiplier),
            });
        }
        let zscore = policy.outliers.zscore_threshold;
        if !zscore.is_finite() || zscore <= 0.0 {
            errors.push(PolicyIssue {
                code: "P011",
                message: format!("z-score threshold must be a positive number, got {}", zscore),
            });
        }
        if policy.preview.sample_rows == 0 {
            warnings.push(PolicyIssue {
                code: "W002",
                message: "preview.sample_rows is 0; previews will show no rows".to_string(),
            });
        }
        if policy.ledger.max_depth == Some(0) {
            errors.push(PolicyIssue {
                code: "P012",
                message: "ledger.max_depth must allow at least one undo".to_string(),
            });
        }
    }

    fn check_expected_schema(policy: &AuditPolicy, errors: &mut Vec<PolicyIssue>) {
        if let Some(expected) = &policy.expected_schema {
            let mut seen = HashSet::new();
            for column in expected {
                if !seen.insert(column.name.as_str()) {
                    errors.push(PolicyIssue {
                        code: "P013",
                        message: format!("expected_schema lists '{}' twice", column.name),
                    });
                }
            }
        }
    }
}
