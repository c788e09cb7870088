use datasurgeon::dataset::{DataType, Dataset, Value};
use datasurgeon::detect::Severity;
use datasurgeon::policy::{AuditPolicy, PolicyLoader, RuleCheck, RuleDef};
use datasurgeon::session::AuditSession;
use datasurgeon::SurgeonError;
use std::path::Path;

fn fixtures_path() -> &'static Path {
    Path::new("tests/fixtures")
}

#[test]
fn test_load_fixture_policy() {
    let policy = PolicyLoader::load(fixtures_path().join("policy.yaml")).unwrap();

    assert_eq!(policy.fail_on, Severity::Error);
    assert_eq!(policy.nulls.error_ratio, 0.1);
    assert_eq!(policy.outliers.multiplier, 1.5);
    assert_eq!(policy.ledger.max_depth, Some(20));
    assert_eq!(policy.preview.sample_rows, 3);
    assert!(policy.load.trim_whitespace);

    let expected = policy.expected_schema.as_ref().unwrap();
    assert_eq!(expected.len(), 5);
    assert_eq!(expected[4].name, "unit_price");
    assert_eq!(expected[4].dtype, DataType::Float);

    assert_eq!(policy.rules.len(), 3);
    let rule = policy.rule("quantity_positive").unwrap();
    assert_eq!(rule.column, "quantity");
    assert_eq!(rule.check, RuleCheck::Range { min: Some(0.0), max: None });
    assert_eq!(policy.rule("region_known").unwrap().severity, Severity::Warning);
}

#[test]
fn test_fixture_policy_validates_cleanly() {
    let policy = PolicyLoader::load(fixtures_path().join("policy.yaml")).unwrap();
    let validation = PolicyLoader::validate(&policy);
    assert!(validation.is_valid());
    assert!(!validation.has_warnings());
}

#[test]
fn test_missing_policy_file() {
    let err = PolicyLoader::load(fixtures_path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, SurgeonError::Policy(_)));
}

#[test]
fn test_rule_severity_defaults_to_error() {
    let policy = PolicyLoader::from_str(
        r#"
rules:
  - name: present
    column: email
    type: not_null
"#,
    )
    .unwrap();
    assert_eq!(policy.rules[0].severity, Severity::Error);
    assert_eq!(policy.rules[0].check, RuleCheck::NotNull);
}

#[test]
fn test_validation_collects_every_error() {
    let policy: AuditPolicy = serde_yaml::from_str(
        r#"
nulls:
  warning_ratio: 1.5
rules:
  - name: r
    column: a
    type: range
  - name: r
    column: b
    type: allowed_values
    values: []
whitelist:
  - column: a
ledger:
  max_depth: 0
"#,
    )
    .unwrap();

    let validation = PolicyLoader::validate(&policy);
    let codes: Vec<&str> = validation.errors.iter().map(|e| e.code).collect();

    assert!(codes.contains(&"P002"));
    assert!(codes.contains(&"P003"));
    assert!(codes.contains(&"P005"));
    assert!(codes.contains(&"P008"));
    assert!(codes.contains(&"P009"));
    assert!(codes.contains(&"P012"));
    assert!(!validation.is_valid());
}

#[test]
fn test_from_str_rejects_first_error() {
    let err = PolicyLoader::from_str(
        r#"
rules:
  - name: code
    column: sku
    type: pattern
    regex: "([a-z"
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("P006"));
}

#[test]
fn test_sample_rows_zero_is_only_a_warning() {
    let policy = PolicyLoader::from_str("preview:\n  sample_rows: 0\n").unwrap();
    let validation = PolicyLoader::validate(&policy);
    assert!(validation.is_valid());
    assert_eq!(validation.warnings[0].code, "W002");
}

fn small_dataset() -> Dataset {
    Dataset::from_rows(
        &["x"],
        [1, 2, 2, 3, 4, 5, 100].iter().map(|v| vec![Value::Int(*v)]).collect(),
    )
    .unwrap()
}

#[test]
fn test_nan_multiplier_never_reaches_a_session() {
    let err = PolicyLoader::from_str("outliers:\n  multiplier: .nan\n").unwrap_err();
    assert!(err.to_string().contains("P010"));

    let mut policy = AuditPolicy::default();
    policy.outliers.multiplier = f64::NAN;
    let err = AuditSession::load(small_dataset(), policy).unwrap_err();
    assert!(matches!(err, SurgeonError::Policy(_)));
}

#[test]
fn test_nan_range_bound_rejected() {
    let err = PolicyLoader::from_str(
        r#"
rules:
  - name: capped
    column: x
    type: range
    min: .nan
    max: 5
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("P014"));
}

#[test]
fn test_inverted_range_built_in_code_is_rejected_at_load() {
    let mut policy = AuditPolicy::default();
    policy.rules.push(RuleDef {
        name: "backwards".to_string(),
        column: "x".to_string(),
        description: None,
        severity: Severity::Error,
        check: RuleCheck::Range { min: Some(10.0), max: Some(0.0) },
    });

    let err = AuditSession::load(small_dataset(), policy).unwrap_err();
    assert!(matches!(err, SurgeonError::Policy(ref m) if m.contains("P004")));
}
