mod loader;
mod types;

pub use loader::{PolicyIssue, PolicyLoader, PolicyValidation};
pub use types::{
    AuditPolicy, ExpectedColumn, LedgerSettings, LoadSettings, NullThresholds,
    OutlierSettings, PreviewSettings, RuleCheck, RuleDef, WhitelistDef,
};
