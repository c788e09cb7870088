pub mod error;
pub mod dataset;
pub mod policy;
pub mod detect;
pub mod report;
pub mod remedy;
pub mod session;
pub mod repl;

pub use error::{Result, SurgeonError};
pub use dataset::{Column, ColumnDescriptor, DataType, Dataset, DatasetLoader, DatasetSummary, LoadOptions, SemanticType, Value};
pub use policy::{AuditPolicy, PolicyLoader, PolicyValidation, RuleCheck, RuleDef};
pub use detect::{scan_all, Detector, FlaggedValue, Findings, Issue, IssueKind, ScanContext, SchemaBaseline, Severity, Whitelist, WhitelistEntry};
pub use report::{AuditReport, Verdict, render_table};
pub use remedy::{default_for, list_strategies, propose, strategies_for, Preview, StrategyId, StrategyMenu, StrategyParams};
pub use session::{AuditSession, HistoryEntry, SessionState};
pub use repl::{ReplSession, ReplCommand, ReplResult, InteractiveRepl, AsyncJsonRpcServer, ServerConfig, SessionManager, SessionInfo, ServerConfigInfo};
