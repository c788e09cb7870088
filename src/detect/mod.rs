mod baseline;
mod detector;
mod issue;
pub mod rules;
pub mod stats;
mod whitelist;

pub use baseline::{SchemaBaseline, SchemaChange};
pub use detector::{duplicate_groups, scan_all, Detector, Findings, ScanContext};
pub use issue::{FlaggedValue, Issue, IssueKind, Severity};
pub use whitelist::{Whitelist, WhitelistEntry};
