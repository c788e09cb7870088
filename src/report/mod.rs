mod builder;
mod table;

pub use builder::{build, AuditReport, KindCount, Verdict};
pub use table::{render_table, truncate, IssueTableRow};
