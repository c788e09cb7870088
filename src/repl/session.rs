use std::path::{Path, PathBuf};
use colored::Colorize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dataset::{DatasetLoader, LoadOptions};
use crate::detect::WhitelistEntry;
use crate::error::{Result, SurgeonError};
use crate::policy::{AuditPolicy, PolicyLoader};
use crate::remedy::{StrategyId, StrategyParams};
use crate::report::{render_table, AuditReport};
use crate::session::AuditSession;
use super::commands::{ReplCommand, ReplResult};

/// Command front-end over at most one `AuditSession`. Loading a new file
/// replaces the current session.
pub struct ReplSession {
    policy: AuditPolicy,
    policy_path: Option<PathBuf>,
    source: Option<PathBuf>,
    session: Option<AuditSession>,
}

impl ReplSession {
    pub fn new(policy: AuditPolicy, policy_path: Option<PathBuf>) -> Self {
        Self {
            policy,
            policy_path,
            source: None,
            session: None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn session(&self) -> Option<&AuditSession> {
        self.session.as_ref()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.session
            .as_ref()
            .map(|s| s.current().column_names())
            .unwrap_or_default()
    }

    pub fn prompt_label(&self) -> String {
        match (&self.source, &self.session) {
            (Some(path), Some(session)) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                format!("{}[{}]", name, session.state())
            }
            _ => "datasurgeon".to_string(),
        }
    }

    fn active(&mut self) -> Result<&mut AuditSession> {
        self.session
            .as_mut()
            .ok_or_else(|| SurgeonError::Repl("No dataset loaded. Use 'load <file>' first".to_string()))
    }

    pub fn execute(&mut self, cmd: ReplCommand) -> ReplResult {
        let outcome = match cmd {
            ReplCommand::Exit => Ok(ReplResult::empty_success()),
            ReplCommand::Help => Ok(self.cmd_help()),
            ReplCommand::Status => Ok(self.cmd_status()),
            ReplCommand::Load { path, policy } => self.cmd_load(&path, policy.as_deref()),
            ReplCommand::Audit { output } => self.cmd_audit(&output),
            ReplCommand::Strategies => self.cmd_strategies(),
            ReplCommand::Propose { strategy, column, rule, value } => {
                self.cmd_propose(&strategy, column, rule, value)
            }
            ReplCommand::Confirm { preview } => self.cmd_confirm(preview.as_deref()),
            ReplCommand::Cancel { preview } => self.cmd_cancel(preview.as_deref()),
            ReplCommand::Undo => self.cmd_undo(),
            ReplCommand::History => self.cmd_history(),
            ReplCommand::WhitelistAdd { column, value, pattern } => {
                self.cmd_whitelist_add(column, value, pattern)
            }
            ReplCommand::WhitelistRemove { column, target } => {
                self.cmd_whitelist_remove(&column, &target)
            }
            ReplCommand::WhitelistList => self.cmd_whitelist_list(),
            ReplCommand::AcceptSchema => self.cmd_accept_schema(),
            ReplCommand::Export { path } => self.cmd_export(&path),
            ReplCommand::Close => self.cmd_close(),
        };

        outcome.unwrap_or_else(|e| ReplResult::from_error(&e))
    }

    fn cmd_help(&self) -> ReplResult {
        let help = r#"Available commands:
  load <file> [--policy FILE]          Load a dataset (.csv, .json, .jsonl, .yaml)
  audit [--output table|json]          Scan the dataset for issues
  strategies                           List fixes for the last audit
  propose <strategy> [--column C]      Preview a fix (nothing is changed)
      [--rule R] [--value V]
  confirm [preview-id]                 Apply the pending preview
  cancel [preview-id]                  Discard pending preview(s)
  undo                                 Revert the last applied fix
  history                              Show applied fixes
  whitelist add <column> <value>       Accept a value from now on
  whitelist add <column> --pattern RE  Accept values matching a regex
  whitelist remove <column> <value>
  whitelist list
  accept-schema                        Make the current columns the baseline
  export <file>                        Write the current dataset
  status                               Show session status
  close                                End the session
  help                                 Show this help
  exit                                 Exit REPL"#;

        ReplResult::success_with_output(help.to_string())
    }

    fn cmd_status(&self) -> ReplResult {
        let policy_str = self
            .policy_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(default)".to_string());

        match &self.session {
            Some(session) => {
                let summary = session.summary();
                let source = self
                    .source
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                let output = format!(
                    "Dataset: {}\nPolicy: {}\nState: {}\nRows: {}\nColumns: {}\nGeneration: {}\nUndo depth: {}\nPending previews: {}\nFingerprint: {}",
                    source,
                    policy_str,
                    session.state(),
                    summary.rows,
                    summary.columns,
                    summary.generation,
                    summary.ledger_depth,
                    session.pending_previews().len(),
                    &summary.fingerprint[..12.min(summary.fingerprint.len())],
                );
                let data = serde_json::json!({
                    "session": session.id(),
                    "source": source,
                    "policy": policy_str,
                    "state": session.state(),
                    "summary": summary,
                    "pending": session.pending_previews().iter().map(|p| p.id).collect::<Vec<_>>(),
                });
                ReplResult::success_with_both(output, data)
            }
            None => {
                let output = format!("Dataset: (none)\nPolicy: {}", policy_str);
                let data = serde_json::json!({
                    "source": null,
                    "policy": policy_str,
                    "state": null,
                });
                ReplResult::success_with_both(output, data)
            }
        }
    }

    fn cmd_load(&mut self, path: &str, policy_path: Option<&str>) -> Result<ReplResult> {
        if let Some(p) = policy_path {
            self.policy = PolicyLoader::load(p)?;
            self.policy_path = Some(PathBuf::from(p));
        }

        let loader = DatasetLoader::with_options(LoadOptions {
            trim_whitespace: self.policy.load.trim_whitespace,
        });
        let dataset = loader.load(path)?;
        let session = AuditSession::load(dataset, self.policy.clone())?;

        if let Some(previous) = self.session.as_ref() {
            if previous.state() != crate::session::SessionState::Closed {
                warn!("Replacing session {} with a new dataset", previous.id());
            }
        }

        let summary = session.summary();
        let output = format!(
            "Loaded {} ({} rows x {} columns): {}",
            path,
            summary.rows,
            summary.columns,
            summary.column_names.join(", ")
        );
        let data = serde_json::json!({
            "session": session.id(),
            "state": session.state(),
            "summary": summary,
        });

        self.session = Some(session);
        self.source = Some(PathBuf::from(path));
        Ok(ReplResult::success_with_both(output, data))
    }

    fn cmd_audit(&mut self, output: &str) -> Result<ReplResult> {
        let report = self.active()?.audit()?;
        let data = serde_json::to_value(&report)?;

        match output {
            "json" => Ok(ReplResult::success_with_both(
                serde_json::to_string_pretty(&report)?,
                data,
            )),
            "yaml" => Ok(ReplResult::success_with_both(serde_yaml::to_string(&report)?, data)),
            _ => Ok(ReplResult::success_with_both(format_report(&report), data)),
        }
    }

    fn cmd_strategies(&mut self) -> Result<ReplResult> {
        let menu = self.active()?.list_strategies()?;
        let mut lines = Vec::new();

        if menu.by_issue.is_empty() {
            lines.push("No open issues.".to_string());
        }
        for entry in &menu.by_issue {
            let target = entry
                .rule
                .clone()
                .or_else(|| entry.column.clone())
                .unwrap_or_else(|| "(dataset)".to_string());
            lines.push(format!("#{} {} on {}", entry.issue, entry.kind.title(), target));
            for strategy in &entry.strategies {
                let marker = if entry.default == Some(*strategy) { "*" } else { " " };
                lines.push(format!("   {} {:<24} {}", marker, strategy.as_str(), strategy.description()));
            }
        }
        if menu.auto_pilot {
            lines.push(String::new());
            lines.push(format!(
                "{:<26} {}",
                StrategyId::AutoPilot.as_str(),
                StrategyId::AutoPilot.description()
            ));
        }

        let data = serde_json::to_value(&menu)?;
        Ok(ReplResult::success_with_both(lines.join("\n"), data))
    }

    fn cmd_propose(
        &mut self,
        strategy: &str,
        column: Option<String>,
        rule: Option<String>,
        value: Option<String>,
    ) -> Result<ReplResult> {
        let strategy: StrategyId = strategy.parse()?;
        let params = StrategyParams { column, rule, value };
        let preview = self.active()?.propose(strategy, params)?;

        let mut output = String::new();
        output.push_str(&format!("{} {}\n", "Preview".bold(), preview.id));
        output.push_str(&preview.summary());
        output.push('\n');
        for step in &preview.steps {
            output.push_str(&format!("  - {}\n", step));
        }
        output.push_str(&preview.render_diff());
        output.push_str("\nType 'confirm' to apply or 'cancel' to discard.");

        let data = serde_json::to_value(&preview)?;
        Ok(ReplResult::success_with_both(output, data))
    }

    fn cmd_confirm(&mut self, preview: Option<&str>) -> Result<ReplResult> {
        let id = parse_preview_id(preview)?;
        let summary = self.active()?.commit_pending(id)?;
        let output = format!(
            "{} Applied. Dataset now {} rows x {} columns (undo depth {})",
            "✓".green(),
            summary.rows,
            summary.columns,
            summary.ledger_depth
        );
        Ok(ReplResult::success_with_both(output, serde_json::to_value(&summary)?))
    }

    fn cmd_cancel(&mut self, preview: Option<&str>) -> Result<ReplResult> {
        let id = parse_preview_id(preview)?;
        let cancelled = self.active()?.cancel(id)?;
        Ok(ReplResult::success_with_both(
            format!("Cancelled {} preview(s)", cancelled),
            serde_json::json!({"cancelled": cancelled}),
        ))
    }

    fn cmd_undo(&mut self) -> Result<ReplResult> {
        let session = self.active()?;
        let summary = session.undo()?;
        let verdict = session
            .last_report()
            .map(|r| r.verdict.to_string())
            .unwrap_or_default();
        let output = format!(
            "{} Reverted. Dataset now {} rows x {} columns (undo depth {}). Re-audit: {}",
            "↶".yellow(),
            summary.rows,
            summary.columns,
            summary.ledger_depth,
            verdict
        );
        Ok(ReplResult::success_with_both(output, serde_json::to_value(&summary)?))
    }

    fn cmd_history(&mut self) -> Result<ReplResult> {
        let history = self.active()?.history();
        let output = if history.is_empty() {
            "No changes applied.".to_string()
        } else {
            history
                .iter()
                .map(|h| {
                    let params = h.params.describe();
                    format!(
                        "{:>3}. {} {}{} ({} -> {} rows)",
                        h.depth,
                        h.committed_at.format("%H:%M:%S"),
                        h.strategy,
                        if params.is_empty() { String::new() } else { format!(" [{}]", params) },
                        h.rows_before,
                        h.rows_after
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        Ok(ReplResult::success_with_both(output, serde_json::to_value(&history)?))
    }

    fn cmd_whitelist_add(
        &mut self,
        column: String,
        value: Option<String>,
        pattern: Option<String>,
    ) -> Result<ReplResult> {
        let entry = match (value, pattern) {
            (_, Some(pattern)) => WhitelistEntry::pattern(column, pattern)?,
            (Some(value), None) => WhitelistEntry::value(column, value),
            (None, None) => {
                return Err(SurgeonError::InvalidParams(
                    "whitelist entry needs a value or a pattern".to_string(),
                ))
            }
        };
        let label = format!("{} = {}", entry.column, entry.target());
        let added = self.active()?.add_whitelist(entry)?;
        let output = if added {
            format!("Whitelisted {}", label)
        } else {
            format!("{} is already whitelisted", label)
        };
        Ok(ReplResult::success_with_both(output, serde_json::json!({"added": added})))
    }

    fn cmd_whitelist_remove(&mut self, column: &str, target: &str) -> Result<ReplResult> {
        let removed = self.active()?.remove_whitelist(column, target)?;
        Ok(ReplResult::success_with_both(
            format!("Removed {} entr{}", removed, if removed == 1 { "y" } else { "ies" }),
            serde_json::json!({"removed": removed}),
        ))
    }

    fn cmd_whitelist_list(&mut self) -> Result<ReplResult> {
        let entries = self.active()?.whitelist().to_vec();
        let output = if entries.is_empty() {
            "Whitelist is empty.".to_string()
        } else {
            entries
                .iter()
                .map(|e| {
                    let kind = if e.is_pattern() { "pattern" } else { "value" };
                    format!("  {} {} = {}", kind, e.column, e.target())
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        Ok(ReplResult::success_with_both(output, serde_json::to_value(&entries)?))
    }

    fn cmd_accept_schema(&mut self) -> Result<ReplResult> {
        let session = self.active()?;
        session.accept_schema()?;
        let columns = session.current().column_names();
        Ok(ReplResult::success_with_both(
            format!("Schema baseline is now: {}", columns.join(", ")),
            serde_json::json!({"columns": columns}),
        ))
    }

    fn cmd_export(&mut self, path: &str) -> Result<ReplResult> {
        let session = self.active()?;
        if session.state().is_closed() {
            return Err(SurgeonError::InvalidStateTransition {
                operation: "export",
                state: session.state(),
            });
        }
        let dataset = std::sync::Arc::clone(session.current());
        DatasetLoader::new().export(&dataset, path)?;
        info!("Exported {} rows to {}", dataset.row_count(), path);
        Ok(ReplResult::success_with_both(
            format!("Exported {} rows to {}", dataset.row_count(), path),
            serde_json::json!({"path": path, "rows": dataset.row_count()}),
        ))
    }

    fn cmd_close(&mut self) -> Result<ReplResult> {
        self.active()?.close()?;
        Ok(ReplResult::success_with_output("Session closed.".to_string()))
    }
}

fn parse_preview_id(preview: Option<&str>) -> Result<Option<Uuid>> {
    preview
        .map(|p| {
            Uuid::parse_str(p)
                .map_err(|_| SurgeonError::InvalidParams(format!("'{}' is not a preview id", p)))
        })
        .transpose()
}

/// Human-readable audit report: verdict line, issue table and notes.
pub fn format_report(report: &AuditReport) -> String {
    let verdict = match report.verdict {
        crate::report::Verdict::Clean => report.verdict.to_string().green(),
        crate::report::Verdict::PassedWithWarnings => report.verdict.to_string().yellow(),
        crate::report::Verdict::Failed => report.verdict.to_string().red(),
    };

    let mut out = format!(
        "{} {} ({} rows x {} columns, {} issue(s))\n",
        report.verdict.symbol(),
        verdict.bold(),
        report.rows,
        report.columns,
        report.total_issues
    );

    if !report.issues.is_empty() {
        out.push('\n');
        out.push_str(&render_table(report));
        out.push('\n');
    }

    if !report.notes.is_empty() {
        out.push_str("\nNotes:\n");
        for note in &report.notes {
            out.push_str(&format!("  - {}\n", note));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SALES: &str = r#"[
        {"order_id": 1, "region": "North", "qty": 3},
        {"order_id": 2, "region": "South", "qty": null},
        {"order_id": 3, "region": "North", "qty": 5},
        {"order_id": 3, "region": "North", "qty": 5}
    ]"#;

    fn loaded() -> (TempDir, ReplSession) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales.json");
        fs::write(&path, SALES).unwrap();
        let mut repl = ReplSession::new(AuditPolicy::default(), None);
        let result = repl.execute(ReplCommand::Load {
            path: path.to_string_lossy().to_string(),
            policy: None,
        });
        assert!(result.success, "{:?}", result.error);
        (dir, repl)
    }

    #[test]
    fn test_commands_require_loaded_dataset() {
        let mut repl = ReplSession::new(AuditPolicy::default(), None);
        let result = repl.execute(ReplCommand::Audit { output: "table".to_string() });
        assert!(!result.success);
        assert!(result.error.unwrap().contains("No dataset loaded"));
    }

    #[test]
    fn test_propose_before_audit_reports_state() {
        let (_dir, mut repl) = loaded();
        let result = repl.execute(ReplCommand::Propose {
            strategy: "drop-duplicates".to_string(),
            column: None,
            rule: None,
            value: None,
        });
        assert!(!result.success);
        assert_eq!(result.code.as_deref(), Some("invalid_state_transition"));
    }

    #[test]
    fn test_audit_propose_confirm_undo() {
        let (_dir, mut repl) = loaded();

        let audit = repl.execute(ReplCommand::Audit { output: "json".to_string() });
        assert!(audit.success);
        let total = audit.data.unwrap()["total_issues"].as_u64().unwrap();
        assert!(total >= 2);

        let preview = repl.execute(ReplCommand::Propose {
            strategy: "dedupe".to_string(),
            column: None,
            rule: None,
            value: None,
        });
        assert!(preview.success, "{:?}", preview.error);
        assert_eq!(preview.data.unwrap()["rows_after"], 3);

        let confirm = repl.execute(ReplCommand::Confirm { preview: None });
        assert!(confirm.success, "{:?}", confirm.error);
        assert_eq!(confirm.data.unwrap()["rows"], 3);

        let undo = repl.execute(ReplCommand::Undo);
        assert!(undo.success);
        assert_eq!(undo.data.unwrap()["rows"], 4);
    }

    #[test]
    fn test_unknown_strategy() {
        let (_dir, mut repl) = loaded();
        repl.execute(ReplCommand::Audit { output: "table".to_string() });
        let result = repl.execute(ReplCommand::Propose {
            strategy: "teleport".to_string(),
            column: None,
            rule: None,
            value: None,
        });
        assert_eq!(result.code.as_deref(), Some("unknown_strategy"));
    }

    #[test]
    fn test_export_writes_current_dataset() {
        let (dir, mut repl) = loaded();
        let out = dir.path().join("clean.jsonl");
        let result = repl.execute(ReplCommand::Export {
            path: out.to_string_lossy().to_string(),
        });
        assert!(result.success, "{:?}", result.error);
        let content = fs::read_to_string(out).unwrap();
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn test_export_after_close_is_rejected() {
        let (dir, mut repl) = loaded();
        repl.execute(ReplCommand::Close);
        let result = repl.execute(ReplCommand::Export {
            path: dir.path().join("late.json").to_string_lossy().to_string(),
        });
        assert_eq!(result.code.as_deref(), Some("invalid_state_transition"));
    }

    #[test]
    fn test_status_without_session() {
        let repl = ReplSession::new(AuditPolicy::default(), None);
        let result = repl.cmd_status();
        assert!(result.success);
        assert!(result.output.unwrap().contains("(none)"));
    }
}
