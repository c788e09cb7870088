use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dataset::{Dataset, DatasetSummary};
use crate::detect::{scan_all, ScanContext, SchemaBaseline, Whitelist, WhitelistEntry};
use crate::error::{Result, SurgeonError};
use crate::policy::{AuditPolicy, PolicyLoader};
use crate::remedy::{self, list_strategies, Preview, StrategyId, StrategyMenu, StrategyParams};
use crate::report::AuditReport;
use super::executor::GuardedExecutor;
use super::ledger::{HistoryEntry, LedgerEntry, UndoLedger};
use super::state::{Operation, SessionState};

/// One dataset under audit: its current state, undo history, whitelist and
/// schema baseline. Nothing here is shared between sessions.
#[derive(Debug)]
pub struct AuditSession {
    id: Uuid,
    state: SessionState,
    dataset: Arc<Dataset>,
    policy: AuditPolicy,
    whitelist: Whitelist,
    baseline: Option<SchemaBaseline>,
    ledger: UndoLedger,
    executor: GuardedExecutor,
    last_report: Option<AuditReport>,
    /// Committed since the last audit.
    dirty: bool,
}

impl AuditSession {
    pub fn load(dataset: Dataset, policy: AuditPolicy) -> Result<Self> {
        if dataset.is_empty() {
            return Err(SurgeonError::EmptyDataset {
                rows: dataset.row_count(),
                columns: dataset.column_count(),
            });
        }

        let validation = PolicyLoader::validate(&policy);
        if let Some(first) = validation.errors.first() {
            return Err(SurgeonError::Policy(format!("[{}] {}", first.code, first.message)));
        }

        let whitelist = Whitelist::from_defs(&policy.whitelist)?;
        let baseline = policy
            .expected_schema
            .as_deref()
            .map(SchemaBaseline::from_expected);
        let ledger = UndoLedger::new(policy.ledger.max_depth);
        let id = Uuid::new_v4();

        info!(
            "Session {} loaded {} rows x {} columns",
            id,
            dataset.row_count(),
            dataset.column_count()
        );

        Ok(Self {
            id,
            state: SessionState::Loaded,
            dataset: Arc::new(dataset),
            policy,
            whitelist,
            baseline,
            ledger,
            executor: GuardedExecutor::new(),
            last_report: None,
            dirty: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    pub fn generation(&self) -> u64 {
        self.executor.generation()
    }

    /// Read-only access for collaborators such as exporters.
    pub fn current(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn last_report(&self) -> Option<&AuditReport> {
        self.last_report.as_ref()
    }

    pub fn baseline(&self) -> Option<&SchemaBaseline> {
        self.baseline.as_ref()
    }

    pub fn pending_previews(&self) -> &[Preview] {
        self.executor.pending()
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary::new(&self.dataset, self.executor.generation(), self.ledger.depth())
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.ledger.history()
    }

    pub fn whitelist(&self) -> &[WhitelistEntry] {
        self.whitelist.entries()
    }

    fn guard(&self, operation: Operation) -> Result<()> {
        if self.state.allows(operation) {
            Ok(())
        } else {
            Err(SurgeonError::InvalidStateTransition {
                operation: operation.as_str(),
                state: self.state,
            })
        }
    }

    fn scan_context(&self) -> ScanContext<'_> {
        ScanContext {
            policy: &self.policy,
            whitelist: &self.whitelist,
            baseline: self.baseline.as_ref(),
        }
    }

    fn run_audit(&mut self) -> AuditReport {
        if self.baseline.is_none() {
            debug!("Recording schema baseline from current dataset");
            self.baseline = Some(SchemaBaseline::from_dataset(&self.dataset));
        }
        let findings = scan_all(&self.dataset, &self.scan_context());
        let report = AuditReport::from_findings(findings, &self.dataset, self.policy.fail_on);
        self.last_report = Some(report.clone());
        self.dirty = false;
        report
    }

    /// Run every detector over the current dataset. The first audit of a
    /// session records the schema baseline.
    pub fn audit(&mut self) -> Result<AuditReport> {
        self.guard(Operation::Audit)?;
        let report = self.run_audit();

        self.state = if self.executor.has_pending() {
            SessionState::AwaitingConfirmation
        } else {
            SessionState::Audited
        };

        info!(
            "Audit: {} ({} issue(s), {} rows)",
            report.verdict, report.total_issues, report.rows
        );
        Ok(report)
    }

    pub fn list_strategies(&self) -> Result<StrategyMenu> {
        self.guard(Operation::Strategies)?;
        let report = self.last_report.as_ref().ok_or(SurgeonError::InvalidStateTransition {
            operation: Operation::Strategies.as_str(),
            state: self.state,
        })?;
        Ok(list_strategies(report, &self.dataset, &self.policy))
    }

    /// Compute what `strategy` would do. The dataset is not touched.
    pub fn propose(&mut self, strategy: StrategyId, params: StrategyParams) -> Result<Preview> {
        self.guard(Operation::Propose)?;

        let preview = remedy::propose(
            strategy,
            &self.dataset,
            params,
            &self.scan_context(),
            self.executor.generation(),
            self.policy.preview.sample_rows,
        )?;

        if preview.is_noop() {
            warn!("Proposed {} changes nothing", strategy);
        }
        debug!("Proposed {} as preview {}", strategy, preview.id);
        info!("Preview: {}", preview.summary());

        self.executor.register(preview.clone());
        self.state = SessionState::AwaitingConfirmation;
        Ok(preview)
    }

    /// Install a previously proposed change and push the prior dataset
    /// onto the undo ledger.
    pub fn commit(&mut self, preview: &Preview) -> Result<DatasetSummary> {
        if matches!(self.state, SessionState::Loaded | SessionState::Closed) {
            return Err(SurgeonError::InvalidStateTransition {
                operation: Operation::Commit.as_str(),
                state: self.state,
            });
        }
        self.executor.check_fresh(preview)?;
        self.guard(Operation::Commit)?;

        let accepted = self.executor.take(preview)?;
        let before = Arc::clone(&self.dataset);

        self.ledger.push(LedgerEntry {
            snapshot: before,
            strategy: accepted.strategy,
            params: accepted.params.clone(),
            preview_id: accepted.id,
            committed_at: Utc::now(),
            rows_before: accepted.rows_before,
            rows_after: accepted.rows_after,
        });
        self.dataset = Arc::clone(accepted.result());
        self.executor.advance();
        self.state = SessionState::Mutated;
        self.dirty = true;

        info!(
            "Committed {} ({} -> {} rows, ledger depth {})",
            accepted.strategy,
            accepted.rows_before,
            accepted.rows_after,
            self.ledger.depth()
        );
        Ok(self.summary())
    }

    /// Commit a pending preview by id, or the latest one when `id` is None.
    pub fn commit_pending(&mut self, id: Option<Uuid>) -> Result<DatasetSummary> {
        self.guard(Operation::Commit)?;
        let preview = match id {
            Some(id) => self.executor.find(id),
            None => self.executor.latest(),
        }
        .cloned()
        .ok_or_else(|| match id {
            Some(id) => SurgeonError::InvalidParams(format!("Preview {} is not pending", id)),
            None => SurgeonError::InvalidParams("No pending preview".to_string()),
        })?;
        self.commit(&preview)
    }

    /// Reject a pending preview, or all of them when `id` is None.
    pub fn cancel(&mut self, id: Option<Uuid>) -> Result<usize> {
        self.guard(Operation::Cancel)?;
        let cancelled = match id {
            Some(id) => {
                self.executor.cancel(id)?;
                1
            }
            None => self.executor.cancel_all(),
        };

        if !self.executor.has_pending() {
            self.state = if self.dirty {
                SessionState::Mutated
            } else {
                SessionState::Audited
            };
        }
        debug!("Cancelled {} preview(s)", cancelled);
        Ok(cancelled)
    }

    /// Restore the dataset from before the last commit and re-audit it.
    pub fn undo(&mut self) -> Result<DatasetSummary> {
        self.guard(Operation::Undo)?;
        let entry = self.ledger.pop()?;

        self.dataset = entry.snapshot;
        self.executor.advance();
        let report = self.run_audit();
        self.state = SessionState::Audited;

        info!(
            "Undid {} (restored {} rows, ledger depth {}); re-audit: {}",
            entry.strategy,
            self.dataset.row_count(),
            self.ledger.depth(),
            report.verdict
        );
        Ok(self.summary())
    }

    /// Accept a value (or regex pattern) in `column` as valid from now on.
    /// Returns false when the entry already existed.
    pub fn add_whitelist(&mut self, entry: WhitelistEntry) -> Result<bool> {
        self.guard(Operation::Whitelist)?;
        self.dataset.require_column(&entry.column, "whitelist add")?;
        let description = format!("{} = {}", entry.column, entry.target());
        let added = self.whitelist.add(entry);
        if added {
            info!("Whitelisted {}", description);
        }
        Ok(added)
    }

    pub fn remove_whitelist(&mut self, column: &str, target: &str) -> Result<usize> {
        self.guard(Operation::Whitelist)?;
        let removed = self.whitelist.remove(column, target);
        info!("Removed {} whitelist entr(ies) for {} = {}", removed, column, target);
        Ok(removed)
    }

    /// Make the current columns the new schema baseline.
    pub fn accept_schema(&mut self) -> Result<()> {
        self.guard(Operation::AcceptSchema)?;
        self.baseline = Some(SchemaBaseline::from_dataset(&self.dataset));
        info!("Schema baseline reset to {} columns", self.dataset.column_count());
        Ok(())
    }

    /// End the session. Dataset, ledger, previews, whitelist and baseline
    /// are discarded; every later operation fails.
    pub fn close(&mut self) -> Result<()> {
        self.guard(Operation::Close)?;
        self.executor.advance();
        self.dataset = Arc::new(Dataset::empty());
        self.ledger.clear();
        self.whitelist = Whitelist::new();
        self.baseline = None;
        self.last_report = None;
        self.state = SessionState::Closed;
        info!("Session {} closed", self.id);
        Ok(())
    }
}
