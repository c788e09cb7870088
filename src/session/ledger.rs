use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::error::{Result, SurgeonError};
use crate::remedy::{StrategyId, StrategyParams};

/// The dataset as it was before one committed change.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub snapshot: Arc<Dataset>,
    pub strategy: StrategyId,
    pub params: StrategyParams,
    pub preview_id: Uuid,
    pub committed_at: DateTime<Utc>,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// Serializable view of a ledger entry, without the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub depth: usize,
    pub strategy: StrategyId,
    pub params: StrategyParams,
    pub preview_id: Uuid,
    pub committed_at: DateTime<Utc>,
    pub rows_before: usize,
    pub rows_after: usize,
}

#[derive(Debug, Default)]
pub struct UndoLedger {
    entries: Vec<LedgerEntry>,
    max_depth: Option<usize>,
}

impl UndoLedger {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            max_depth,
        }
    }

    /// Push a snapshot. When bounded, the oldest entry is dropped.
    pub fn push(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
        if let Some(max) = self.max_depth {
            let max = max.max(1);
            if self.entries.len() > max {
                let excess = self.entries.len() - max;
                self.entries.drain(..excess);
            }
        }
    }

    pub fn pop(&mut self) -> Result<LedgerEntry> {
        self.entries
            .pop()
            .ok_or(SurgeonError::EmptyLedger { operation: "undo" })
    }

    pub fn peek(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| HistoryEntry {
                depth: i + 1,
                strategy: e.strategy,
                params: e.params.clone(),
                preview_id: e.preview_id,
                committed_at: e.committed_at,
                rows_before: e.rows_before,
                rows_after: e.rows_after,
            })
            .collect()
    }
}
