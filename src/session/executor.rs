use uuid::Uuid;

use crate::error::{Result, SurgeonError};
use crate::remedy::Preview;

/// Tracks outstanding previews and the dataset generation they were
/// computed against. Every commit or undo moves to a new generation,
/// which makes all earlier previews stale.
#[derive(Debug, Default)]
pub struct GuardedExecutor {
    generation: u64,
    pending: Vec<Preview>,
}

impl GuardedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn register(&mut self, preview: Preview) {
        self.pending.push(preview);
    }

    pub fn pending(&self) -> &[Preview] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn find(&self, id: Uuid) -> Option<&Preview> {
        self.pending.iter().find(|p| p.id == id)
    }

    pub fn latest(&self) -> Option<&Preview> {
        self.pending.last()
    }

    pub fn check_fresh(&self, preview: &Preview) -> Result<()> {
        if preview.generation != self.generation {
            return Err(SurgeonError::StalePreview {
                preview_id: preview.id,
                proposed_at: preview.generation,
                current: self.generation,
            });
        }
        Ok(())
    }

    /// Remove a fresh, pending preview so it can be committed.
    pub fn take(&mut self, preview: &Preview) -> Result<Preview> {
        self.check_fresh(preview)?;
        let idx = self
            .pending
            .iter()
            .position(|p| p.id == preview.id)
            .ok_or_else(|| {
                SurgeonError::InvalidParams(format!("Preview {} is not pending", preview.id))
            })?;
        Ok(self.pending.remove(idx))
    }

    pub fn cancel(&mut self, id: Uuid) -> Result<Preview> {
        let idx = self
            .pending
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| SurgeonError::InvalidParams(format!("Preview {} is not pending", id)))?;
        Ok(self.pending.remove(idx))
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    /// The dataset changed: bump the generation and drop every preview.
    pub fn advance(&mut self) {
        self.generation += 1;
        self.pending.clear();
    }
}
