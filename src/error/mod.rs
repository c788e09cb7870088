use thiserror::Error;
use uuid::Uuid;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum SurgeonError {
    #[error("Cannot {operation} while session is {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Preview {preview_id} is stale: proposed at generation {proposed_at}, session is at generation {current}")]
    StalePreview {
        preview_id: Uuid,
        proposed_at: u64,
        current: u64,
    },

    #[error("Nothing to {operation}: undo ledger is empty")]
    EmptyLedger {
        operation: &'static str,
    },

    #[error("No {statistic} available for column '{column}': every value is null")]
    NoStatisticAvailable {
        column: String,
        statistic: &'static str,
    },

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Column '{column}' does not exist (during {operation})")]
    SchemaMismatch {
        column: String,
        operation: &'static str,
    },

    #[error("Dataset is empty ({rows} rows, {columns} columns)")]
    EmptyDataset {
        rows: usize,
        columns: usize,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("REPL error: {0}")]
    Repl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SurgeonError {
    /// Short machine-readable code, used by the JSON-RPC surface.
    pub fn code(&self) -> &'static str {
        match self {
            SurgeonError::InvalidStateTransition { .. } => "invalid_state_transition",
            SurgeonError::StalePreview { .. } => "stale_preview",
            SurgeonError::EmptyLedger { .. } => "empty_ledger",
            SurgeonError::NoStatisticAvailable { .. } => "no_statistic_available",
            SurgeonError::UnknownStrategy(_) => "unknown_strategy",
            SurgeonError::SchemaMismatch { .. } => "schema_mismatch",
            SurgeonError::EmptyDataset { .. } => "empty_dataset",
            SurgeonError::InvalidParams(_) => "invalid_params",
            SurgeonError::Dataset(_) => "dataset",
            SurgeonError::Policy(_) => "policy",
            SurgeonError::Repl(_) => "repl",
            SurgeonError::Io(_) => "io",
            SurgeonError::Yaml(_) => "yaml",
            SurgeonError::Json(_) => "json",
            SurgeonError::Csv(_) => "csv",
        }
    }

    /// Engine failures leave the session untouched, so the caller can retry
    /// or pick another action. Only I/O and decoding failures are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SurgeonError::Io(_)
                | SurgeonError::Yaml(_)
                | SurgeonError::Json(_)
                | SurgeonError::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SurgeonError>;
