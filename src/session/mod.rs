mod executor;
mod ledger;
mod session;
mod state;

pub use executor::GuardedExecutor;
pub use ledger::{HistoryEntry, LedgerEntry, UndoLedger};
pub use session::AuditSession;
pub use state::{Operation, SessionState};
