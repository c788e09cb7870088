use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Loaded,
    Audited,
    AwaitingConfirmation,
    Mutated,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Loaded => "loaded",
            SessionState::Audited => "audited",
            SessionState::AwaitingConfirmation => "awaiting_confirmation",
            SessionState::Mutated => "mutated",
            SessionState::Closed => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// States from which `operation` may run. Commit is checked separately
    /// because a stale preview must be reported as stale, not as a bad state.
    pub fn allows(&self, operation: Operation) -> bool {
        use SessionState::*;
        match operation {
            Operation::Audit | Operation::Whitelist | Operation::Close => !self.is_closed(),
            Operation::Propose | Operation::Strategies => {
                matches!(self, Audited | AwaitingConfirmation | Mutated)
            }
            Operation::Commit | Operation::Cancel => matches!(self, AwaitingConfirmation),
            Operation::Undo => matches!(self, Audited | AwaitingConfirmation | Mutated),
            Operation::AcceptSchema => matches!(self, Audited | Mutated),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Audit,
    Strategies,
    Propose,
    Commit,
    Cancel,
    Undo,
    Whitelist,
    AcceptSchema,
    Close,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Audit => "audit",
            Operation::Strategies => "list strategies",
            Operation::Propose => "propose",
            Operation::Commit => "commit",
            Operation::Cancel => "cancel",
            Operation::Undo => "undo",
            Operation::Whitelist => "change whitelist",
            Operation::AcceptSchema => "accept schema",
            Operation::Close => "close",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_only_allows_audit() {
        let s = SessionState::Loaded;
        assert!(s.allows(Operation::Audit));
        assert!(!s.allows(Operation::Propose));
        assert!(!s.allows(Operation::Commit));
        assert!(!s.allows(Operation::Undo));
    }

    #[test]
    fn test_closed_allows_nothing() {
        let s = SessionState::Closed;
        for op in [
            Operation::Audit,
            Operation::Strategies,
            Operation::Propose,
            Operation::Commit,
            Operation::Cancel,
            Operation::Undo,
            Operation::Whitelist,
            Operation::AcceptSchema,
            Operation::Close,
        ] {
            assert!(!s.allows(op), "{} allowed after close", op.as_str());
        }
    }

    #[test]
    fn test_commit_requires_pending_preview() {
        assert!(SessionState::AwaitingConfirmation.allows(Operation::Commit));
        assert!(!SessionState::Audited.allows(Operation::Commit));
        assert!(!SessionState::Mutated.allows(Operation::Commit));
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(SessionState::AwaitingConfirmation.to_string(), "awaiting_confirmation");
        assert_eq!(SessionState::Audited.to_string(), "audited");
    }
}
