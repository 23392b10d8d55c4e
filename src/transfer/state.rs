//! Transfer Attempt States
//!
//! Progress of one `transfer` call. Nothing here is persisted: only
//! `Committed` is externally visible, and every failure collapses to
//! `Aborted` with zero observable effect.

use std::fmt;

/// Transfer attempt states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    /// Request shape checked, no I/O yet
    Validated,

    /// Advisory idempotency lookup found no prior record
    IdempotencyChecked,

    /// Both account rows exclusively held by the unit of work
    Locked,

    /// Source balance covers the amount
    FundsChecked,

    /// Both balances updated inside the unit of work
    BalancesApplied,

    /// Transaction record inserted inside the unit of work
    RecordInserted,

    /// Terminal: unit of work committed
    Committed,

    /// Terminal: unit of work rolled back (or never opened)
    Aborted,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Committed | TransferState::Aborted)
    }

    /// Next state on the success path, `None` for terminal states
    pub fn successor(&self) -> Option<TransferState> {
        match self {
            TransferState::Validated => Some(TransferState::IdempotencyChecked),
            TransferState::IdempotencyChecked => Some(TransferState::Locked),
            TransferState::Locked => Some(TransferState::FundsChecked),
            TransferState::FundsChecked => Some(TransferState::BalancesApplied),
            TransferState::BalancesApplied => Some(TransferState::RecordInserted),
            TransferState::RecordInserted => Some(TransferState::Committed),
            TransferState::Committed | TransferState::Aborted => None,
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Validated => "VALIDATED",
            TransferState::IdempotencyChecked => "IDEMPOTENCY_CHECKED",
            TransferState::Locked => "LOCKED",
            TransferState::FundsChecked => "FUNDS_CHECKED",
            TransferState::BalancesApplied => "BALANCES_APPLIED",
            TransferState::RecordInserted => "RECORD_INSERTED",
            TransferState::Committed => "COMMITTED",
            TransferState::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
