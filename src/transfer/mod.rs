//! Atomic Transfers
//!
//! Moves an amount between two accounts as one all-or-nothing unit of work.
//!
//! # State Machine
//!
//! ```text
//! VALIDATED → IDEMPOTENCY_CHECKED → LOCKED → FUNDS_CHECKED
//!           → BALANCES_APPLIED → RECORD_INSERTED → COMMITTED
//!                      ↓ (any failure)
//!                   ABORTED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Conservation**: a committed transfer changes the sum of balances by zero
//! 2. **Non-negative**: no committed balance is ever below zero
//! 3. **Exactly-once**: one record and one balance effect per idempotency key
//! 4. **Lock Order**: rows are always locked in ascending account id order
//! 5. **Atomicity**: an aborted attempt leaves no observable effect

pub mod error;
pub mod service;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use error::TransferError;
pub use service::TransferService;
pub use state::TransferState;
pub use types::{TransferRequest, lock_order};
