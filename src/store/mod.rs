//! Balance Store
//!
//! Durable, lockable storage of account balances and the append-only
//! transaction log.
//!
//! # Unit of Work
//!
//! Every mutating operation takes the caller's unit of work explicitly
//! (`&mut S::UnitOfWork`). Nothing a unit of work does is visible to other
//! readers until [`BalanceStore::commit`] returns. Dropping a unit of work
//! without committing rolls it back, so a cancelled caller leaves no trace.
//!
//! # Safety Invariants
//!
//! 1. **Lock-Before-Write**: `set_balance` is only correct for rows locked by
//!    `lock_for_update` in the same unit of work
//! 2. **Locks Live Until Commit**: row locks are released by commit/rollback only
//! 3. **Storage-Level Uniqueness**: `insert_transaction` rejects a colliding
//!    idempotency key atomically, independent of any application-level check

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::StoreError;
pub use memory::{MemoryBalanceStore, MemoryUnitOfWork};
pub use postgres::{PgBalanceStore, PgUnitOfWork};

use async_trait::async_trait;

use crate::account::{Account, NewAccount, TransactionRecord};
use crate::core_types::{AccountId, MinorUnits};

/// Storage contract consumed by the transfer orchestrator
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Capability object for one active unit of work
    type UnitOfWork: Send;

    /// Get store name for logging
    fn name(&self) -> &'static str;

    /// Open a new unit of work
    async fn begin(&self) -> Result<Self::UnitOfWork, StoreError>;

    /// Make every staged change durable and visible, then release all locks
    async fn commit(&self, uow: Self::UnitOfWork) -> Result<(), StoreError>;

    /// Discard every staged change and release all locks
    async fn rollback(&self, uow: Self::UnitOfWork) -> Result<(), StoreError>;

    /// Acquire an exclusive row lock on the account and read it under that lock
    ///
    /// Blocks until the lock is held. Returns `AccountNotFound` if no such row.
    async fn lock_for_update(
        &self,
        uow: &mut Self::UnitOfWork,
        account_id: AccountId,
    ) -> Result<Account, StoreError>;

    /// Overwrite the account balance inside the unit of work
    async fn set_balance(
        &self,
        uow: &mut Self::UnitOfWork,
        account_id: AccountId,
        new_balance: MinorUnits,
    ) -> Result<(), StoreError>;

    /// Append a transaction record
    ///
    /// Returns `DuplicateKey` if another record (committed or in flight) already
    /// holds the same idempotency key.
    async fn insert_transaction(
        &self,
        uow: &mut Self::UnitOfWork,
        record: &TransactionRecord,
    ) -> Result<(), StoreError>;

    /// Non-locking lookup of a committed record by idempotency key
    async fn find_transaction_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<TransactionRecord>, StoreError>;

    /// Non-locking read of the committed account state
    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Insert a new account row (`AccountExists` on duplicate id)
    async fn create_account(&self, new_account: NewAccount) -> Result<Account, StoreError>;
}
