//! Transfer Orchestrator
//!
//! Executes one transfer end-to-end inside a single unit of work:
//!
//! ```text
//! Validated → IdempotencyChecked → Locked → FundsChecked
//!           → BalancesApplied → RecordInserted → Committed
//!                      (any failure) → Aborted
//! ```
//!
//! Rows are locked in ascending account id order, whatever the direction of
//! the transfer. Balance deltas are applied by role after both locks are held.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::state::TransferState;
use super::types::{TransferRequest, lock_order};
use crate::account::TransactionRecord;
use crate::store::{BalanceStore, StoreError};

/// Outcome of the locked part of an attempt
enum Attempt {
    Inserted(TransactionRecord),
    /// The store waited out a concurrent holder of this idempotency key and
    /// the holder committed
    LostIdempotencyRace(String),
}

/// Stateless transfer orchestrator over a [`BalanceStore`]
///
/// Share it behind an `Arc`; concurrent calls serialize only on the store's
/// row locks.
pub struct TransferService<S: BalanceStore> {
    store: S,
    timeout: Option<Duration>,
}

impl<S: BalanceStore> TransferService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bound every `transfer` call; on expiry the unit of work is dropped
    /// (rolled back) and `TransferError::Timeout` is returned.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Move `amount` from source to destination, exactly once per idempotency key
    ///
    /// Replays of a committed idempotency key return the original record
    /// unchanged without touching any balance.
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransactionRecord, TransferError> {
        let Some(limit) = self.timeout else {
            return self.execute(&req).await;
        };

        match tokio::time::timeout(limit, self.execute(&req)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    source = req.source_account_id,
                    destination = req.destination_account_id,
                    amount = req.amount,
                    timeout_ms = limit.as_millis() as u64,
                    "Transfer timed out, unit of work abandoned"
                );
                Err(TransferError::Timeout)
            }
        }
    }

    /// Run one attempt; every storage failure is logged here, whichever step
    /// raised it
    async fn execute(&self, req: &TransferRequest) -> Result<TransactionRecord, TransferError> {
        let result = self.run(req).await;
        match &result {
            Err(TransferError::Internal(msg)) => error!(
                store = self.store.name(),
                source = req.source_account_id,
                destination = req.destination_account_id,
                idempotency_key = req.idempotency_key().unwrap_or_default(),
                error = %msg,
                "Unexpected storage failure during transfer"
            ),
            Err(TransferError::StorageUnavailable(msg)) => warn!(
                store = self.store.name(),
                source = req.source_account_id,
                destination = req.destination_account_id,
                idempotency_key = req.idempotency_key().unwrap_or_default(),
                error = %msg,
                "Storage unavailable, transfer rolled back"
            ),
            _ => {}
        }
        result
    }

    async fn run(&self, req: &TransferRequest) -> Result<TransactionRecord, TransferError> {
        req.validate()?;
        let mut state = TransferState::Validated;
        let key = req.idempotency_key();

        // Advisory only: the store's uniqueness check is authoritative
        if let Some(key) = key
            && let Some(existing) = self.store.find_transaction_by_idempotency_key(key).await?
        {
            info!(
                idempotency_key = %key,
                transaction_id = %existing.id,
                "Idempotent replay, returning existing transaction"
            );
            return Ok(existing);
        }
        advance(&mut state, req);

        let mut uow = self.store.begin().await?;

        let record = match self.apply(&mut uow, req, &mut state).await {
            Ok(Attempt::Inserted(record)) => record,
            Ok(Attempt::LostIdempotencyRace(key)) => {
                self.abort(uow, req, state).await;
                return self.resolve_lost_race(&key).await;
            }
            Err(e) => {
                self.abort(uow, req, state).await;
                return Err(e);
            }
        };

        if let Err(e) = self.store.commit(uow).await {
            return Err(TransferError::StorageUnavailable(format!(
                "commit of {} failed: {}",
                record.id, e
            )));
        }
        advance(&mut state, req);

        info!(
            transaction_id = %record.id,
            source = record.source_account_id,
            destination = record.destination_account_id,
            amount = record.amount,
            "Transfer committed"
        );
        Ok(record)
    }

    /// Everything between `begin` and `commit`
    async fn apply(
        &self,
        uow: &mut S::UnitOfWork,
        req: &TransferRequest,
        state: &mut TransferState,
    ) -> Result<Attempt, TransferError> {
        let [first_id, second_id] = lock_order(req.source_account_id, req.destination_account_id);
        let first = self.store.lock_for_update(uow, first_id).await?;
        let second = self.store.lock_for_update(uow, second_id).await?;
        let (source, destination) = if first.id == req.source_account_id {
            (first, second)
        } else {
            (second, first)
        };
        advance(state, req);

        if source.balance < req.amount {
            info!(
                account_id = source.id,
                balance = source.balance,
                requested = req.amount,
                "Insufficient funds"
            );
            return Err(TransferError::InsufficientFunds {
                account_id: source.id,
                balance: source.balance,
                requested: req.amount,
            });
        }
        advance(state, req);

        let new_source_balance = source.balance - req.amount;
        let new_destination_balance =
            destination.balance.checked_add(req.amount).ok_or_else(|| {
                TransferError::Internal(format!(
                    "balance overflow crediting account {}",
                    destination.id
                ))
            })?;
        self.store
            .set_balance(uow, source.id, new_source_balance)
            .await?;
        self.store
            .set_balance(uow, destination.id, new_destination_balance)
            .await?;
        advance(state, req);

        let record = TransactionRecord::completed(
            source.id,
            destination.id,
            req.amount,
            req.idempotency_key().map(str::to_owned),
        );
        match self.store.insert_transaction(uow, &record).await {
            Ok(()) => {}
            Err(StoreError::DuplicateKey(key)) => return Ok(Attempt::LostIdempotencyRace(key)),
            Err(e) => return Err(e.into()),
        }
        advance(state, req);

        Ok(Attempt::Inserted(record))
    }

    /// Roll back an attempt; the caller's error wins over a rollback failure
    async fn abort(&self, uow: S::UnitOfWork, req: &TransferRequest, state: TransferState) {
        debug!(
            source = req.source_account_id,
            destination = req.destination_account_id,
            from = %state,
            to = %TransferState::Aborted,
            "Transfer attempt aborted"
        );
        if let Err(e) = self.store.rollback(uow).await {
            warn!(
                store = self.store.name(),
                error = %e,
                "Rollback failed (connection drop rolls back)"
            );
        }
    }

    /// A concurrent request with the same key committed first: its record is
    /// the canonical result.
    async fn resolve_lost_race(&self, key: &str) -> Result<TransactionRecord, TransferError> {
        match self.store.find_transaction_by_idempotency_key(key).await? {
            Some(winner) => {
                info!(
                    idempotency_key = %key,
                    transaction_id = %winner.id,
                    "Lost idempotency race, returning winning transaction"
                );
                Ok(winner)
            }
            // Rejected by the store yet not readable; retrying resolves it
            None => Err(TransferError::StorageUnavailable(format!(
                "idempotency key {} rejected but no committed record is visible",
                key
            ))),
        }
    }
}

fn advance(state: &mut TransferState, req: &TransferRequest) {
    if let Some(next) = state.successor() {
        debug!(
            source = req.source_account_id,
            destination = req.destination_account_id,
            from = %state,
            to = %next,
            "Transfer state transition"
        );
        *state = next;
    }
}
