//! In-Memory Balance Store
//!
//! Same contract as the PostgreSQL store, kept in process memory:
//! - each account row owns an async mutex that a unit of work holds from
//!   `lock_for_update` until commit/rollback
//! - balance writes and inserts are staged on the unit of work and published
//!   in one critical section at commit
//! - idempotency keys are reserved at insert time; a second insert with the
//!   same key waits for the holder to commit (then fails with `DuplicateKey`)
//!   or roll back (then takes the key), like a unique index
//!
//! The committed state sits behind a `std::sync::Mutex` that is never held
//! across an `.await`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use super::{BalanceStore, StoreError};
use crate::account::{Account, NewAccount, TransactionRecord};
use crate::core_types::{AccountId, MinorUnits};

struct AccountRow {
    account: Account,
    lock: Arc<RowLock<()>>,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<AccountId, AccountRow>,
    transactions: Vec<TransactionRecord>,
    /// idempotency key -> index into `transactions`
    idempotency_index: HashMap<String, usize>,
    /// Keys inserted by units of work that have not committed yet; the holder
    /// keeps the lock until it commits or rolls back
    reserved_keys: HashMap<String, Arc<RowLock<()>>>,
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Unit of work over [`MemoryBalanceStore`]
///
/// Dropping it releases its row locks and key reservations, discarding
/// every staged write. Reservations leave the shared map before their guards
/// are released, so woken waiters see the final state.
pub struct MemoryUnitOfWork {
    state: Arc<Mutex<MemoryState>>,
    row_locks: HashMap<AccountId, OwnedMutexGuard<()>>,
    staged_balances: HashMap<AccountId, MinorUnits>,
    staged_records: Vec<TransactionRecord>,
    reserved_keys: HashMap<String, OwnedMutexGuard<()>>,
}

impl MemoryUnitOfWork {
    /// Number of account rows currently locked by this unit of work
    pub fn locked_rows(&self) -> usize {
        self.row_locks.len()
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if self.reserved_keys.is_empty() {
            return;
        }
        let mut state = lock_state(&self.state);
        for key in self.reserved_keys.keys() {
            state.reserved_keys.remove(key);
        }
    }
}

/// Balance store kept entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryBalanceStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All committed transaction records, in commit order
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        lock_state(&self.state).transactions.clone()
    }

    /// Sum of all committed balances
    pub fn total_balance(&self) -> MinorUnits {
        lock_state(&self.state)
            .accounts
            .values()
            .map(|row| row.account.balance)
            .sum()
    }
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    type UnitOfWork = MemoryUnitOfWork;

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<MemoryUnitOfWork, StoreError> {
        Ok(MemoryUnitOfWork {
            state: self.state.clone(),
            row_locks: HashMap::new(),
            staged_balances: HashMap::new(),
            staged_records: Vec::new(),
            reserved_keys: HashMap::new(),
        })
    }

    async fn commit(&self, mut uow: MemoryUnitOfWork) -> Result<(), StoreError> {
        {
            let mut state = lock_state(&self.state);
            let now = Utc::now();

            for (account_id, balance) in uow.staged_balances.drain() {
                if let Some(row) = state.accounts.get_mut(&account_id) {
                    row.account.balance = balance;
                    row.account.updated_at = now;
                }
            }

            for record in uow.staged_records.drain(..) {
                if let Some(key) = &record.idempotency_key {
                    state.reserved_keys.remove(key);
                    let index = state.transactions.len();
                    state.idempotency_index.insert(key.clone(), index);
                }
                state.transactions.push(record);
            }
        }

        // Published; reservations were consumed above, so releasing the key
        // guards wakes waiters into `DuplicateKey`. Row locks go with `uow`.
        uow.reserved_keys.clear();
        drop(uow);
        Ok(())
    }

    async fn rollback(&self, uow: MemoryUnitOfWork) -> Result<(), StoreError> {
        drop(uow);
        Ok(())
    }

    async fn lock_for_update(
        &self,
        uow: &mut MemoryUnitOfWork,
        account_id: AccountId,
    ) -> Result<Account, StoreError> {
        if !uow.row_locks.contains_key(&account_id) {
            let row_lock = {
                let state = lock_state(&self.state);
                state
                    .accounts
                    .get(&account_id)
                    .map(|row| row.lock.clone())
                    .ok_or(StoreError::AccountNotFound(account_id))?
            };
            let guard = row_lock.lock_owned().await;
            uow.row_locks.insert(account_id, guard);
        }

        let state = lock_state(&self.state);
        let mut account = state
            .accounts
            .get(&account_id)
            .map(|row| row.account.clone())
            .ok_or(StoreError::AccountNotFound(account_id))?;
        if let Some(staged) = uow.staged_balances.get(&account_id) {
            account.balance = *staged;
        }
        Ok(account)
    }

    async fn set_balance(
        &self,
        uow: &mut MemoryUnitOfWork,
        account_id: AccountId,
        new_balance: MinorUnits,
    ) -> Result<(), StoreError> {
        if !lock_state(&self.state).accounts.contains_key(&account_id) {
            return Err(StoreError::AccountNotFound(account_id));
        }
        if new_balance < 0 {
            return Err(StoreError::Database(format!(
                "balance check violated for account {}: {}",
                account_id, new_balance
            )));
        }
        uow.staged_balances.insert(account_id, new_balance);
        Ok(())
    }

    async fn insert_transaction(
        &self,
        uow: &mut MemoryUnitOfWork,
        record: &TransactionRecord,
    ) -> Result<(), StoreError> {
        if let Some(key) = &record.idempotency_key {
            loop {
                let key_lock = Arc::new(RowLock::new(()));
                let guard = key_lock.clone().lock_owned().await;

                let holder = {
                    let mut state = lock_state(&self.state);
                    if state.idempotency_index.contains_key(key)
                        || uow.reserved_keys.contains_key(key)
                    {
                        return Err(StoreError::DuplicateKey(key.clone()));
                    }
                    if let Some(holder) = state.reserved_keys.get(key).cloned() {
                        holder
                    } else {
                        state.reserved_keys.insert(key.clone(), key_lock);
                        uow.reserved_keys.insert(key.clone(), guard);
                        break;
                    }
                };

                // Another unit of work holds the key: wait for it to finish
                drop(holder.lock().await);
            }
        }
        uow.staged_records.push(record.clone());
        Ok(())
    }

    async fn find_transaction_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let state = lock_state(&self.state);
        Ok(state
            .idempotency_index
            .get(key)
            .and_then(|&index| state.transactions.get(index))
            .cloned())
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(lock_state(&self.state)
            .accounts
            .get(&account_id)
            .map(|row| row.account.clone()))
    }

    async fn create_account(&self, new_account: NewAccount) -> Result<Account, StoreError> {
        if new_account.id <= 0 || new_account.initial_balance < 0 {
            return Err(StoreError::Database(format!(
                "account check violated for account {}: balance {}",
                new_account.id, new_account.initial_balance
            )));
        }

        let mut state = lock_state(&self.state);
        if state.accounts.contains_key(&new_account.id) {
            return Err(StoreError::AccountExists(new_account.id));
        }

        let now = Utc::now();
        let account = Account {
            id: new_account.id,
            balance: new_account.initial_balance,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(
            account.id,
            AccountRow {
                account: account.clone(),
                lock: Arc::new(RowLock::new(())),
            },
        );
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn store_with(accounts: &[(AccountId, MinorUnits)]) -> MemoryBalanceStore {
        let store = MemoryBalanceStore::new();
        for &(id, balance) in accounts {
            store
                .create_account(NewAccount::new(id, balance))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_create_account_rejects_duplicate_id() {
        let store = store_with(&[(1, 100)]).await;
        let result = store.create_account(NewAccount::new(1, 5)).await;
        assert_eq!(result, Err(StoreError::AccountExists(1)));
        assert_eq!(store.get_account(1).await.unwrap().unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_staged_balance_invisible_until_commit() {
        let store = store_with(&[(1, 100)]).await;

        let mut uow = store.begin().await.unwrap();
        store.lock_for_update(&mut uow, 1).await.unwrap();
        store.set_balance(&mut uow, 1, 40).await.unwrap();

        // Own unit of work sees the staged value, others see committed state
        assert_eq!(store.lock_for_update(&mut uow, 1).await.unwrap().balance, 40);
        assert_eq!(store.get_account(1).await.unwrap().unwrap().balance, 100);

        store.commit(uow).await.unwrap();
        assert_eq!(store.get_account(1).await.unwrap().unwrap().balance, 40);
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_writes() {
        let store = store_with(&[(1, 100), (2, 0)]).await;

        let mut uow = store.begin().await.unwrap();
        store.lock_for_update(&mut uow, 1).await.unwrap();
        store.set_balance(&mut uow, 1, 0).await.unwrap();
        store.rollback(uow).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        store.lock_for_update(&mut uow, 2).await.unwrap();
        store.set_balance(&mut uow, 2, 999).await.unwrap();
        let record = TransactionRecord::completed(1, 2, 1, Some("dropped".into()));
        store.insert_transaction(&mut uow, &record).await.unwrap();
        drop(uow);

        assert_eq!(store.get_account(1).await.unwrap().unwrap().balance, 100);
        assert_eq!(store.get_account(2).await.unwrap().unwrap().balance, 0);
        assert!(store.transactions().is_empty());

        // Reservation released with the dropped unit of work
        let mut uow = store.begin().await.unwrap();
        let retry = TransactionRecord::completed(1, 2, 1, Some("dropped".into()));
        assert!(store.insert_transaction(&mut uow, &retry).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_for_update_missing_account() {
        let store = store_with(&[(1, 100)]).await;
        let mut uow = store.begin().await.unwrap();
        assert_eq!(
            store.lock_for_update(&mut uow, 9).await,
            Err(StoreError::AccountNotFound(9))
        );
        assert_eq!(
            store.set_balance(&mut uow, 9, 1).await,
            Err(StoreError::AccountNotFound(9))
        );
        assert_eq!(uow.locked_rows(), 0);
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_unit_of_work() {
        let store = store_with(&[(1, 100)]).await;

        let mut first = store.begin().await.unwrap();
        store.lock_for_update(&mut first, 1).await.unwrap();
        store.set_balance(&mut first, 1, 70).await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut second = store.begin().await.unwrap();
                let account = store.lock_for_update(&mut second, 1).await.unwrap();
                store.rollback(second).await.unwrap();
                account.balance
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished(), "second lock must wait");

        store.commit(first).await.unwrap();
        // Reads the value committed by the lock holder
        assert_eq!(contender.await.unwrap(), 70);
    }

    #[tokio::test]
    async fn test_in_flight_key_waits_for_commit() {
        let store = store_with(&[(1, 100), (2, 0)]).await;

        let mut first = store.begin().await.unwrap();
        let record = TransactionRecord::completed(1, 2, 10, Some("k1".into()));
        store.insert_transaction(&mut first, &record).await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut second = store.begin().await.unwrap();
                let dup = TransactionRecord::completed(1, 2, 10, Some("k1".into()));
                store.insert_transaction(&mut second, &dup).await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished(), "insert must wait for the key holder");
        assert!(
            store
                .find_transaction_by_idempotency_key("k1")
                .await
                .unwrap()
                .is_none()
        );

        store.commit(first).await.unwrap();
        assert_eq!(
            contender.await.unwrap(),
            Err(StoreError::DuplicateKey("k1".into()))
        );

        // Committed keys are rejected without waiting
        let mut third = store.begin().await.unwrap();
        let dup = TransactionRecord::completed(1, 2, 10, Some("k1".into()));
        assert_eq!(
            store.insert_transaction(&mut third, &dup).await,
            Err(StoreError::DuplicateKey("k1".into()))
        );
        let found = store
            .find_transaction_by_idempotency_key("k1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, record.id);
    }

    #[tokio::test]
    async fn test_in_flight_key_taken_over_after_rollback() {
        let store = store_with(&[(1, 100), (2, 0)]).await;

        let mut first = store.begin().await.unwrap();
        let abandoned = TransactionRecord::completed(1, 2, 10, Some("k2".into()));
        store.insert_transaction(&mut first, &abandoned).await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut second = store.begin().await.unwrap();
                let record = TransactionRecord::completed(1, 2, 20, Some("k2".into()));
                store.insert_transaction(&mut second, &record).await?;
                store.commit(second).await?;
                Ok::<_, StoreError>(record)
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        store.rollback(first).await.unwrap();
        let winner = contender.await.unwrap().unwrap();

        let found = store
            .find_transaction_by_idempotency_key("k2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, winner.id);
        assert_eq!(found.amount, 20);
        assert_eq!(store.transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_same_unit_of_work_key_reuse_rejected() {
        let store = store_with(&[(1, 100), (2, 0)]).await;
        let mut uow = store.begin().await.unwrap();
        let a = TransactionRecord::completed(1, 2, 1, Some("k3".into()));
        let b = TransactionRecord::completed(1, 2, 1, Some("k3".into()));
        store.insert_transaction(&mut uow, &a).await.unwrap();
        assert_eq!(
            store.insert_transaction(&mut uow, &b).await,
            Err(StoreError::DuplicateKey("k3".into()))
        );
    }

    #[tokio::test]
    async fn test_create_account_rejects_negative_balance() {
        let store = MemoryBalanceStore::new();
        assert!(matches!(
            store.create_account(NewAccount::new(1, -1)).await,
            Err(StoreError::Database(_))
        ));
        assert!(matches!(
            store.create_account(NewAccount::new(0, 10)).await,
            Err(StoreError::Database(_))
        ));
        assert_eq!(store.get_account(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_records_without_key_never_collide() {
        let store = store_with(&[(1, 100), (2, 0)]).await;
        let mut uow = store.begin().await.unwrap();
        for _ in 0..3 {
            let record = TransactionRecord::completed(1, 2, 1, None);
            store.insert_transaction(&mut uow, &record).await.unwrap();
        }
        store.commit(uow).await.unwrap();
        assert_eq!(store.transactions().len(), 3);
    }

    #[tokio::test]
    async fn test_negative_balance_rejected() {
        let store = store_with(&[(1, 100)]).await;
        let mut uow = store.begin().await.unwrap();
        store.lock_for_update(&mut uow, 1).await.unwrap();
        assert!(matches!(
            store.set_balance(&mut uow, 1, -1).await,
            Err(StoreError::Database(_))
        ));
    }
}
