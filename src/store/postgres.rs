//! PostgreSQL Balance Store
//!
//! Row locks are `SELECT ... FOR UPDATE` inside a sqlx transaction; idempotency
//! uniqueness is the `transactions_idempotency_key_idx` unique index.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::{BalanceStore, StoreError};
use crate::account::{Account, NewAccount, TransactionRecord, TransactionStatus};
use crate::core_types::{AccountId, MinorUnits};

/// Name of the unique index guarding idempotency keys
pub const IDEMPOTENCY_KEY_INDEX: &str = "transactions_idempotency_key_idx";

const CREATE_ACCOUNTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id          BIGINT PRIMARY KEY CHECK (id > 0),
        balance     BIGINT NOT NULL CHECK (balance >= 0),
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const CREATE_TRANSACTIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id                      UUID PRIMARY KEY,
        source_account_id       BIGINT NOT NULL REFERENCES accounts (id),
        destination_account_id  BIGINT NOT NULL REFERENCES accounts (id),
        amount                  BIGINT NOT NULL CHECK (amount > 0),
        status                  TEXT NOT NULL,
        idempotency_key         TEXT,
        created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT transactions_distinct_accounts
            CHECK (source_account_id <> destination_account_id)
    )
"#;

const CREATE_IDEMPOTENCY_INDEX: &str = r#"
    CREATE UNIQUE INDEX IF NOT EXISTS transactions_idempotency_key_idx
        ON transactions (idempotency_key)
"#;

/// Active sqlx transaction; dropping it without commit rolls back
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

/// Balance store backed by PostgreSQL
#[derive(Clone)]
pub struct PgBalanceStore {
    pool: PgPool,
}

impl PgBalanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `accounts` and `transactions` tables if they do not exist
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        tracing::info!("Initializing ledger schema...");

        sqlx::query(CREATE_ACCOUNTS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_TRANSACTIONS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_IDEMPOTENCY_INDEX)
            .execute(&self.pool)
            .await?;

        tracing::info!("Ledger schema initialized");
        Ok(())
    }

    fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
        Ok(Account {
            id: row.try_get("id")?,
            balance: row.try_get("balance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_record(row: &PgRow) -> Result<TransactionRecord, StoreError> {
        let status: String = row.try_get("status")?;
        let status: TransactionStatus = status.parse().map_err(StoreError::Database)?;

        Ok(TransactionRecord {
            id: row.try_get("id")?,
            source_account_id: row.try_get("source_account_id")?,
            destination_account_id: row.try_get("destination_account_id")?,
            amount: row.try_get("amount")?,
            status,
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    type UnitOfWork = PgUnitOfWork;

    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<PgUnitOfWork, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork { tx })
    }

    async fn commit(&self, uow: PgUnitOfWork) -> Result<(), StoreError> {
        uow.tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, uow: PgUnitOfWork) -> Result<(), StoreError> {
        uow.tx.rollback().await?;
        Ok(())
    }

    async fn lock_for_update(
        &self,
        uow: &mut PgUnitOfWork,
        account_id: AccountId,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"SELECT id, balance, created_at, updated_at
               FROM accounts WHERE id = $1
               FOR UPDATE"#,
        )
        .bind(account_id)
        .fetch_optional(&mut *uow.tx)
        .await?;

        match row {
            Some(row) => Self::row_to_account(&row),
            None => Err(StoreError::AccountNotFound(account_id)),
        }
    }

    async fn set_balance(
        &self,
        uow: &mut PgUnitOfWork,
        account_id: AccountId,
        new_balance: MinorUnits,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"UPDATE accounts
               SET balance = $1, updated_at = NOW()
               WHERE id = $2"#,
        )
        .bind(new_balance)
        .bind(account_id)
        .execute(&mut *uow.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound(account_id));
        }
        Ok(())
    }

    async fn insert_transaction(
        &self,
        uow: &mut PgUnitOfWork,
        record: &TransactionRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO transactions
                   (id, source_account_id, destination_account_id, amount, status,
                    idempotency_key, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(record.id)
        .bind(record.source_account_id)
        .bind(record.destination_account_id)
        .bind(record.amount)
        .bind(record.status.as_str())
        .bind(&record.idempotency_key)
        .bind(record.created_at)
        .execute(&mut *uow.tx)
        .await
        .map_err(|e| match (&e, &record.idempotency_key) {
            (sqlx::Error::Database(db), Some(key))
                if db.is_unique_violation()
                    && db.constraint().is_none_or(|c| c == IDEMPOTENCY_KEY_INDEX) =>
            {
                StoreError::DuplicateKey(key.clone())
            }
            _ => StoreError::from(e),
        })?;

        Ok(())
    }

    async fn find_transaction_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let row = sqlx::query(
            r#"SELECT id, source_account_id, destination_account_id, amount, status,
                      idempotency_key, created_at
               FROM transactions WHERE idempotency_key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"SELECT id, balance, created_at, updated_at
               FROM accounts WHERE id = $1"#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    async fn create_account(&self, new_account: NewAccount) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"INSERT INTO accounts (id, balance, created_at, updated_at)
               VALUES ($1, $2, NOW(), NOW())
               RETURNING id, balance, created_at, updated_at"#,
        )
        .bind(new_account.id)
        .bind(new_account.initial_balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::AccountExists(new_account.id)
            }
            _ => StoreError::from(e),
        })?;

        Self::row_to_account(&row)
    }
}
