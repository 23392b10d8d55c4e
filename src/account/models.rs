//! Data models for accounts and transfer records

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::AccountError;
use crate::core_types::{AccountId, MinorUnits, TransactionId};

/// Account balance row
///
/// `balance` is never negative in any committed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: MinorUnits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of a persisted transfer record
///
/// Failed attempts never produce a record, so `Completed` is the only value
/// that is ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(TransactionStatus::Completed),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// Immutable record of an applied balance movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: MinorUnits,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Build a completed record with a freshly generated id
    ///
    /// `created_at` is truncated to microseconds, the precision PostgreSQL keeps.
    pub fn completed(
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: MinorUnits,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            source_account_id,
            destination_account_id,
            amount,
            status: TransactionStatus::Completed,
            idempotency_key,
            created_at: Utc::now().trunc_subsecs(6),
        }
    }
}

/// Request to open a new account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NewAccount {
    pub id: AccountId,
    pub initial_balance: MinorUnits,
}

impl NewAccount {
    pub fn new(id: AccountId, initial_balance: MinorUnits) -> Self {
        Self {
            id,
            initial_balance,
        }
    }

    pub fn validate(&self) -> Result<(), AccountError> {
        if self.id <= 0 {
            return Err(AccountError::InvalidAccountId(self.id));
        }
        if self.initial_balance < 0 {
            return Err(AccountError::NegativeBalance);
        }
        Ok(())
    }
}
