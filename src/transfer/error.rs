//! Transfer Error Types
//!
//! Validation and business rejections are kept distinguishable from transient
//! infrastructure failures so callers know whether a retry is useful. A lost
//! idempotency race is resolved inside the orchestrator and has no variant.

use thiserror::Error;

use crate::core_types::{AccountId, MinorUnits};
use crate::store::StoreError;

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Invalid account ID: {0}")]
    InvalidAccountId(AccountId),

    #[error("Source and destination accounts cannot be the same")]
    SameAccount,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    // === Account Errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: MinorUnits,
        requested: MinorUnits,
    },

    // === System Errors ===
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Transfer timed out")]
    Timeout,

    #[error("Internal system error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Get the error code for client responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAccountId(_) => "INVALID_ACCOUNT_ID",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            TransferError::Timeout => "TIMEOUT",
            TransferError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Bad input; the request touched no state
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TransferError::InvalidAccountId(_)
                | TransferError::SameAccount
                | TransferError::InvalidAmount
        )
    }

    /// Safe to retry with the same idempotency key
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::StorageUnavailable(_) | TransferError::Timeout
        )
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(id) => TransferError::AccountNotFound(id),
            StoreError::Unavailable(msg) => TransferError::StorageUnavailable(msg),
            other => TransferError::Internal(other.to_string()),
        }
    }
}
