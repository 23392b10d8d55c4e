//! Account Error Types

use thiserror::Error;

use crate::core_types::AccountId;
use crate::store::StoreError;

/// Account operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Invalid account ID: {0}")]
    InvalidAccountId(AccountId),

    #[error("Balance cannot be negative")]
    NegativeBalance,

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account already exists: {0}")]
    AccountExists(AccountId),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal system error: {0}")]
    Internal(String),
}

impl AccountError {
    /// Get the error code for client responses
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::InvalidAccountId(_) => "INVALID_ACCOUNT_ID",
            AccountError::NegativeBalance => "NEGATIVE_BALANCE",
            AccountError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            AccountError::AccountExists(_) => "ACCOUNT_EXISTS",
            AccountError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AccountError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(id) => AccountError::AccountNotFound(id),
            StoreError::AccountExists(id) => AccountError::AccountExists(id),
            StoreError::Unavailable(msg) => AccountError::StorageUnavailable(msg),
            other => AccountError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AccountError::NegativeBalance.code(), "NEGATIVE_BALANCE");
        assert_eq!(AccountError::AccountExists(1).code(), "ACCOUNT_EXISTS");
    }

    #[test]
    fn test_from_store_error() {
        assert_eq!(
            AccountError::from(StoreError::AccountExists(4)),
            AccountError::AccountExists(4)
        );
        assert_eq!(
            AccountError::from(StoreError::Unavailable("pool timed out".into())),
            AccountError::StorageUnavailable("pool timed out".into())
        );
        assert!(matches!(
            AccountError::from(StoreError::Database("syntax".into())),
            AccountError::Internal(_)
        ));
    }
}
