//! Transfer Core Types

use serde::Deserialize;

use super::error::TransferError;
use crate::core_types::{AccountId, MinorUnits};

/// A single transfer intent, amounts already converted to minor units
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: MinorUnits,
    /// Client idempotency key; empty is treated as absent
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    pub fn new(
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: MinorUnits,
    ) -> Self {
        Self {
            source_account_id,
            destination_account_id,
            amount,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// The idempotency key, if present and non-empty
    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Check the request shape. Performs no I/O.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.source_account_id <= 0 {
            return Err(TransferError::InvalidAccountId(self.source_account_id));
        }
        if self.destination_account_id <= 0 {
            return Err(TransferError::InvalidAccountId(
                self.destination_account_id,
            ));
        }
        if self.source_account_id == self.destination_account_id {
            return Err(TransferError::SameAccount);
        }
        if self.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }
        Ok(())
    }
}

/// Canonical lock acquisition order for a pair of accounts: ascending id.
///
/// Independent of which side is source or destination, so two transfers over
/// the same pair always contend on the same first row.
#[inline]
pub fn lock_order(a: AccountId, b: AccountId) -> [AccountId; 2] {
    if a <= b { [a, b] } else { [b, a] }
}
