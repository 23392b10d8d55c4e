//! Account service: opening accounts and reading balances

use tracing::info;

use super::error::AccountError;
use super::models::{Account, NewAccount};
use crate::core_types::AccountId;
use crate::store::BalanceStore;

/// Account operations outside of a transfer
pub struct AccountService<S: BalanceStore> {
    store: S,
}

impl<S: BalanceStore> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Open a new account with a non-negative starting balance
    pub async fn create_account(&self, new_account: NewAccount) -> Result<Account, AccountError> {
        new_account.validate()?;
        let account = self.store.create_account(new_account).await?;
        info!(
            account_id = account.id,
            balance = account.balance,
            "Account created"
        );
        Ok(account)
    }

    /// Committed state of one account; takes no lock
    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, AccountError> {
        if account_id <= 0 {
            return Err(AccountError::InvalidAccountId(account_id));
        }
        self.store
            .get_account(account_id)
            .await?
            .ok_or(AccountError::AccountNotFound(account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBalanceStore;

    #[tokio::test]
    async fn test_create_and_get_account() {
        let service = AccountService::new(MemoryBalanceStore::new());

        let created = service
            .create_account(NewAccount::new(1, 100_000))
            .await
            .unwrap();
        let fetched = service.get_account(1).await.unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.balance, 100_000);
    }

    #[tokio::test]
    async fn test_create_account_rejections() {
        let service = AccountService::new(MemoryBalanceStore::new());

        assert_eq!(
            service.create_account(NewAccount::new(0, 10)).await,
            Err(AccountError::InvalidAccountId(0))
        );
        assert_eq!(
            service.create_account(NewAccount::new(1, -10)).await,
            Err(AccountError::NegativeBalance)
        );

        service.create_account(NewAccount::new(1, 10)).await.unwrap();
        assert_eq!(
            service.create_account(NewAccount::new(1, 20)).await,
            Err(AccountError::AccountExists(1))
        );
    }

    #[tokio::test]
    async fn test_get_account_errors() {
        let service = AccountService::new(MemoryBalanceStore::new());
        assert_eq!(
            service.get_account(-1).await,
            Err(AccountError::InvalidAccountId(-1))
        );
        assert_eq!(
            service.get_account(42).await,
            Err(AccountError::AccountNotFound(42))
        );
    }
}
