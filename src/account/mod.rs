//! Account management module
//!
//! Account rows, transaction records and the account service.

pub mod error;
pub mod models;
pub mod service;

// Re-export commonly used types
pub use error::AccountError;
pub use models::{Account, NewAccount, TransactionRecord, TransactionStatus};
pub use service::AccountService;
