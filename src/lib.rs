//! Atomic Ledger - all-or-nothing money transfers between account balances
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (AccountId, MinorUnits, etc.)
//! - [`money`] - Decimal ⇄ minor-unit conversion at the boundary
//! - [`account`] - Account and transaction record models, account service
//! - [`store`] - Balance store contract with PostgreSQL and in-memory backends
//! - [`transfer`] - Transfer orchestrator
//! - [`db`] - PostgreSQL connection pool
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

pub mod account;
pub mod money;
pub mod store;
pub mod transfer;

// Infrastructure
pub mod config;
pub mod db;
pub mod logging;

// Convenient re-exports at crate root
pub use account::{Account, AccountError, AccountService, NewAccount, TransactionRecord};
pub use core_types::{AccountId, MinorUnits, TransactionId};
pub use store::{BalanceStore, MemoryBalanceStore, PgBalanceStore, StoreError};
pub use transfer::{TransferError, TransferRequest, TransferService};
