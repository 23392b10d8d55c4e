//! Core types used throughout the ledger
//!
//! Type aliases that give plain integers a domain meaning.

/// Account ID - externally assigned, positive and unique.
///
/// # Constraints:
/// - **Immutable**: Once an account is created its id NEVER changes
/// - **Totally ordered**: Lock acquisition order is derived from `Ord` on this type
pub type AccountId = i64;

/// Amount in minor currency units (cents).
///
/// All balance arithmetic happens on this type. Decimal currency values only
/// exist at the boundary (see [`crate::money`]).
pub type MinorUnits = i64;

/// Transaction ID - random v4 UUID assigned when a transfer record is built
pub type TransactionId = uuid::Uuid;
