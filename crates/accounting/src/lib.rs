//! Accounting module: accounts, double-entry split lines, split sets.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod split;

pub use account::{Account, AccountId, AccountRole};
pub use split::{LedgerError, LineParty, Side, SplitLine, SplitSet, SplitSetBuilder};
