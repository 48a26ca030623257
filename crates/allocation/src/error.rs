//! Error taxonomy for the allocation engine.

use thiserror::Error;

use arledger_accounting::{AccountId, AccountRole, LedgerError};
use arledger_core::{DomainError, Money};

use crate::credit_memo::CreditMemoId;

pub type AllocationResult<T> = Result<T, AllocationError>;

/// Everything that can stop an allocation commit.
///
/// All variants except `UnbalancedSplit` and `Store` are expected outcomes the
/// caller can fix and retry. Any variant means nothing was persisted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Missing or malformed required field.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Amount is not positive, not representable in cents, or overflows.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient credit on credit memo {credit_memo_id}: requested {requested}, available {available}")]
    InsufficientCredit {
        credit_memo_id: CreditMemoId,
        requested: Money,
        available: Money,
    },

    #[error("account {account_id} has role {actual}, expected {expected}")]
    InvalidAccountRole {
        account_id: AccountId,
        expected: AccountRole,
        actual: AccountRole,
    },

    /// A split set failed the debits == credits check. Indicates a builder defect.
    #[error("unbalanced split set (debits {total_debit}, credits {total_credit})")]
    UnbalancedSplit { total_debit: Money, total_credit: Money },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} is already reversed")]
    AlreadyReversed(String),

    /// Persistence failed; the commit was rolled back.
    #[error("store error: {0}")]
    Store(String),
}

impl AllocationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable machine-readable code, used in API error bodies and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            AllocationError::Validation(_) => "validation_error",
            AllocationError::InvalidAmount(_) => "invalid_amount",
            AllocationError::InsufficientCredit { .. } => "insufficient_credit",
            AllocationError::InvalidAccountRole { .. } => "invalid_account_role",
            AllocationError::UnbalancedSplit { .. } => "unbalanced_split",
            AllocationError::NotFound(_) => "not_found",
            AllocationError::AlreadyReversed(_) => "already_reversed",
            AllocationError::Store(_) => "store_error",
        }
    }

    /// `false` for internal defects and infrastructure failures.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AllocationError::UnbalancedSplit { .. } | AllocationError::Store(_)
        )
    }
}

impl From<DomainError> for AllocationError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                AllocationError::Validation(msg)
            }
            DomainError::InvalidAmount(msg) => AllocationError::InvalidAmount(msg),
            DomainError::InvariantViolation(msg) | DomainError::Conflict(msg) => {
                AllocationError::Validation(msg)
            }
            DomainError::NotFound => AllocationError::NotFound("resource".to_string()),
        }
    }
}

impl From<LedgerError> for AllocationError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InvalidAmount(msg) => AllocationError::InvalidAmount(msg),
            LedgerError::Unbalanced {
                total_debit,
                total_credit,
            } => AllocationError::UnbalancedSplit {
                total_debit,
                total_credit,
            },
            other => AllocationError::Validation(other.to_string()),
        }
    }
}
