//! Allocation record store: applied credits, applied discounts, their posted
//! ledger splits, and credit memo balances.
//!
//! Every `commit_*` method is one atomic unit. Either the record change, the split
//! set, and (for credits) the credit memo balance change all land, or none do.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use arledger_accounting::SplitSet;
use arledger_allocation::{
    AllocationError, AllocationKind, AppliedCredit, AppliedCreditId, AppliedDiscount,
    AppliedDiscountId, CreditMemo, CreditMemoId, CustomerId, InvoiceId,
};
use arledger_core::{Money, TenantId};

pub use in_memory::InMemoryAllocationStore;
pub use postgres::PostgresAllocationStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// Conditional decrement failed: the memo no longer covers the amount.
    #[error("credit memo {credit_memo_id} has {available} available, {requested} requested")]
    InsufficientCredit {
        credit_memo_id: CreditMemoId,
        requested: Money,
        available: Money,
    },

    /// The record is no longer active, so it cannot be reversed again.
    #[error("{0} is not active")]
    NotActive(String),

    /// A uniqueness or check constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AllocationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => AllocationError::NotFound(what),
            StoreError::InsufficientCredit {
                credit_memo_id,
                requested,
                available,
            } => AllocationError::InsufficientCredit {
                credit_memo_id,
                requested,
                available,
            },
            StoreError::NotActive(what) => AllocationError::AlreadyReversed(what),
            StoreError::Constraint(msg) | StoreError::Backend(msg) => AllocationError::Store(msg),
        }
    }
}

/// Whether a posted split set records an application or undoes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitSetKind {
    Application,
    Reversal,
}

impl SplitSetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitSetKind::Application => "application",
            SplitSetKind::Reversal => "reversal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "application" => Some(SplitSetKind::Application),
            "reversal" => Some(SplitSetKind::Reversal),
            _ => None,
        }
    }
}

/// A balanced split set as persisted for an allocation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedSplitSet {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub allocation_kind: AllocationKind,
    pub kind: SplitSetKind,
    pub date: NaiveDate,
    pub posted_at: DateTime<Utc>,
    pub split_set: SplitSet,
}

impl PostedSplitSet {
    pub fn new(
        allocation_id: Uuid,
        allocation_kind: AllocationKind,
        kind: SplitSetKind,
        date: NaiveDate,
        posted_at: DateTime<Utc>,
        split_set: SplitSet,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            allocation_id,
            allocation_kind,
            kind,
            date,
            posted_at,
            split_set,
        }
    }
}

/// Active and inactive records of one invoice, read from one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceAllocations {
    pub credits: Vec<AppliedCredit>,
    pub discounts: Vec<AppliedDiscount>,
}

#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Issue a credit memo (seed/test path; issuance is owned elsewhere).
    async fn register_credit_memo(
        &self,
        tenant_id: TenantId,
        memo: CreditMemo,
    ) -> Result<(), StoreError>;

    async fn credit_memo(
        &self,
        tenant_id: TenantId,
        credit_memo_id: CreditMemoId,
    ) -> Result<Option<CreditMemo>, StoreError>;

    /// The customer's memos with something left to apply.
    async fn list_available_credits(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<Vec<CreditMemo>, StoreError>;

    async fn applied_credit(
        &self,
        tenant_id: TenantId,
        id: AppliedCreditId,
    ) -> Result<Option<AppliedCredit>, StoreError>;

    async fn applied_discount(
        &self,
        tenant_id: TenantId,
        id: AppliedDiscountId,
    ) -> Result<Option<AppliedDiscount>, StoreError>;

    /// All records of an invoice, ordered by `date` then `created_at`.
    async fn invoice_allocations(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceAllocations, StoreError>;

    /// Posted split sets of one allocation record, oldest first.
    async fn splits_for(
        &self,
        tenant_id: TenantId,
        allocation_id: Uuid,
    ) -> Result<Vec<PostedSplitSet>, StoreError>;

    /// Insert an active applied credit with its splits and draw its amount from
    /// the credit memo, failing with `InsufficientCredit` if the memo no longer
    /// covers it.
    async fn commit_credit_application(
        &self,
        tenant_id: TenantId,
        credit: &AppliedCredit,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError>;

    /// Flip an active applied credit to inactive, post its reversal and hand the
    /// amount back to the credit memo. `NotActive` if it was already reversed.
    async fn commit_credit_reversal(
        &self,
        tenant_id: TenantId,
        credit: &AppliedCredit,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError>;

    async fn commit_discount_application(
        &self,
        tenant_id: TenantId,
        discount: &AppliedDiscount,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError>;

    async fn commit_discount_reversal(
        &self,
        tenant_id: TenantId,
        discount: &AppliedDiscount,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError>;
}

pub(crate) fn sort_credits(credits: &mut [AppliedCredit]) {
    credits.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));
}

pub(crate) fn sort_discounts(discounts: &mut [AppliedDiscount]) {
    discounts.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));
}
