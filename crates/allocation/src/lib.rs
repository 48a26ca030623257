//! Allocation domain module: credit memos, applied credits, applied discounts.
//!
//! This crate holds the business rules for allocating credit memos and discounts
//! against invoices, implemented as deterministic domain logic (no IO, no HTTP,
//! no storage). The commit path that persists records, splits and credit memo
//! balances together lives in `arledger-infra`.

pub mod applied_credit;
pub mod applied_discount;
pub mod credit_memo;
pub mod error;
pub mod invoice;
pub mod splits;
pub mod status;

#[cfg(test)]
mod test_support;

pub use applied_credit::{
    AppliedCredit, AppliedCreditCommand, AppliedCreditEvent, AppliedCreditId, ApplyCredit,
    CreditApplied, CreditReversed, ReverseCredit,
};
pub use applied_discount::{
    AppliedDiscount, AppliedDiscountCommand, AppliedDiscountEvent, AppliedDiscountId,
    ApplyDiscount, DiscountApplied, DiscountReversed, ReverseDiscount,
};
pub use credit_memo::{CreditMemo, CreditMemoId};
pub use error::{AllocationError, AllocationResult};
pub use invoice::{CustomerId, Invoice, InvoiceId, InvoiceSummary, UnitId};
pub use splits::{
    build_credit_application_splits, build_discount_application_splits, build_reversal_splits,
    draft_credit_application_splits, draft_discount_application_splits, ensure_account_role,
};
pub use status::{AllocationKind, AllocationStatus};
