//! Ledger postings for credit and discount applications.
//!
//! `draft_*` functions only lay out lines (preview path, may be unbalanced or carry
//! zero amounts). `build_*` functions add the commit-path checks: positive amount,
//! account roles, and the debits == credits invariant.

use arledger_accounting::{Account, AccountRole, SplitSet, SplitSetBuilder};
use arledger_core::Money;

use crate::credit_memo::CreditMemo;
use crate::error::{AllocationError, AllocationResult};
use crate::invoice::Invoice;

/// Fail with `InvalidAccountRole` unless `account` plays `expected`.
pub fn ensure_account_role(account: &Account, expected: AccountRole) -> AllocationResult<()> {
    let actual = account.effective_role();
    if actual != expected {
        return Err(AllocationError::InvalidAccountRole {
            account_id: account.id,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Credit AR for the invoice's customer/unit, debit the memo's clearing account.
pub fn draft_credit_application_splits(
    invoice: &Invoice,
    credit_memo: &CreditMemo,
    ar_account: &Account,
    clearing_account: &Account,
    amount: Money,
    description: &str,
) -> SplitSet {
    SplitSetBuilder::new(credit_description(invoice, credit_memo, description))
        .credit(ar_account, amount, invoice.line_party())
        .debit(clearing_account, amount, Default::default())
        .draft()
}

/// Credit AR for the invoice's customer/unit, debit the income account.
pub fn draft_discount_application_splits(
    invoice: &Invoice,
    amount: Money,
    ar_account: &Account,
    income_account: &Account,
    description: &str,
) -> SplitSet {
    SplitSetBuilder::new(discount_description(invoice, description))
        .credit(ar_account, amount, invoice.line_party())
        .debit(income_account, amount, Default::default())
        .draft()
}

pub fn build_credit_application_splits(
    invoice: &Invoice,
    credit_memo: &CreditMemo,
    ar_account: &Account,
    clearing_account: &Account,
    amount: Money,
    description: &str,
) -> AllocationResult<SplitSet> {
    amount.ensure_positive()?;
    ensure_account_role(ar_account, AccountRole::Receivable)?;

    let set = draft_credit_application_splits(
        invoice,
        credit_memo,
        ar_account,
        clearing_account,
        amount,
        description,
    );
    set.validate()?;
    Ok(set)
}

pub fn build_discount_application_splits(
    invoice: &Invoice,
    amount: Money,
    ar_account: &Account,
    income_account: &Account,
    description: &str,
) -> AllocationResult<SplitSet> {
    amount.ensure_positive()?;
    ensure_account_role(ar_account, AccountRole::Receivable)?;
    ensure_account_role(income_account, AccountRole::Income)?;

    let set = draft_discount_application_splits(
        invoice,
        amount,
        ar_account,
        income_account,
        description,
    );
    set.validate()?;
    Ok(set)
}

/// Reversing posting: same lines with debit and credit swapped.
pub fn build_reversal_splits(application: &SplitSet) -> AllocationResult<SplitSet> {
    let reversal = application.reversed(format!("Reversal: {}", application.description()));
    reversal.validate()?;
    Ok(reversal)
}

fn credit_description(invoice: &Invoice, memo: &CreditMemo, description: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        format!("Credit memo {} applied to invoice {}", memo.description, invoice.number)
    } else {
        description.to_string()
    }
}

fn discount_description(invoice: &Invoice, description: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        format!("Discount on invoice {}", invoice.number)
    } else {
        description.to_string()
    }
}
