//! Invoices as seen by the allocation engine, and the derived financial summary.
//!
//! Invoices are issued elsewhere; this module only reads them. The due amount is
//! never stored: it is recomputed from its inputs every time it is asked for.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use arledger_accounting::{AccountId, LineParty};
use arledger_core::{domain_id, Money};

use crate::applied_credit::AppliedCredit;
use crate::applied_discount::AppliedDiscount;
use crate::error::AllocationResult;

domain_id!(
    /// Invoice identifier (tenant-scoped via the tenant passed alongside it).
    InvoiceId
);

domain_id!(
    /// Customer ("people") an invoice and its credit memos belong to.
    CustomerId
);

domain_id!(
    /// Optional sub-ledger dimension (e.g. a rented unit) an invoice is billed for.
    UnitId
);

/// Invoice fields the allocation engine depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer_id: CustomerId,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    pub number: String,
    pub date: NaiveDate,
    /// Gross invoice amount.
    pub amount: Money,
    /// Balance carried over from earlier invoices.
    #[serde(default)]
    pub previous_balance: Money,
    /// Receivable account the invoice was posted to.
    pub ar_account_id: AccountId,
}

impl Invoice {
    /// Dimensions carried by the receivable line of any posting against this invoice.
    pub fn line_party(&self) -> LineParty {
        LineParty {
            people_id: Some(*self.customer_id.as_uuid()),
            unit_id: self.unit_id.map(|u| *u.as_uuid()),
        }
    }
}

/// Financial summary of an invoice (feeds the print view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub invoice_amount: Money,
    pub previous_balance: Money,
    pub paid_amount: Money,
    pub applied_credits_total: Money,
    pub applied_discounts_total: Money,
    /// `invoice_amount + previous_balance - paid - credits - discounts`; may be
    /// negative when an invoice is over-credited.
    pub due_amount: Money,
}

impl InvoiceSummary {
    /// Combine an invoice with its payments and allocation records.
    ///
    /// Only `Active` records count. An invoice without any records goes through
    /// the same arithmetic with zero totals.
    pub fn compute<'a>(
        invoice: &Invoice,
        paid_amount: Money,
        credits: impl IntoIterator<Item = &'a AppliedCredit>,
        discounts: impl IntoIterator<Item = &'a AppliedDiscount>,
    ) -> AllocationResult<Self> {
        let applied_credits_total = Money::try_sum(
            credits
                .into_iter()
                .filter(|c| c.status.is_active())
                .map(|c| c.amount),
        )?;
        let applied_discounts_total = Money::try_sum(
            discounts
                .into_iter()
                .filter(|d| d.status.is_active())
                .map(|d| d.amount),
        )?;

        let due_amount = invoice
            .amount
            .try_add(invoice.previous_balance)?
            .try_sub(paid_amount)?
            .try_sub(applied_credits_total)?
            .try_sub(applied_discounts_total)?;

        Ok(Self {
            invoice_id: invoice.id,
            invoice_number: invoice.number.clone(),
            invoice_amount: invoice.amount,
            previous_balance: invoice.previous_balance,
            paid_amount,
            applied_credits_total,
            applied_discounts_total,
            due_amount,
        })
    }

    /// Whether one more allocation of `amount` still yields a representable summary.
    pub fn ensure_room_for(&self, amount: Money) -> AllocationResult<()> {
        self.due_amount.try_sub(amount)?;
        self.applied_credits_total
            .try_add(self.applied_discounts_total)?
            .try_add(amount)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::AllocationStatus;
    use crate::test_support::{applied_credit, applied_discount, invoice};

    #[test]
    fn no_records_means_gross_plus_previous_minus_paid() {
        let inv = invoice(10_000, 2_000);
        let summary = InvoiceSummary::compute(&inv, Money::from_cents(3_000), [], []).unwrap();

        assert_eq!(summary.applied_credits_total, Money::ZERO);
        assert_eq!(summary.applied_discounts_total, Money::ZERO);
        assert_eq!(summary.due_amount, Money::from_cents(9_000));
    }

    #[test]
    fn inactive_records_are_ignored() {
        let inv = invoice(10_000, 0);
        let active = applied_credit(&inv, 2_500, AllocationStatus::Active);
        let reversed = applied_credit(&inv, 1_000, AllocationStatus::Inactive);
        let discount = applied_discount(&inv, 1_000, AllocationStatus::Active);
        let reversed_discount = applied_discount(&inv, 500, AllocationStatus::Inactive);

        let summary = InvoiceSummary::compute(
            &inv,
            Money::ZERO,
            [&active, &reversed],
            [&discount, &reversed_discount],
        )
        .unwrap();

        assert_eq!(summary.applied_credits_total, Money::from_cents(2_500));
        assert_eq!(summary.applied_discounts_total, Money::from_cents(1_000));
        assert_eq!(summary.due_amount, Money::from_cents(6_500));
    }

    #[test]
    fn over_credited_invoice_goes_negative() {
        let inv = invoice(1_000, 0);
        let credit = applied_credit(&inv, 1_500, AllocationStatus::Active);
        let summary = InvoiceSummary::compute(&inv, Money::ZERO, [&credit], []).unwrap();
        assert_eq!(summary.due_amount, Money::from_cents(-500));
    }

    #[test]
    fn totals_beyond_the_money_range_are_invalid_amounts() {
        let inv = invoice(10_000, 0);
        let huge = applied_discount(&inv, 5_000_000_000_000_000_000, AllocationStatus::Active);
        let again = applied_discount(&inv, 5_000_000_000_000_000_000, AllocationStatus::Active);

        let err = InvoiceSummary::compute(&inv, Money::ZERO, [], [&huge, &again]).unwrap_err();
        assert_eq!(err.code(), "invalid_amount");

        let summary = InvoiceSummary::compute(&inv, Money::ZERO, [], [&huge]).unwrap();
        assert_eq!(
            summary.ensure_room_for(Money::from_cents(5_000_000_000_000_000_000)).unwrap_err().code(),
            "invalid_amount"
        );
        assert!(summary.ensure_room_for(Money::from_cents(1_000)).is_ok());
    }

    #[test]
    fn line_party_carries_customer_and_unit() {
        let mut inv = invoice(1_000, 0);
        inv.unit_id = Some(UnitId::new());
        let party = inv.line_party();
        assert_eq!(party.people_id, Some(*inv.customer_id.as_uuid()));
        assert_eq!(party.unit_id, inv.unit_id.map(|u| *u.as_uuid()));
    }
}
