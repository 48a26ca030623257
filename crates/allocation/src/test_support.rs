//! Fixtures shared by this crate's unit tests.

use chrono::{NaiveDate, Utc};

use arledger_accounting::{Account, AccountRole};
use arledger_core::{Money, TenantId};

use crate::applied_credit::{AppliedCredit, AppliedCreditId};
use crate::applied_discount::{AppliedDiscount, AppliedDiscountId};
use crate::credit_memo::{CreditMemo, CreditMemoId};
use crate::invoice::{CustomerId, Invoice, InvoiceId};
use crate::status::AllocationStatus;

pub fn ar_account() -> Account {
    Account::new("Accounts Receivable", "Accounts Receivable", AccountRole::Receivable)
}

pub fn income_account() -> Account {
    Account::new("Sales Discounts", "Income", AccountRole::Income)
}

pub fn clearing_account() -> Account {
    Account::new("Customer Credits", "Credit Memo Clearing", AccountRole::CreditClearing)
}

pub fn invoice(amount_cents: i64, previous_balance_cents: i64) -> Invoice {
    Invoice {
        id: InvoiceId::new(),
        customer_id: CustomerId::new(),
        unit_id: None,
        number: "INV-1001".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        amount: Money::from_cents(amount_cents),
        previous_balance: Money::from_cents(previous_balance_cents),
        ar_account_id: ar_account().id,
    }
}

pub fn memo_for(invoice: &Invoice, total_cents: i64) -> CreditMemo {
    CreditMemo::issue(
        invoice.customer_id,
        "Returned goods",
        Money::from_cents(total_cents),
        None,
    )
    .unwrap()
}

pub fn applied_credit(invoice: &Invoice, cents: i64, status: AllocationStatus) -> AppliedCredit {
    AppliedCredit {
        tenant_id: Some(TenantId::new()),
        invoice_id: invoice.id,
        credit_memo_id: CreditMemoId::new(),
        amount: Money::from_cents(cents),
        description: "credit".to_string(),
        date: invoice.date,
        status,
        created_at: Utc::now(),
        version: 1,
        ..AppliedCredit::empty(AppliedCreditId::new())
    }
}

pub fn applied_discount(invoice: &Invoice, cents: i64, status: AllocationStatus) -> AppliedDiscount {
    AppliedDiscount {
        tenant_id: Some(TenantId::new()),
        invoice_id: invoice.id,
        amount: Money::from_cents(cents),
        description: "discount".to_string(),
        date: invoice.date,
        ar_account_id: invoice.ar_account_id,
        status,
        created_at: Utc::now(),
        version: 1,
        ..AppliedDiscount::empty(AppliedDiscountId::new())
    }
}
