use serde::{Deserialize, Serialize};

use arledger_accounting::AccountId;
use arledger_core::{domain_id, Money};

use crate::error::{AllocationError, AllocationResult};
use crate::invoice::CustomerId;

domain_id!(
    /// Credit memo identifier.
    CreditMemoId
);

/// A customer credit that can be applied against that customer's invoices.
///
/// Issued elsewhere. This engine only moves `available_amount` down when credit is
/// applied and back up when an application is reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemo {
    pub id: CreditMemoId,
    pub customer_id: CustomerId,
    pub description: String,
    pub total_amount: Money,
    pub available_amount: Money,
    /// Clearing/liability account debited when this memo is applied.
    #[serde(default)]
    pub clearing_account_id: Option<AccountId>,
}

impl CreditMemo {
    /// A fresh memo with its full amount available.
    pub fn issue(
        customer_id: CustomerId,
        description: impl Into<String>,
        total_amount: Money,
        clearing_account_id: Option<AccountId>,
    ) -> AllocationResult<Self> {
        total_amount.ensure_positive()?;
        Ok(Self {
            id: CreditMemoId::new(),
            customer_id,
            description: description.into(),
            total_amount,
            available_amount: total_amount,
            clearing_account_id,
        })
    }

    pub fn consumed_amount(&self) -> Money {
        self.total_amount - self.available_amount
    }

    pub fn has_available(&self) -> bool {
        self.available_amount.is_positive()
    }

    /// Fail with `InsufficientCredit` unless `amount` can be drawn from this memo.
    pub fn ensure_can_consume(&self, amount: Money) -> AllocationResult<()> {
        amount.ensure_positive()?;
        if amount > self.available_amount {
            return Err(AllocationError::InsufficientCredit {
                credit_memo_id: self.id,
                requested: amount,
                available: self.available_amount,
            });
        }
        Ok(())
    }

    pub fn consume(&mut self, amount: Money) -> AllocationResult<()> {
        self.ensure_can_consume(amount)?;
        self.available_amount -= amount;
        Ok(())
    }

    /// Put back an amount previously consumed. Never exceeds `total_amount`.
    pub fn restore(&mut self, amount: Money) -> AllocationResult<()> {
        amount.ensure_positive()?;
        let restored = self.available_amount.try_add(amount)?;
        if restored > self.total_amount {
            return Err(AllocationError::validation(format!(
                "restoring {amount} to credit memo {} would exceed its total {}",
                self.id, self.total_amount
            )));
        }
        self.available_amount = restored;
        Ok(())
    }
}
