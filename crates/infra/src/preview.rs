//! Dry-run of the split builder for the confirmation dialog.
//!
//! Previews read the same collaborators as the commit path but never touch the
//! balance tracker, never write to the store and never publish. Anything the commit
//! would reject becomes a warning next to the drafted lines instead of an error.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use arledger_accounting::{Account, AccountId, AccountRole, SplitSet};
use arledger_allocation::{
    draft_credit_application_splits, draft_discount_application_splits, ensure_account_role,
    AllocationError, AllocationResult, CreditMemo, CreditMemoId, InvoiceId,
};
use arledger_core::{Money, TenantId};

use crate::ports::Collaborators;
use crate::store::AllocationStore;

/// Something the commit path would reject, reported instead of raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewWarning {
    pub code: &'static str,
    pub message: String,
}

impl From<&AllocationError> for PreviewWarning {
    fn from(err: &AllocationError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPreview {
    pub split_set: SplitSet,
    pub warnings: Vec<PreviewWarning>,
}

impl SplitPreview {
    /// `true` when committing the same request would be accepted as far as the
    /// preview can tell.
    pub fn is_committable(&self) -> bool {
        self.warnings.is_empty() && self.split_set.is_balanced()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewCreditRequest {
    pub invoice_id: InvoiceId,
    pub credit_memo_id: CreditMemoId,
    pub amount: Money,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewDiscountRequest {
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub description: String,
    pub ar_account_id: AccountId,
    pub income_account_id: AccountId,
}

pub struct PreviewService {
    store: Arc<dyn AllocationStore>,
    collaborators: Collaborators,
    default_clearing_account_id: Option<AccountId>,
}

impl PreviewService {
    pub fn new(
        store: Arc<dyn AllocationStore>,
        collaborators: Collaborators,
        default_clearing_account_id: Option<AccountId>,
    ) -> Self {
        Self {
            store,
            collaborators,
            default_clearing_account_id,
        }
    }

    /// Fails only when the invoice cannot be found (or a lookup itself fails).
    pub async fn preview_credit_splits(
        &self,
        tenant_id: TenantId,
        request: &PreviewCreditRequest,
    ) -> AllocationResult<SplitPreview> {
        let invoice = self.collaborators.invoice(tenant_id, request.invoice_id).await?;
        let mut warnings = Warnings::default();
        warnings.check(request.amount.ensure_positive().map_err(AllocationError::from));

        let memo = match self.store.credit_memo(tenant_id, request.credit_memo_id).await? {
            Some(memo) => {
                if memo.customer_id != invoice.customer_id {
                    warnings.push(AllocationError::validation(format!(
                        "credit memo {} belongs to another customer",
                        memo.id
                    )));
                }
                if request.amount.is_positive() {
                    warnings.check(memo.ensure_can_consume(request.amount));
                }
                memo
            }
            None => {
                warnings.push(AllocationError::not_found(format!(
                    "credit memo {}",
                    request.credit_memo_id
                )));
                CreditMemo {
                    id: request.credit_memo_id,
                    customer_id: invoice.customer_id,
                    description: String::new(),
                    total_amount: Money::ZERO,
                    available_amount: Money::ZERO,
                    clearing_account_id: None,
                }
            }
        };

        let ar_account = self
            .account_or_placeholder(tenant_id, invoice.ar_account_id, AccountRole::Receivable, &mut warnings)
            .await?;

        let clearing_id = memo.clearing_account_id.or(self.default_clearing_account_id);
        let clearing_account = match clearing_id {
            Some(id) => {
                self.account_or_placeholder(tenant_id, id, AccountRole::CreditClearing, &mut warnings)
                    .await?
            }
            None => {
                warnings.push(AllocationError::validation(
                    "no clearing account configured for this credit memo",
                ));
                placeholder_account(AccountId::from(Uuid::nil()))
            }
        };

        let split_set = draft_credit_application_splits(
            &invoice,
            &memo,
            &ar_account,
            &clearing_account,
            request.amount,
            &request.description,
        );
        Ok(warnings.finish(split_set))
    }

    pub async fn preview_discount_splits(
        &self,
        tenant_id: TenantId,
        request: &PreviewDiscountRequest,
    ) -> AllocationResult<SplitPreview> {
        let invoice = self.collaborators.invoice(tenant_id, request.invoice_id).await?;
        let mut warnings = Warnings::default();
        warnings.check(request.amount.ensure_positive().map_err(AllocationError::from));

        let ar_account = self
            .account_or_placeholder(tenant_id, request.ar_account_id, AccountRole::Receivable, &mut warnings)
            .await?;
        let income_account = self
            .account_or_placeholder(tenant_id, request.income_account_id, AccountRole::Income, &mut warnings)
            .await?;

        let split_set = draft_discount_application_splits(
            &invoice,
            request.amount,
            &ar_account,
            &income_account,
            &request.description,
        );
        Ok(warnings.finish(split_set))
    }

    /// Resolve an account and check its role; an unknown account becomes a
    /// warning and an unnamed stand-in so the line still renders.
    async fn account_or_placeholder(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
        expected: AccountRole,
        warnings: &mut Warnings,
    ) -> AllocationResult<Account> {
        match self.collaborators.accounts.account(tenant_id, account_id).await? {
            Some(account) => {
                // The clearing account is configured, not picked, so its role is not enforced.
                if expected != AccountRole::CreditClearing {
                    warnings.check(ensure_account_role(&account, expected));
                }
                Ok(account)
            }
            None => {
                warnings.push(AllocationError::not_found(format!("account {account_id}")));
                Ok(placeholder_account(account_id))
            }
        }
    }
}

fn placeholder_account(id: AccountId) -> Account {
    Account {
        id,
        account_name: "(unknown account)".to_string(),
        type_name: String::new(),
        role: None,
    }
}

#[derive(Debug, Default)]
struct Warnings(Vec<PreviewWarning>);

impl Warnings {
    fn push(&mut self, err: AllocationError) {
        self.0.push(PreviewWarning::from(&err));
    }

    fn check<T>(&mut self, result: AllocationResult<T>) {
        if let Err(err) = result {
            self.push(err);
        }
    }

    fn finish(self, split_set: SplitSet) -> SplitPreview {
        SplitPreview {
            split_set,
            warnings: self.0,
        }
    }
}
