//! Collaborators owned by other systems: chart of accounts, invoices, payments.
//!
//! The engine reads these and never writes them. Each port ships with an in-memory
//! adapter used in tests and for seeded dev instances.

use std::sync::Arc;

use async_trait::async_trait;

use arledger_accounting::{Account, AccountId, AccountRole};
use arledger_allocation::{AllocationError, AllocationResult, Invoice, InvoiceId};
use arledger_core::{Money, TenantId};

use crate::read_model::{InMemoryTenantStore, TenantStore};
use crate::store::StoreError;

#[async_trait]
pub trait AccountCatalog: Send + Sync {
    async fn list_accounts(&self, tenant_id: TenantId) -> Result<Vec<Account>, StoreError>;

    async fn account(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError>;

    /// Accounts whose effective role is `role`, sorted by name (form dropdowns).
    async fn accounts_with_role(
        &self,
        tenant_id: TenantId,
        role: AccountRole,
    ) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> = self
            .list_accounts(tenant_id)
            .await?
            .into_iter()
            .filter(|a| a.has_role(role))
            .collect();
        accounts.sort_by(|a, b| a.account_name.cmp(&b.account_name));
        Ok(accounts)
    }
}

#[async_trait]
pub trait InvoiceDirectory: Send + Sync {
    async fn invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Option<Invoice>, StoreError>;
}

#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Total received against the invoice; zero when nothing was paid.
    async fn paid_amount(&self, tenant_id: TenantId, invoice_id: InvoiceId)
    -> Result<Money, StoreError>;
}

/// The three collaborator ports, shared by the commit, preview and summary paths.
#[derive(Clone)]
pub struct Collaborators {
    pub accounts: Arc<dyn AccountCatalog>,
    pub invoices: Arc<dyn InvoiceDirectory>,
    pub payments: Arc<dyn PaymentLedger>,
}

impl Collaborators {
    pub async fn invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> AllocationResult<Invoice> {
        self.invoices
            .invoice(tenant_id, invoice_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(format!("invoice {invoice_id}")))
    }

    pub async fn account(&self, tenant_id: TenantId, account_id: AccountId) -> AllocationResult<Account> {
        self.accounts
            .account(tenant_id, account_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(format!("account {account_id}")))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAccountCatalog {
    accounts: InMemoryTenantStore<AccountId, Account>,
}

impl InMemoryAccountCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant_id: TenantId, account: Account) {
        self.accounts.upsert(tenant_id, account.id, account);
    }
}

#[async_trait]
impl AccountCatalog for InMemoryAccountCatalog {
    async fn list_accounts(&self, tenant_id: TenantId) -> Result<Vec<Account>, StoreError> {
        Ok(self.accounts.list(tenant_id))
    }

    async fn account(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(tenant_id, &account_id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryInvoiceDirectory {
    invoices: InMemoryTenantStore<InvoiceId, Invoice>,
}

impl InMemoryInvoiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant_id: TenantId, invoice: Invoice) {
        self.invoices.upsert(tenant_id, invoice.id, invoice);
    }
}

#[async_trait]
impl InvoiceDirectory for InMemoryInvoiceDirectory {
    async fn invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Option<Invoice>, StoreError> {
        Ok(self.invoices.get(tenant_id, &invoice_id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPaymentLedger {
    paid: InMemoryTenantStore<InvoiceId, Money>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a received payment; returns the new total for the invoice.
    ///
    /// A total that would leave the money range is refused and the old total kept.
    pub fn record_payment(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        amount: Money,
    ) -> Result<Money, StoreError> {
        let mut overflow = None;
        let total = self.paid.update(tenant_id, invoice_id, &mut |prev| {
            let prev = prev.copied().unwrap_or(Money::ZERO);
            prev.try_add(amount).unwrap_or_else(|err| {
                overflow = Some(err);
                prev
            })
        });
        match overflow {
            Some(err) => Err(StoreError::Constraint(format!(
                "payments on invoice {invoice_id}: {err}"
            ))),
            None => Ok(total),
        }
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn paid_amount(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Money, StoreError> {
        Ok(self.paid.get(tenant_id, &invoice_id).unwrap_or(Money::ZERO))
    }
}
