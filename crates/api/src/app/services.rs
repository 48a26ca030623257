//! Wiring of the allocation engine behind the HTTP routes.
//!
//! The allocation store is in-memory by default and Postgres when
//! `USE_PERSISTENT_STORES=true`. Accounts, invoices and payments belong to other
//! systems; here they are in-memory adapters filled from the seed file.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value as JsonValue;
use tracing::info;

use arledger_accounting::AccountId;
use arledger_events::{EventEnvelope, InMemoryEventBus};
use arledger_infra::{
    ports::{Collaborators, InMemoryAccountCatalog, InMemoryInvoiceDirectory, InMemoryPaymentLedger},
    AllocationService, AllocationStore, AppConfig, InMemoryAllocationStore, InvoiceBalanceAggregator,
    PostgresAllocationStore, PreviewService, SeedData,
};

pub type EventBusHandle = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

pub struct AppServices {
    pub allocations: AllocationService<EventBusHandle>,
    pub previews: PreviewService,
    pub summaries: InvoiceBalanceAggregator,
    pub accounts: Arc<InMemoryAccountCatalog>,
    pub invoices: Arc<InMemoryInvoiceDirectory>,
    pub payments: Arc<InMemoryPaymentLedger>,
}

impl AppServices {
    /// Compose the services over an allocation store.
    pub fn new(store: Arc<dyn AllocationStore>, default_clearing_account_id: Option<AccountId>) -> Self {
        let accounts = Arc::new(InMemoryAccountCatalog::new());
        let invoices = Arc::new(InMemoryInvoiceDirectory::new());
        let payments = Arc::new(InMemoryPaymentLedger::new());
        let collaborators = Collaborators {
            accounts: accounts.clone(),
            invoices: invoices.clone(),
            payments: payments.clone(),
        };

        Self {
            allocations: AllocationService::new(
                store.clone(),
                collaborators.clone(),
                Arc::new(InMemoryEventBus::new()),
                default_clearing_account_id,
            ),
            previews: PreviewService::new(
                store.clone(),
                collaborators.clone(),
                default_clearing_account_id,
            ),
            summaries: InvoiceBalanceAggregator::new(store, collaborators),
            accounts,
            invoices,
            payments,
        }
    }

    pub fn in_memory(default_clearing_account_id: Option<AccountId>) -> Self {
        Self::new(Arc::new(InMemoryAllocationStore::new()), default_clearing_account_id)
    }

    /// Load collaborator data and credit memos from a seed fixture.
    pub async fn install_seed(&self, seed: SeedData) -> anyhow::Result<()> {
        let tenant = seed.tenant_id;
        let (accounts, invoices) = (seed.accounts.len(), seed.invoices.len());
        for account in seed.accounts {
            self.accounts.insert(tenant, account);
        }
        for invoice in seed.invoices {
            self.invoices.insert(tenant, invoice);
        }
        for payment in seed.payments {
            self.payments
                .record_payment(tenant, payment.invoice_id, payment.amount)
                .with_context(|| format!("failed to seed payment on invoice {}", payment.invoice_id))?;
        }
        let memos = seed.credit_memos.len();
        for memo in seed.credit_memos {
            let memo_id = memo.id;
            self.allocations
                .register_credit_memo(tenant, memo)
                .await
                .with_context(|| format!("failed to seed credit memo {memo_id}"))?;
        }

        info!(tenant_id = %tenant, accounts, invoices, memos, "seed data installed");
        Ok(())
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn AllocationStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresAllocationStore::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to apply allocation schema")?;
            info!("using Postgres allocation store");
            Arc::new(store)
        }
        None => {
            info!("using in-memory allocation store");
            Arc::new(InMemoryAllocationStore::new())
        }
    };

    let services = AppServices::new(store, config.default_clearing_account_id);
    if let Some(path) = &config.seed_file {
        let seed = SeedData::load(path)?;
        services.install_seed(seed).await?;
    }
    Ok(services)
}
