use std::sync::Arc;

use tracing::debug;

use arledger_allocation::{AllocationResult, InvoiceId, InvoiceSummary};
use arledger_core::TenantId;

use crate::ports::Collaborators;
use crate::store::AllocationStore;

/// Derives an invoice's summary (and due amount) on every read; nothing is cached.
pub struct InvoiceBalanceAggregator {
    store: Arc<dyn AllocationStore>,
    collaborators: Collaborators,
}

impl InvoiceBalanceAggregator {
    pub fn new(store: Arc<dyn AllocationStore>, collaborators: Collaborators) -> Self {
        Self {
            store,
            collaborators,
        }
    }

    /// Credits and discounts come from one store snapshot, so a concurrent commit
    /// is either fully counted or not at all.
    pub async fn summarize(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> AllocationResult<InvoiceSummary> {
        let invoice = self.collaborators.invoice(tenant_id, invoice_id).await?;
        let paid = self
            .collaborators
            .payments
            .paid_amount(tenant_id, invoice_id)
            .await?;
        let allocations = self.store.invoice_allocations(tenant_id, invoice_id).await?;

        let summary =
            InvoiceSummary::compute(&invoice, paid, &allocations.credits, &allocations.discounts)?;
        debug!(
            tenant_id = %tenant_id,
            invoice_id = %invoice_id,
            due_amount = %summary.due_amount,
            "invoice summarized"
        );
        Ok(summary)
    }
}
