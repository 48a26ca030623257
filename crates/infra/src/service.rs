//! Commit path for credit and discount allocations.
//!
//! ```text
//! request
//!   ↓ validate fields, resolve invoice / credit memo / accounts
//!   ↓ reserve the amount (credit memo lock held from here)
//!   ↓ aggregate decides events, splits are built and checked
//!   ↓ store commits record + splits + balance change atomically
//!   ↓ lock released
//!   ↓ events published (failure is logged, never rolls back)
//! ```
//!
//! Every rejection leaves the store exactly as it was.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, info, instrument, warn};

use arledger_accounting::{Account, AccountId};
use arledger_allocation::{
    build_credit_application_splits, build_discount_application_splits, build_reversal_splits,
    AllocationError, AllocationKind, AllocationResult, AppliedCredit, AppliedCreditCommand,
    AppliedCreditId, AppliedDiscount, AppliedDiscountCommand, AppliedDiscountId, ApplyCredit,
    ApplyDiscount, CreditMemo, CreditMemoId, Invoice, InvoiceId, InvoiceSummary, ReverseCredit,
    ReverseDiscount,
};
use arledger_core::{Aggregate, AggregateId, Money, TenantId};
use arledger_events::{Event, EventBus, EventEnvelope};

use crate::credit_tracker::CreditMemoBalanceTracker;
use crate::ports::Collaborators;
use crate::store::{AllocationStore, PostedSplitSet, SplitSetKind};

const APPLIED_CREDIT_AGGREGATE: &str = "allocation.applied_credit";
const APPLIED_DISCOUNT_AGGREGATE: &str = "allocation.applied_discount";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyCreditRequest {
    pub invoice_id: InvoiceId,
    pub credit_memo_id: CreditMemoId,
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyDiscountRequest {
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
    pub ar_account_id: AccountId,
    pub income_account_id: AccountId,
    pub reference: Option<String>,
}

pub struct AllocationService<B> {
    store: Arc<dyn AllocationStore>,
    collaborators: Collaborators,
    tracker: CreditMemoBalanceTracker,
    bus: B,
    default_clearing_account_id: Option<AccountId>,
}

impl<B> AllocationService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        store: Arc<dyn AllocationStore>,
        collaborators: Collaborators,
        bus: B,
        default_clearing_account_id: Option<AccountId>,
    ) -> Self {
        Self {
            tracker: CreditMemoBalanceTracker::new(store.clone()),
            store,
            collaborators,
            bus,
            default_clearing_account_id,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Apply part of a credit memo to an invoice.
    #[instrument(
        skip(self, request),
        fields(
            tenant_id = %tenant_id,
            invoice_id = %request.invoice_id,
            credit_memo_id = %request.credit_memo_id,
            amount = %request.amount
        )
    )]
    pub async fn apply_credit(
        &self,
        tenant_id: TenantId,
        request: ApplyCreditRequest,
    ) -> AllocationResult<AppliedCredit> {
        observe("apply_credit", self.apply_credit_inner(tenant_id, request).await)
    }

    async fn apply_credit_inner(
        &self,
        tenant_id: TenantId,
        request: ApplyCreditRequest,
    ) -> AllocationResult<AppliedCredit> {
        request.amount.ensure_positive()?;
        require_description(&request.description)?;

        let invoice = self.collaborators.invoice(tenant_id, request.invoice_id).await?;
        let memo = self
            .store
            .credit_memo(tenant_id, request.credit_memo_id)
            .await?
            .ok_or_else(|| {
                AllocationError::not_found(format!("credit memo {}", request.credit_memo_id))
            })?;
        if memo.customer_id != invoice.customer_id {
            return Err(AllocationError::validation(format!(
                "credit memo {} belongs to another customer than invoice {}",
                memo.id, invoice.number
            )));
        }

        let ar_account = self.collaborators.account(tenant_id, invoice.ar_account_id).await?;
        let clearing_account = self.clearing_account(tenant_id, &memo).await?;
        self.ensure_summary_room(tenant_id, &invoice, request.amount).await?;

        let reservation = self
            .tracker
            .reserve(tenant_id, memo.id, request.amount)
            .await?;

        let id = AppliedCreditId::new();
        let mut credit = AppliedCredit::empty(id);
        let events = credit.handle(&AppliedCreditCommand::Apply(ApplyCredit {
            tenant_id,
            applied_credit_id: id,
            invoice_id: invoice.id,
            credit_memo_id: memo.id,
            amount: request.amount,
            description: request.description.clone(),
            date: request.date,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            credit.apply(event);
        }

        let splits = build_credit_application_splits(
            &invoice,
            reservation.credit_memo(),
            &ar_account,
            &clearing_account,
            credit.amount,
            &credit.description,
        )?;
        let posted = PostedSplitSet::new(
            *id.as_uuid(),
            AllocationKind::Credit,
            SplitSetKind::Application,
            credit.date,
            credit.created_at,
            splits,
        );

        self.store
            .commit_credit_application(tenant_id, &credit, &posted)
            .await?;
        self.tracker.release(reservation);

        info!(applied_credit_id = %credit.id, "credit applied");
        self.publish(tenant_id, id.0, APPLIED_CREDIT_AGGREGATE, credit.version, &events);
        Ok(credit)
    }

    /// Grant a discount on an invoice, posted AR (credit) against income (debit).
    #[instrument(
        skip(self, request),
        fields(tenant_id = %tenant_id, invoice_id = %request.invoice_id, amount = %request.amount)
    )]
    pub async fn apply_discount(
        &self,
        tenant_id: TenantId,
        request: ApplyDiscountRequest,
    ) -> AllocationResult<AppliedDiscount> {
        observe("apply_discount", self.apply_discount_inner(tenant_id, request).await)
    }

    async fn apply_discount_inner(
        &self,
        tenant_id: TenantId,
        request: ApplyDiscountRequest,
    ) -> AllocationResult<AppliedDiscount> {
        request.amount.ensure_positive()?;
        require_description(&request.description)?;

        let invoice = self.collaborators.invoice(tenant_id, request.invoice_id).await?;
        let ar_account = self.collaborators.account(tenant_id, request.ar_account_id).await?;
        let income_account = self
            .collaborators
            .account(tenant_id, request.income_account_id)
            .await?;
        self.ensure_summary_room(tenant_id, &invoice, request.amount).await?;

        let id = AppliedDiscountId::new();
        let mut discount = AppliedDiscount::empty(id);
        let events = discount.handle(&AppliedDiscountCommand::Apply(ApplyDiscount {
            tenant_id,
            applied_discount_id: id,
            invoice_id: invoice.id,
            amount: request.amount,
            description: request.description.clone(),
            date: request.date,
            reference: request.reference.clone(),
            ar_account_id: ar_account.id,
            income_account_id: income_account.id,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            discount.apply(event);
        }

        let splits = build_discount_application_splits(
            &invoice,
            discount.amount,
            &ar_account,
            &income_account,
            &discount.description,
        )?;
        let posted = PostedSplitSet::new(
            *id.as_uuid(),
            AllocationKind::Discount,
            SplitSetKind::Application,
            discount.date,
            discount.created_at,
            splits,
        );

        self.store
            .commit_discount_application(tenant_id, &discount, &posted)
            .await?;

        info!(applied_discount_id = %discount.id, "discount applied");
        self.publish(tenant_id, id.0, APPLIED_DISCOUNT_AGGREGATE, discount.version, &events);
        Ok(discount)
    }

    /// Reverse an active applied credit and hand its amount back to the memo.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, applied_credit_id = %id))]
    pub async fn reverse_applied_credit(
        &self,
        tenant_id: TenantId,
        id: AppliedCreditId,
    ) -> AllocationResult<AppliedCredit> {
        observe("reverse_applied_credit", self.reverse_credit_inner(tenant_id, id).await)
    }

    async fn reverse_credit_inner(
        &self,
        tenant_id: TenantId,
        id: AppliedCreditId,
    ) -> AllocationResult<AppliedCredit> {
        let existing = self.load_credit(tenant_id, id).await?;
        let lock = self.tracker.lock(tenant_id, existing.credit_memo_id).await;

        // Re-read under the memo lock: a concurrent reversal may have won.
        let mut credit = self.load_credit(tenant_id, id).await?;
        let events = credit.handle(&AppliedCreditCommand::Reverse(ReverseCredit {
            tenant_id,
            applied_credit_id: id,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            credit.apply(event);
        }

        let posted = self
            .reversal_posting(tenant_id, *id.as_uuid(), AllocationKind::Credit)
            .await?;
        self.store
            .commit_credit_reversal(tenant_id, &credit, &posted)
            .await?;
        drop(lock);

        info!(credit_memo_id = %credit.credit_memo_id, amount = %credit.amount, "credit reversed");
        self.publish(tenant_id, id.0, APPLIED_CREDIT_AGGREGATE, credit.version, &events);
        Ok(credit)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, applied_discount_id = %id))]
    pub async fn reverse_applied_discount(
        &self,
        tenant_id: TenantId,
        id: AppliedDiscountId,
    ) -> AllocationResult<AppliedDiscount> {
        observe("reverse_applied_discount", self.reverse_discount_inner(tenant_id, id).await)
    }

    async fn reverse_discount_inner(
        &self,
        tenant_id: TenantId,
        id: AppliedDiscountId,
    ) -> AllocationResult<AppliedDiscount> {
        let mut discount = self.load_discount(tenant_id, id).await?;
        let events = discount.handle(&AppliedDiscountCommand::Reverse(ReverseDiscount {
            tenant_id,
            applied_discount_id: id,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            discount.apply(event);
        }

        let posted = self
            .reversal_posting(tenant_id, *id.as_uuid(), AllocationKind::Discount)
            .await?;
        // The store re-checks `Active` inside the commit, so a racing reversal
        // surfaces as AlreadyReversed rather than a second posting.
        self.store
            .commit_discount_reversal(tenant_id, &discount, &posted)
            .await?;

        info!(amount = %discount.amount, "discount reversed");
        self.publish(tenant_id, id.0, APPLIED_DISCOUNT_AGGREGATE, discount.version, &events);
        Ok(discount)
    }

    /// Applied credits of an invoice (active and reversed), by date then creation time.
    pub async fn applied_credits(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> AllocationResult<Vec<AppliedCredit>> {
        self.collaborators.invoice(tenant_id, invoice_id).await?;
        Ok(self.store.invoice_allocations(tenant_id, invoice_id).await?.credits)
    }

    pub async fn applied_discounts(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> AllocationResult<Vec<AppliedDiscount>> {
        self.collaborators.invoice(tenant_id, invoice_id).await?;
        Ok(self.store.invoice_allocations(tenant_id, invoice_id).await?.discounts)
    }

    /// Posted split sets of an applied credit: the application, then the reversal if any.
    pub async fn credit_splits(
        &self,
        tenant_id: TenantId,
        id: AppliedCreditId,
    ) -> AllocationResult<Vec<PostedSplitSet>> {
        self.load_credit(tenant_id, id).await?;
        Ok(self.store.splits_for(tenant_id, *id.as_uuid()).await?)
    }

    pub async fn discount_splits(
        &self,
        tenant_id: TenantId,
        id: AppliedDiscountId,
    ) -> AllocationResult<Vec<PostedSplitSet>> {
        self.load_discount(tenant_id, id).await?;
        Ok(self.store.splits_for(tenant_id, *id.as_uuid()).await?)
    }

    /// Credit memos of the invoice's customer that still have something to apply.
    pub async fn list_available_credits(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> AllocationResult<Vec<CreditMemo>> {
        let invoice = self.collaborators.invoice(tenant_id, invoice_id).await?;
        Ok(self
            .store
            .list_available_credits(tenant_id, invoice.customer_id)
            .await?)
    }

    /// Record a credit memo issued elsewhere so it can be applied here.
    pub async fn register_credit_memo(
        &self,
        tenant_id: TenantId,
        memo: CreditMemo,
    ) -> AllocationResult<()> {
        memo.total_amount.ensure_positive()?;
        if memo.available_amount.is_negative() || memo.available_amount > memo.total_amount {
            return Err(AllocationError::InvalidAmount(format!(
                "available amount {} must be within 0..={}",
                memo.available_amount, memo.total_amount
            )));
        }
        self.store.register_credit_memo(tenant_id, memo).await?;
        Ok(())
    }

    async fn load_credit(
        &self,
        tenant_id: TenantId,
        id: AppliedCreditId,
    ) -> AllocationResult<AppliedCredit> {
        self.store
            .applied_credit(tenant_id, id)
            .await?
            .ok_or_else(|| AllocationError::not_found(format!("applied credit {id}")))
    }

    async fn load_discount(
        &self,
        tenant_id: TenantId,
        id: AppliedDiscountId,
    ) -> AllocationResult<AppliedDiscount> {
        self.store
            .applied_discount(tenant_id, id)
            .await?
            .ok_or_else(|| AllocationError::not_found(format!("applied discount {id}")))
    }

    /// Reject an amount that would push the invoice summary out of the money range.
    async fn ensure_summary_room(
        &self,
        tenant_id: TenantId,
        invoice: &Invoice,
        amount: Money,
    ) -> AllocationResult<()> {
        let paid = self
            .collaborators
            .payments
            .paid_amount(tenant_id, invoice.id)
            .await?;
        let allocations = self.store.invoice_allocations(tenant_id, invoice.id).await?;
        InvoiceSummary::compute(invoice, paid, &allocations.credits, &allocations.discounts)?
            .ensure_room_for(amount)
    }

    async fn clearing_account(
        &self,
        tenant_id: TenantId,
        memo: &CreditMemo,
    ) -> AllocationResult<Account> {
        let account_id = memo
            .clearing_account_id
            .or(self.default_clearing_account_id)
            .ok_or_else(|| {
                AllocationError::validation(format!(
                    "credit memo {} has no clearing account and no default is configured",
                    memo.id
                ))
            })?;
        self.collaborators.account(tenant_id, account_id).await
    }

    /// Mirror of the application posting, dated today.
    async fn reversal_posting(
        &self,
        tenant_id: TenantId,
        allocation_id: uuid::Uuid,
        allocation_kind: AllocationKind,
    ) -> AllocationResult<PostedSplitSet> {
        let application = self
            .store
            .splits_for(tenant_id, allocation_id)
            .await?
            .into_iter()
            .find(|p| p.kind == SplitSetKind::Application)
            .ok_or_else(|| {
                AllocationError::Store(format!("no application posting for {allocation_id}"))
            })?;

        let reversal = build_reversal_splits(&application.split_set)?;
        let now = Utc::now();
        Ok(PostedSplitSet::new(
            allocation_id,
            allocation_kind,
            SplitSetKind::Reversal,
            now.date_naive(),
            now,
            reversal,
        ))
    }

    fn publish<E>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        version: u64,
        events: &[E],
    ) where
        E: Event + Serialize,
    {
        let first_sequence = version + 1 - events.len() as u64;
        for (offset, event) in events.iter().enumerate() {
            let envelope = match EventEnvelope::from_typed(
                tenant_id,
                aggregate_id,
                aggregate_type,
                first_sequence + offset as u64,
                event,
            ) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(event_type = event.event_type(), error = %err, "failed to encode event");
                    continue;
                }
            };
            if let Err(err) = self.bus.publish(envelope) {
                warn!(event_type = event.event_type(), error = ?err, "failed to publish event");
            }
        }
    }
}

fn require_description(description: &str) -> AllocationResult<()> {
    if description.trim().is_empty() {
        return Err(AllocationError::validation("description is required"));
    }
    Ok(())
}

/// Log a rejected operation at the level its error deserves.
fn observe<T>(operation: &'static str, result: AllocationResult<T>) -> AllocationResult<T> {
    if let Err(err) = &result {
        if err.is_recoverable() {
            warn!(operation, code = err.code(), error = %err, "allocation rejected");
        } else {
            error!(operation, code = err.code(), error = %err, "allocation failed");
        }
    }
    result
}
