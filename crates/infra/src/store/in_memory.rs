use std::collections::HashMap;
use std::sync::RwLock;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use arledger_allocation::{
    AllocationError, AppliedCredit, AppliedCreditId, AppliedDiscount, AppliedDiscountId,
    CreditMemo, CreditMemoId, CustomerId, InvoiceId,
};
use arledger_core::TenantId;

use super::{
    sort_credits, sort_discounts, AllocationStore, InvoiceAllocations, PostedSplitSet,
    StoreError,
};

#[derive(Debug, Default)]
struct Book {
    memos: HashMap<(TenantId, CreditMemoId), CreditMemo>,
    credits: HashMap<(TenantId, AppliedCreditId), AppliedCredit>,
    discounts: HashMap<(TenantId, AppliedDiscountId), AppliedDiscount>,
    splits: HashMap<(TenantId, Uuid), Vec<PostedSplitSet>>,
}

impl Book {
    fn post_splits(&mut self, tenant_id: TenantId, splits: &PostedSplitSet) {
        self.splits
            .entry((tenant_id, splits.allocation_id))
            .or_default()
            .push(splits.clone());
    }
}

/// In-memory allocation store for tests/dev.
///
/// One write lock over the whole book makes each commit atomic: every check runs
/// before the first mutation, so a rejected commit leaves nothing behind.
#[derive(Debug, Default)]
pub struct InMemoryAllocationStore {
    book: RwLock<Book>,
    #[cfg(test)]
    fail_commits: AtomicBool,
}

impl InMemoryAllocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Book>, StoreError> {
        self.book
            .read()
            .map_err(|_| StoreError::Backend("allocation book lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Book>, StoreError> {
        #[cfg(test)]
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated outage".to_string()));
        }
        self.book
            .write()
            .map_err(|_| StoreError::Backend("allocation book lock poisoned".to_string()))
    }

    /// Make every subsequent write fail with `Backend`.
    #[cfg(test)]
    pub(crate) fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

/// Balance rules live on `CreditMemo`; translate their failures for the store layer.
fn memo_rule_error(err: AllocationError) -> StoreError {
    match err {
        AllocationError::InsufficientCredit {
            credit_memo_id,
            requested,
            available,
        } => StoreError::InsufficientCredit {
            credit_memo_id,
            requested,
            available,
        },
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl AllocationStore for InMemoryAllocationStore {
    async fn register_credit_memo(
        &self,
        tenant_id: TenantId,
        memo: CreditMemo,
    ) -> Result<(), StoreError> {
        let mut book = self.write()?;
        book.memos.insert((tenant_id, memo.id), memo);
        Ok(())
    }

    async fn credit_memo(
        &self,
        tenant_id: TenantId,
        credit_memo_id: CreditMemoId,
    ) -> Result<Option<CreditMemo>, StoreError> {
        Ok(self.read()?.memos.get(&(tenant_id, credit_memo_id)).cloned())
    }

    async fn list_available_credits(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<Vec<CreditMemo>, StoreError> {
        let book = self.read()?;
        let mut memos: Vec<CreditMemo> = book
            .memos
            .iter()
            .filter(|((t, _), m)| *t == tenant_id && m.customer_id == customer_id && m.has_available())
            .map(|(_, m)| m.clone())
            .collect();
        memos.sort_by_key(|m| m.id);
        Ok(memos)
    }

    async fn applied_credit(
        &self,
        tenant_id: TenantId,
        id: AppliedCreditId,
    ) -> Result<Option<AppliedCredit>, StoreError> {
        Ok(self.read()?.credits.get(&(tenant_id, id)).cloned())
    }

    async fn applied_discount(
        &self,
        tenant_id: TenantId,
        id: AppliedDiscountId,
    ) -> Result<Option<AppliedDiscount>, StoreError> {
        Ok(self.read()?.discounts.get(&(tenant_id, id)).cloned())
    }

    async fn invoice_allocations(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceAllocations, StoreError> {
        let book = self.read()?;

        let mut credits: Vec<AppliedCredit> = book
            .credits
            .iter()
            .filter(|((t, _), c)| *t == tenant_id && c.invoice_id == invoice_id)
            .map(|(_, c)| c.clone())
            .collect();
        let mut discounts: Vec<AppliedDiscount> = book
            .discounts
            .iter()
            .filter(|((t, _), d)| *t == tenant_id && d.invoice_id == invoice_id)
            .map(|(_, d)| d.clone())
            .collect();

        sort_credits(&mut credits);
        sort_discounts(&mut discounts);
        Ok(InvoiceAllocations { credits, discounts })
    }

    async fn splits_for(
        &self,
        tenant_id: TenantId,
        allocation_id: Uuid,
    ) -> Result<Vec<PostedSplitSet>, StoreError> {
        Ok(self
            .read()?
            .splits
            .get(&(tenant_id, allocation_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn commit_credit_application(
        &self,
        tenant_id: TenantId,
        credit: &AppliedCredit,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError> {
        let mut book = self.write()?;

        if book.credits.contains_key(&(tenant_id, credit.id)) {
            return Err(StoreError::Constraint(format!("applied credit {} exists", credit.id)));
        }
        let memo = book
            .memos
            .get_mut(&(tenant_id, credit.credit_memo_id))
            .ok_or_else(|| StoreError::NotFound(format!("credit memo {}", credit.credit_memo_id)))?;
        // Last fallible step: `consume` leaves the memo untouched on error.
        memo.consume(credit.amount).map_err(memo_rule_error)?;

        book.credits.insert((tenant_id, credit.id), credit.clone());
        book.post_splits(tenant_id, splits);
        Ok(())
    }

    async fn commit_credit_reversal(
        &self,
        tenant_id: TenantId,
        credit: &AppliedCredit,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError> {
        let mut book = self.write()?;

        let stored = book
            .credits
            .get(&(tenant_id, credit.id))
            .ok_or_else(|| StoreError::NotFound(format!("applied credit {}", credit.id)))?;
        if !stored.status.is_active() {
            return Err(StoreError::NotActive(format!("applied credit {}", credit.id)));
        }
        let amount = stored.amount;

        let memo = book
            .memos
            .get_mut(&(tenant_id, credit.credit_memo_id))
            .ok_or_else(|| StoreError::NotFound(format!("credit memo {}", credit.credit_memo_id)))?;
        memo.restore(amount).map_err(memo_rule_error)?;

        book.credits.insert((tenant_id, credit.id), credit.clone());
        book.post_splits(tenant_id, splits);
        Ok(())
    }

    async fn commit_discount_application(
        &self,
        tenant_id: TenantId,
        discount: &AppliedDiscount,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError> {
        let mut book = self.write()?;

        if book.discounts.contains_key(&(tenant_id, discount.id)) {
            return Err(StoreError::Constraint(format!("applied discount {} exists", discount.id)));
        }
        book.discounts.insert((tenant_id, discount.id), discount.clone());
        book.post_splits(tenant_id, splits);
        Ok(())
    }

    async fn commit_discount_reversal(
        &self,
        tenant_id: TenantId,
        discount: &AppliedDiscount,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError> {
        let mut book = self.write()?;

        let stored = book
            .discounts
            .get(&(tenant_id, discount.id))
            .ok_or_else(|| StoreError::NotFound(format!("applied discount {}", discount.id)))?;
        if !stored.status.is_active() {
            return Err(StoreError::NotActive(format!("applied discount {}", discount.id)));
        }

        book.discounts.insert((tenant_id, discount.id), discount.clone());
        book.post_splits(tenant_id, splits);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use arledger_accounting::{Account, AccountRole, SplitSetBuilder};
    use arledger_allocation::{AllocationKind, AllocationStatus};
    use arledger_core::Money;

    use super::*;
    use crate::store::SplitSetKind;

    fn posted(allocation_id: Uuid, cents: i64) -> PostedSplitSet {
        let ar = Account::new("AR", "AR", AccountRole::Receivable);
        let clearing = Account::new("Clearing", "Clearing", AccountRole::CreditClearing);
        let amount = Money::from_cents(cents);
        let set = SplitSetBuilder::new("credit")
            .credit(&ar, amount, Default::default())
            .debit(&clearing, amount, Default::default())
            .build()
            .unwrap();
        PostedSplitSet::new(
            allocation_id,
            AllocationKind::Credit,
            SplitSetKind::Application,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            Utc::now(),
            set,
        )
    }

    fn credit_against(memo: &CreditMemo, cents: i64) -> AppliedCredit {
        AppliedCredit {
            tenant_id: None,
            invoice_id: InvoiceId::new(),
            credit_memo_id: memo.id,
            amount: Money::from_cents(cents),
            description: "credit".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status: AllocationStatus::Active,
            created_at: Utc::now(),
            version: 1,
            ..AppliedCredit::empty(AppliedCreditId::new())
        }
    }

    #[tokio::test]
    async fn insufficient_credit_leaves_no_residue() {
        let store = InMemoryAllocationStore::new();
        let tenant = TenantId::new();
        let memo = CreditMemo::issue(CustomerId::new(), "memo", Money::from_cents(4_000), None).unwrap();
        store.register_credit_memo(tenant, memo.clone()).await.unwrap();

        let credit = credit_against(&memo, 5_000);
        let err = store
            .commit_credit_application(tenant, &credit, &posted(*credit.id.as_uuid(), 5_000))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientCredit { .. }));

        assert!(store.applied_credit(tenant, credit.id).await.unwrap().is_none());
        assert!(store.splits_for(tenant, *credit.id.as_uuid()).await.unwrap().is_empty());
        let memo_after = store.credit_memo(tenant, memo.id).await.unwrap().unwrap();
        assert_eq!(memo_after.available_amount, Money::from_cents(4_000));
    }

    #[tokio::test]
    async fn reversal_restores_balance_once() {
        let store = InMemoryAllocationStore::new();
        let tenant = TenantId::new();
        let memo = CreditMemo::issue(CustomerId::new(), "memo", Money::from_cents(4_000), None).unwrap();
        store.register_credit_memo(tenant, memo.clone()).await.unwrap();

        let credit = credit_against(&memo, 2_500);
        let id = *credit.id.as_uuid();
        store.commit_credit_application(tenant, &credit, &posted(id, 2_500)).await.unwrap();

        let mut reversed = credit.clone();
        reversed.status = AllocationStatus::Inactive;
        store.commit_credit_reversal(tenant, &reversed, &posted(id, 2_500)).await.unwrap();

        let err = store
            .commit_credit_reversal(tenant, &reversed, &posted(id, 2_500))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotActive(_)));

        let memo_after = store.credit_memo(tenant, memo.id).await.unwrap().unwrap();
        assert_eq!(memo_after.available_amount, Money::from_cents(4_000));
        assert_eq!(store.splits_for(tenant, id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_application_is_a_store_fault_not_a_reversal_conflict() {
        let store = InMemoryAllocationStore::new();
        let tenant = TenantId::new();
        let memo = CreditMemo::issue(CustomerId::new(), "memo", Money::from_cents(4_000), None).unwrap();
        store.register_credit_memo(tenant, memo.clone()).await.unwrap();

        let credit = credit_against(&memo, 1_000);
        let id = *credit.id.as_uuid();
        store.commit_credit_application(tenant, &credit, &posted(id, 1_000)).await.unwrap();

        let err = store
            .commit_credit_application(tenant, &credit, &posted(id, 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(AllocationError::from(err).code(), "store_error");

        let memo_after = store.credit_memo(tenant, memo.id).await.unwrap().unwrap();
        assert_eq!(memo_after.available_amount, Money::from_cents(3_000));
        assert_eq!(store.splits_for(tenant, id).await.unwrap().len(), 1);
    }

    #[test]
    fn only_inactive_records_map_to_already_reversed() {
        let not_active: AllocationError = StoreError::NotActive("applied credit x".into()).into();
        assert_eq!(not_active.code(), "already_reversed");

        let constraint: AllocationError = StoreError::Constraint("check violated".into()).into();
        assert_eq!(constraint.code(), "store_error");
    }

    #[tokio::test]
    async fn other_tenants_see_nothing() {
        let store = InMemoryAllocationStore::new();
        let tenant = TenantId::new();
        let memo = CreditMemo::issue(CustomerId::new(), "memo", Money::from_cents(4_000), None).unwrap();
        store.register_credit_memo(tenant, memo.clone()).await.unwrap();

        assert!(store.credit_memo(TenantId::new(), memo.id).await.unwrap().is_none());
        assert!(store
            .list_available_credits(TenantId::new(), memo.customer_id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store.list_available_credits(tenant, memo.customer_id).await.unwrap().len(),
            1
        );
    }
}
