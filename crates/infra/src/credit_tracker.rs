//! Per-credit-memo serialization of balance changes.
//!
//! Each `(tenant, credit memo)` pair gets its own async mutex. Applying credit
//! holds it from the availability check through the store commit; reversing holds
//! it from reading the record through the restore. Different memos never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use arledger_allocation::{AllocationError, AllocationResult, CreditMemo, CreditMemoId};
use arledger_core::{Money, TenantId};

use crate::store::AllocationStore;

/// Prune idle lock entries once the table grows past this many.
const PRUNE_THRESHOLD: usize = 1024;

type LockKey = (TenantId, CreditMemoId);

/// Exclusive access to one credit memo's balance.
#[derive(Debug)]
pub struct MemoLock {
    credit_memo_id: CreditMemoId,
    _guard: OwnedMutexGuard<()>,
}

impl MemoLock {
    pub fn credit_memo_id(&self) -> CreditMemoId {
        self.credit_memo_id
    }
}

/// An amount known to be available on a credit memo, held under its lock.
///
/// Commit through the store while holding it, then drop it. Dropping without a
/// commit leaves the balance as it was.
#[derive(Debug)]
pub struct Reservation {
    credit_memo: CreditMemo,
    lock: MemoLock,
}

impl Reservation {
    /// Credit memo as read under the lock, before the reserved amount is drawn.
    pub fn credit_memo(&self) -> &CreditMemo {
        &self.credit_memo
    }

    pub fn credit_memo_id(&self) -> CreditMemoId {
        self.lock.credit_memo_id()
    }
}

pub struct CreditMemoBalanceTracker {
    store: Arc<dyn AllocationStore>,
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl CreditMemoBalanceTracker {
    pub fn new(store: Arc<dyn AllocationStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.len() > PRUNE_THRESHOLD {
            // Only the table holds a reference to an idle entry.
            locks.retain(|_, m| Arc::strong_count(m) > 1);
        }
        locks.entry(key).or_default().clone()
    }

    pub async fn lock(&self, tenant_id: TenantId, credit_memo_id: CreditMemoId) -> MemoLock {
        let guard = self.slot((tenant_id, credit_memo_id)).lock_owned().await;
        MemoLock {
            credit_memo_id,
            _guard: guard,
        }
    }

    /// Lock the memo and check it covers `amount`.
    ///
    /// `NotFound` if the memo does not exist for this tenant, `InsufficientCredit`
    /// if its available amount is below `amount`. The lock is released on error.
    pub async fn reserve(
        &self,
        tenant_id: TenantId,
        credit_memo_id: CreditMemoId,
        amount: Money,
    ) -> AllocationResult<Reservation> {
        let lock = self.lock(tenant_id, credit_memo_id).await;

        let credit_memo = self
            .store
            .credit_memo(tenant_id, credit_memo_id)
            .await?
            .ok_or_else(|| AllocationError::not_found(format!("credit memo {credit_memo_id}")))?;
        credit_memo.ensure_can_consume(amount)?;

        Ok(Reservation { credit_memo, lock })
    }

    pub fn release(&self, reservation: Reservation) {
        drop(reservation);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use arledger_allocation::CustomerId;

    use super::*;
    use crate::store::InMemoryAllocationStore;

    async fn tracker_with_memo(total_cents: i64) -> (CreditMemoBalanceTracker, TenantId, CreditMemo) {
        let store = Arc::new(InMemoryAllocationStore::new());
        let tenant = TenantId::new();
        let memo =
            CreditMemo::issue(CustomerId::new(), "memo", Money::from_cents(total_cents), None)
                .unwrap();
        store.register_credit_memo(tenant, memo.clone()).await.unwrap();
        (CreditMemoBalanceTracker::new(store), tenant, memo)
    }

    #[tokio::test]
    async fn reserve_checks_availability() {
        let (tracker, tenant, memo) = tracker_with_memo(4_000).await;

        let reservation = tracker
            .reserve(tenant, memo.id, Money::from_cents(2_500))
            .await
            .unwrap();
        assert_eq!(reservation.credit_memo().available_amount, Money::from_cents(4_000));
        tracker.release(reservation);

        let err = tracker
            .reserve(tenant, memo.id, Money::from_cents(5_000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "insufficient_credit");
    }

    #[tokio::test]
    async fn unknown_memo_is_not_found() {
        let (tracker, tenant, _) = tracker_with_memo(4_000).await;
        let err = tracker
            .reserve(tenant, CreditMemoId::new(), Money::from_cents(100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn reservation_excludes_other_holders_until_released() {
        let (tracker, tenant, memo) = tracker_with_memo(4_000).await;
        let tracker = Arc::new(tracker);

        let held = tracker
            .reserve(tenant, memo.id, Money::from_cents(100))
            .await
            .unwrap();

        let contender = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.lock(tenant, memo.id).await.credit_memo_id() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        tracker.release(held);
        assert_eq!(contender.await.unwrap(), memo.id);
    }

    #[tokio::test]
    async fn different_memos_do_not_contend() {
        let (tracker, tenant, memo) = tracker_with_memo(4_000).await;
        let _held = tracker.lock(tenant, memo.id).await;
        let other = tracker.lock(tenant, CreditMemoId::new()).await;
        assert_ne!(other.credit_memo_id(), memo.id);
    }
}
