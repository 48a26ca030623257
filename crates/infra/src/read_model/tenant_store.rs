use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use arledger_core::TenantId;

/// Tenant-isolated key/value store.
///
/// Every read and write is keyed by `(tenant, key)`; there is no way to reach
/// another tenant's rows through this interface.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);

    /// Read-modify-write under one lock. `f` receives the current value, if any.
    fn update(&self, tenant_id: TenantId, key: K, f: &mut dyn FnMut(Option<&V>) -> V) -> V;

    fn list(&self, tenant_id: TenantId) -> Vec<V>;
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn update(&self, tenant_id: TenantId, key: K, f: &mut dyn FnMut(Option<&V>) -> V) -> V {
        (**self).update(tenant_id, key, f)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }
}

/// In-memory tenant-isolated store for tests/dev.
///
/// A poisoned lock is recovered rather than propagated: values are plain data and
/// every write replaces a whole entry.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(&(tenant_id, key.clone())).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert((tenant_id, key), value);
    }

    fn update(&self, tenant_id: TenantId, key: K, f: &mut dyn FnMut(Option<&V>) -> V) -> V {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let slot = (tenant_id, key);
        let next = f(map.get(&slot));
        map.insert(slot, next.clone());
        next
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenants_do_not_see_each_other() {
        let store: InMemoryTenantStore<u32, &'static str> = InMemoryTenantStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());

        store.upsert(a, 1, "a-one");
        store.upsert(b, 1, "b-one");

        assert_eq!(store.get(a, &1), Some("a-one"));
        assert_eq!(store.list(b), vec!["b-one"]);
        assert_eq!(store.get(TenantId::new(), &1), None);
    }

    #[test]
    fn update_sees_previous_value() {
        let store: InMemoryTenantStore<&'static str, i64> = InMemoryTenantStore::new();
        let tenant = TenantId::new();

        store.update(tenant, "paid", &mut |prev| prev.copied().unwrap_or(0) + 10);
        let total = store.update(tenant, "paid", &mut |prev| prev.copied().unwrap_or(0) + 5);

        assert_eq!(total, 15);
    }
}
