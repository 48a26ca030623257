//! Tenant-isolated key/value storage backing the in-memory collaborator adapters.

pub mod tenant_store;

pub use tenant_store::{InMemoryTenantStore, TenantStore};
