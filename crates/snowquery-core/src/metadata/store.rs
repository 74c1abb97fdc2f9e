//! Metadata store collaborator interface
//!
//! The store owns tenant records, curated metadata, the business
//! glossary, and the persisted schema snapshot. It lives outside this
//! crate (the original system keeps it in a relational database); the
//! core consumes it through this trait and tolerates absent records in
//! fallback mode.

use crate::config::tenant::TenantConnectionConfig;
use crate::error::SnowResult;
use crate::metadata::overlay::{BusinessTerm, TableOverlay};
use crate::schema::snapshot::SchemaSnapshot;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read/write access to tenant records and curated metadata.
///
/// Every getter may report "absent" (rather than erroring) when running
/// in no-tenant fallback mode. Implementations must be safe for
/// concurrent use.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Connection parameters for an active tenant, if one is recorded
    async fn get_tenant_config(
        &self,
        tenant_id: &str,
    ) -> SnowResult<Option<TenantConnectionConfig>>;

    /// The persisted schema snapshot, if one has been saved
    async fn get_cached_schema(&self, tenant_id: &str) -> SnowResult<Option<SchemaSnapshot>>;

    /// Persist a freshly introspected snapshot against the tenant record
    async fn save_schema(&self, tenant_id: &str, snapshot: &SchemaSnapshot) -> SnowResult<()>;

    /// Curated table/column overlays for the tenant
    async fn get_table_metadata(&self, tenant_id: &str) -> SnowResult<Vec<TableOverlay>>;

    /// Business glossary terms for the tenant
    async fn get_business_terms(&self, tenant_id: &str) -> SnowResult<Vec<BusinessTerm>>;
}

/// In-process metadata store.
///
/// Serves two purposes: the backing store in fallback/demo deployments
/// (where it stays empty and every getter reports absent), and a
/// scriptable store for tests.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    tenants: HashMap<String, TenantConnectionConfig>,
    snapshots: HashMap<String, SchemaSnapshot>,
    table_metadata: HashMap<String, Vec<TableOverlay>>,
    business_terms: HashMap<String, Vec<BusinessTerm>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a tenant record
    pub fn put_tenant_config(&self, tenant_id: impl Into<String>, config: TenantConnectionConfig) {
        self.inner.write().tenants.insert(tenant_id.into(), config);
    }

    /// Register curated table metadata for a tenant
    pub fn put_table_metadata(&self, tenant_id: impl Into<String>, overlays: Vec<TableOverlay>) {
        self.inner
            .write()
            .table_metadata
            .insert(tenant_id.into(), overlays);
    }

    /// Register glossary terms for a tenant
    pub fn put_business_terms(&self, tenant_id: impl Into<String>, terms: Vec<BusinessTerm>) {
        self.inner
            .write()
            .business_terms
            .insert(tenant_id.into(), terms);
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get_tenant_config(
        &self,
        tenant_id: &str,
    ) -> SnowResult<Option<TenantConnectionConfig>> {
        Ok(self.inner.read().tenants.get(tenant_id).cloned())
    }

    async fn get_cached_schema(&self, tenant_id: &str) -> SnowResult<Option<SchemaSnapshot>> {
        Ok(self.inner.read().snapshots.get(tenant_id).cloned())
    }

    async fn save_schema(&self, tenant_id: &str, snapshot: &SchemaSnapshot) -> SnowResult<()> {
        self.inner
            .write()
            .snapshots
            .insert(tenant_id.to_string(), snapshot.clone());
        Ok(())
    }

    async fn get_table_metadata(&self, tenant_id: &str) -> SnowResult<Vec<TableOverlay>> {
        Ok(self
            .inner
            .read()
            .table_metadata
            .get(tenant_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_business_terms(&self, tenant_id: &str) -> SnowResult<Vec<BusinessTerm>> {
        Ok(self
            .inner
            .read()
            .business_terms
            .get(tenant_id)
            .cloned()
            .unwrap_or_default())
    }
}
