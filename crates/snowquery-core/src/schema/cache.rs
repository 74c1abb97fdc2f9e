//! Staleness-bounded schema cache
//!
//! Tenants with a store record persist their snapshot through the
//! metadata store with a one-hour TTL; fallback tenants cache in process
//! memory with a thirty-minute TTL (so the first request after process
//! start always pays the introspection cost). Refreshes are
//! single-flighted per tenant, and a stale snapshot is never served as a
//! fallback for a failed refresh; stale schema can produce SQL against
//! columns that no longer exist.

use crate::config::resolver::TenantConfigResolver;
use crate::error::SnowResult;
use crate::metadata::store::MetadataStore;
use crate::schema::introspect::SchemaIntrospector;
use crate::schema::snapshot::SchemaSnapshot;
use crate::warehouse::pool::ConnectionPool;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// TTL for snapshots persisted through the metadata store
pub const STORE_TTL_SECS: i64 = 3600;
/// TTL for the in-process fallback cache
pub const MEMORY_TTL_SECS: i64 = 1800;

pub struct SchemaCache {
    resolver: Arc<TenantConfigResolver>,
    pool: Arc<ConnectionPool>,
    store: Arc<dyn MetadataStore>,
    /// Fallback-mode snapshots, keyed by tenant id
    memory: DashMap<String, SchemaSnapshot>,
    /// Per-tenant refresh guards (single-flight)
    flights: DashMap<String, Arc<Mutex<()>>>,
}

impl SchemaCache {
    pub fn new(
        resolver: Arc<TenantConfigResolver>,
        pool: Arc<ConnectionPool>,
        store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            resolver,
            pool,
            store,
            memory: DashMap::new(),
            flights: DashMap::new(),
        }
    }

    /// Get the tenant's snapshot, refreshing when missing or expired.
    #[instrument(skip(self))]
    pub async fn get(&self, tenant_id: &str) -> SnowResult<SchemaSnapshot> {
        let store_mode = self.resolver.has_tenant_record(tenant_id).await?;

        if let Some(snapshot) = self.lookup(tenant_id, store_mode).await? {
            return Ok(snapshot);
        }

        // Cold or expired: single-flight the refresh so N concurrent
        // requests trigger exactly one introspection pass.
        let flight = self.flight(tenant_id);
        let _guard = flight.lock().await;
        if let Some(snapshot) = self.lookup(tenant_id, store_mode).await? {
            debug!(tenant_id, "snapshot refreshed by concurrent request");
            return Ok(snapshot);
        }
        self.refresh_locked(tenant_id, store_mode).await
    }

    /// Force an introspection pass, bypassing the TTL.
    #[instrument(skip(self))]
    pub async fn refresh(&self, tenant_id: &str) -> SnowResult<SchemaSnapshot> {
        let store_mode = self.resolver.has_tenant_record(tenant_id).await?;
        let flight = self.flight(tenant_id);
        let _guard = flight.lock().await;
        self.refresh_locked(tenant_id, store_mode).await
    }

    fn flight(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        self.flights
            .entry(tenant_id.to_string())
            .or_default()
            .clone()
    }

    async fn lookup(
        &self,
        tenant_id: &str,
        store_mode: bool,
    ) -> SnowResult<Option<SchemaSnapshot>> {
        if store_mode {
            if let Some(snapshot) = self.store.get_cached_schema(tenant_id).await? {
                if !snapshot.is_stale(STORE_TTL_SECS) {
                    return Ok(Some(snapshot));
                }
            }
        } else if let Some(entry) = self.memory.get(tenant_id) {
            if !entry.value().is_stale(MEMORY_TTL_SECS) {
                return Ok(Some(entry.value().clone()));
            }
        }
        Ok(None)
    }

    /// Introspect and persist. Caller must hold the tenant's flight
    /// lock. Failures propagate; a stale snapshot is never substituted.
    async fn refresh_locked(
        &self,
        tenant_id: &str,
        store_mode: bool,
    ) -> SnowResult<SchemaSnapshot> {
        let config = self.resolver.resolve(tenant_id).await?;
        let connection = self.pool.acquire(tenant_id, &config).await?;
        let snapshot =
            SchemaIntrospector::introspect(&connection, &config.database, &config.schemas).await?;

        if store_mode {
            self.store.save_schema(tenant_id, &snapshot).await?;
        } else {
            self.memory.insert(tenant_id.to_string(), snapshot.clone());
        }
        info!(
            tenant_id,
            tables = snapshot.tables.len(),
            store_mode,
            "schema snapshot refreshed"
        );
        Ok(snapshot)
    }
}
