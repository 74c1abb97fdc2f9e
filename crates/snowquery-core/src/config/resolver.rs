//! Tenant configuration resolution
//!
//! One resolver, two backends: tenant records from the metadata store,
//! or a process-wide fallback config (single "default" tenant, used for
//! unauthenticated/demo operation). The rest of the pipeline is
//! backend-agnostic.

use crate::config::env::load_env_config;
use crate::config::tenant::TenantConnectionConfig;
use crate::error::{SnowError, SnowResult};
use crate::metadata::store::MetadataStore;
use std::sync::Arc;
use tracing::debug;

/// Resolves the active connection parameters for a tenant.
///
/// Resolution is cheap and happens once per request; the resolved config
/// is never cached beyond the pool's connection object.
pub struct TenantConfigResolver {
    store: Arc<dyn MetadataStore>,
    fallback: Option<TenantConnectionConfig>,
}

impl TenantConfigResolver {
    /// Resolver over a metadata store with no fallback config.
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            fallback: None,
        }
    }

    /// Resolver with an explicit fallback config for tenants that have
    /// no store record.
    pub fn with_fallback(store: Arc<dyn MetadataStore>, fallback: TenantConnectionConfig) -> Self {
        Self {
            store,
            fallback: Some(fallback),
        }
    }

    /// Resolver whose fallback comes from `SNOWFLAKE_*` environment
    /// variables. Absence of those variables is not an error here; it
    /// only means tenants without store records cannot resolve.
    pub fn from_env(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            fallback: load_env_config().ok(),
            store,
        }
    }

    /// Resolve and validate the config for `tenant_id`.
    ///
    /// Store records win; the fallback applies only when the store has
    /// no record. No usable source is a `Configuration` error.
    pub async fn resolve(&self, tenant_id: &str) -> SnowResult<TenantConnectionConfig> {
        if let Some(config) = self.store.get_tenant_config(tenant_id).await? {
            config.validate()?;
            return Ok(config);
        }

        debug!(tenant_id, "no tenant record, using fallback configuration");
        match &self.fallback {
            Some(config) => {
                config.validate()?;
                Ok(config.clone())
            }
            None => Err(SnowError::configuration(format!(
                "no warehouse configuration available for tenant {tenant_id}"
            ))),
        }
    }

    /// Whether the tenant has a record in the metadata store (as opposed
    /// to resolving through the fallback path).
    pub async fn has_tenant_record(&self, tenant_id: &str) -> SnowResult<bool> {
        Ok(self.store.get_tenant_config(tenant_id).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tenant::Credential;
    use crate::metadata::store::InMemoryMetadataStore;

    fn config(account: &str) -> TenantConnectionConfig {
        TenantConnectionConfig {
            account: account.to_string(),
            user: "svc".to_string(),
            credential: Credential::Password("pw".to_string()),
            warehouse: "WH".to_string(),
            database: "DB".to_string(),
            schemas: vec!["PUBLIC".to_string()],
            role: "PUBLIC".to_string(),
            max_rows_per_query: 100,
            query_timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn store_record_wins_over_fallback() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.put_tenant_config("t1", config("tenant-account"));

        let resolver = TenantConfigResolver::with_fallback(store, config("fallback-account"));
        let resolved = resolver.resolve("t1").await.unwrap();
        assert_eq!(resolved.account, "tenant-account");
    }

    #[tokio::test]
    async fn fallback_applies_without_store_record() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let resolver = TenantConfigResolver::with_fallback(store, config("fallback-account"));
        let resolved = resolver.resolve("unknown").await.unwrap();
        assert_eq!(resolved.account, "fallback-account");
    }

    #[tokio::test]
    async fn no_source_is_a_configuration_error() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let resolver = TenantConfigResolver::new(store);
        assert!(matches!(
            resolver.resolve("unknown").await,
            Err(SnowError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn invalid_store_record_is_rejected() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let mut bad = config("tenant-account");
        bad.max_rows_per_query = 1;
        store.put_tenant_config("t1", bad);

        let resolver = TenantConfigResolver::new(store);
        assert!(matches!(
            resolver.resolve("t1").await,
            Err(SnowError::Configuration(_))
        ));
    }
}
