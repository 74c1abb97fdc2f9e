//! Per-tenant connection pool
//!
//! Owns at most one live warehouse session per tenant id. Acquisition
//! for a given tenant is serialized through a keyed async mutex so two
//! concurrent requests never both open a connection, while different
//! tenants proceed fully in parallel.

use crate::config::tenant::TenantConnectionConfig;
use crate::error::SnowResult;
use crate::warehouse::driver::{WarehouseConnection, WarehouseDriver};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Default)]
struct Slot {
    connection: Option<Arc<dyn WarehouseConnection>>,
}

/// Pool statistics snapshot
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Tenants with a pool slot (live or previously live)
    pub tracked_tenants: usize,
    /// Slots currently holding a connection that reports alive
    pub live_connections: usize,
}

/// Process-wide connection pool, shared by all request handlers.
pub struct ConnectionPool {
    driver: Arc<dyn WarehouseDriver>,
    slots: DashMap<String, Arc<Mutex<Slot>>>,
}

impl ConnectionPool {
    pub fn new(driver: Arc<dyn WarehouseDriver>) -> Self {
        Self {
            driver,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, tenant_id: &str) -> Arc<Mutex<Slot>> {
        self.slots
            .entry(tenant_id.to_string())
            .or_default()
            .clone()
    }

    /// Get the tenant's live connection, opening one if needed.
    ///
    /// An existing connection is returned only after its liveness check
    /// passes; a dead connection is evicted and replaced transparently.
    /// There is no implicit reconnect anywhere else; failures after
    /// acquisition surface to the caller.
    pub async fn acquire(
        &self,
        tenant_id: &str,
        config: &TenantConnectionConfig,
    ) -> SnowResult<Arc<dyn WarehouseConnection>> {
        let slot = self.slot(tenant_id);
        let mut guard = slot.lock().await;

        if let Some(existing) = guard.connection.clone() {
            if existing.ping().await {
                return Ok(existing);
            }
            debug!(tenant_id, "evicting dead warehouse connection");
            existing.close().await;
            guard.connection = None;
        }

        let connection = self.driver.connect(config).await?;
        info!(tenant_id, "opened warehouse connection");
        guard.connection = Some(connection.clone());
        Ok(connection)
    }

    /// Forcibly close and evict the tenant's connection.
    ///
    /// Used for credential rotation or tenant deactivation; a later
    /// acquire opens a fresh session with the then-current config.
    pub async fn destroy(&self, tenant_id: &str) {
        let Some(slot) = self.slots.get(tenant_id).map(|s| s.clone()) else {
            return;
        };
        let mut guard = slot.lock().await;
        if let Some(connection) = guard.connection.take() {
            info!(tenant_id, "destroying warehouse connection");
            connection.close().await;
        }
    }

    /// Connectivity check: acquire (opening if needed) and ping.
    pub async fn check_connectivity(
        &self,
        tenant_id: &str,
        config: &TenantConnectionConfig,
    ) -> SnowResult<bool> {
        let connection = self.acquire(tenant_id, config).await?;
        Ok(connection.ping().await)
    }

    /// Close every live connection. The single teardown path for the
    /// pool; slots stay usable afterwards (a later acquire reconnects).
    pub async fn shutdown(&self) {
        // Snapshot the slots first so no map guard is held across await.
        let slots: Vec<Arc<Mutex<Slot>>> =
            self.slots.iter().map(|entry| entry.value().clone()).collect();
        for slot in slots {
            let mut guard = slot.lock().await;
            if let Some(connection) = guard.connection.take() {
                connection.close().await;
            }
        }
        info!("connection pool shut down");
    }

    /// Current pool statistics
    pub async fn stats(&self) -> PoolStats {
        let slots: Vec<Arc<Mutex<Slot>>> =
            self.slots.iter().map(|entry| entry.value().clone()).collect();
        let tracked = slots.len();
        let mut live = 0;
        for slot in slots {
            let guard = slot.lock().await;
            if let Some(connection) = &guard.connection {
                if connection.ping().await {
                    live += 1;
                }
            }
        }
        PoolStats {
            tracked_tenants: tracked,
            live_connections: live,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tenant::Credential;
    use crate::error::SnowError;
    use crate::warehouse::driver::RowSet;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn config() -> TenantConnectionConfig {
        TenantConnectionConfig {
            account: "acme".to_string(),
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

    struct FakeConnection {
        alive: AtomicBool,
    }

    #[async_trait]
    impl WarehouseConnection for FakeConnection {
        async fn ping(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        async fn execute(&self, _sql: &str) -> SnowResult<RowSet> {
            Ok(RowSet::default())
        }

        async fn close(&self) {
            self.alive.store(false, Ordering::SeqCst);
        }
    }

    struct CountingDriver {
        connects: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingDriver {
        fn new() -> Self {
            Self {
                connects: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl WarehouseDriver for CountingDriver {
        async fn connect(
            &self,
            _config: &TenantConnectionConfig,
        ) -> SnowResult<Arc<dyn WarehouseConnection>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SnowError::connection("handshake refused"));
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeConnection {
                alive: AtomicBool::new(true),
            }))
        }
    }

    #[tokio::test]
    async fn acquire_reuses_the_live_connection() {
        let driver = Arc::new(CountingDriver::new());
        let pool = ConnectionPool::new(driver.clone());

        let first = pool.acquire("t1", &config()).await.unwrap();
        let second = pool.acquire("t1", &config()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(driver.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dead_connection_is_replaced_on_next_acquire() {
        let driver = Arc::new(CountingDriver::new());
        let pool = ConnectionPool::new(driver.clone());

        let first = pool.acquire("t1", &config()).await.unwrap();
        first.close().await;

        let second = pool.acquire("t1", &config()).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(driver.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn destroy_evicts_and_next_acquire_reconnects() {
        let driver = Arc::new(CountingDriver::new());
        let pool = ConnectionPool::new(driver.clone());

        pool.acquire("t1", &config()).await.unwrap();
        pool.destroy("t1").await;
        pool.acquire("t1", &config()).await.unwrap();
        assert_eq!(driver.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_acquires_for_one_tenant_open_one_connection() {
        let driver = Arc::new(CountingDriver::new());
        let pool = Arc::new(ConnectionPool::new(driver.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.acquire("t1", &config()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(driver.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_failure_propagates_and_caches_nothing() {
        let driver = Arc::new(CountingDriver::new());
        driver.fail.store(true, Ordering::SeqCst);
        let pool = ConnectionPool::new(driver.clone());

        assert!(matches!(
            pool.acquire("t1", &config()).await,
            Err(SnowError::Connection(_))
        ));

        driver.fail.store(false, Ordering::SeqCst);
        pool.acquire("t1", &config()).await.unwrap();
        assert_eq!(driver.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stats_count_live_connections() {
        let driver = Arc::new(CountingDriver::new());
        let pool = ConnectionPool::new(driver);

        pool.acquire("t1", &config()).await.unwrap();
        pool.acquire("t2", &config()).await.unwrap();
        pool.destroy("t2").await;

        let stats = pool.stats().await;
        assert_eq!(stats.tracked_tenants, 2);
        assert_eq!(stats.live_connections, 1);
    }
}
