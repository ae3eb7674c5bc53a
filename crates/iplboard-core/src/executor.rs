//! Query executor: lazy shared connection plus a TTL result cache
//!
//! Results are cached per statement (SQL text and bound values). Repeated
//! identical statements inside the TTL are answered without touching the
//! warehouse; a TTL of zero bypasses the cache entirely.
//!
//! The warehouse connection is opened on first use and shared by every
//! caller. A `Connection` failure drops it so the next call reconnects.

use crate::config::{DashboardConfig, DEFAULT_CACHE_TTL_SECS};
use crate::error::CoreError;
use crate::models::ResultTable;
use crate::query::{Dialect, Statement};
use crate::warehouse::{Connector, Warehouse};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Configuration for QueryExecutor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// TTL applied by `execute`
    pub default_ttl: Duration,

    /// Maximum number of cached statements
    pub max_capacity: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_capacity: 256,
        }
    }
}

impl From<&DashboardConfig> for ExecutorConfig {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            default_ttl: config.cache_ttl(),
            max_capacity: config.cache_capacity,
        }
    }
}

#[derive(Clone)]
struct CachedResult {
    table: Arc<ResultTable>,
    cached_at: DateTime<Utc>,
    fetched: Instant,
    ttl: Duration,
}

/// Each entry lives for the TTL it was inserted with
struct PerEntryTtl;

impl Expiry<Statement, CachedResult> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &Statement,
        value: &CachedResult,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &Statement,
        value: &CachedResult,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Counters for the cache and the connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub hits: u64,
    pub misses: u64,
    pub warehouse_calls: u64,
    pub connections_opened: u64,
    pub entries: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    warehouse_calls: AtomicU64,
    connections_opened: AtomicU64,
}

/// Runs statements against the warehouse, caching their results
pub struct QueryExecutor {
    connector: Arc<dyn Connector>,
    connection: Mutex<Option<Arc<dyn Warehouse>>>,
    cache: Cache<Statement, CachedResult>,
    config: ExecutorConfig,
    counters: Counters,
}

impl QueryExecutor {
    /// Create an executor; no connection is opened until the first query
    pub fn new(connector: Arc<dyn Connector>, config: ExecutorConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            connector,
            connection: Mutex::new(None),
            cache,
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.connector.dialect()
    }

    /// Execute with the default TTL
    pub async fn execute(&self, statement: &Statement) -> Result<Arc<ResultTable>, CoreError> {
        self.execute_with_ttl(statement, self.config.default_ttl).await
    }

    /// Execute, reusing a cached result younger than `ttl`
    ///
    /// Failures are never cached: the next call for the same statement goes
    /// to the warehouse again.
    pub async fn execute_with_ttl(
        &self,
        statement: &Statement,
        ttl: Duration,
    ) -> Result<Arc<ResultTable>, CoreError> {
        if !ttl.is_zero() {
            // An entry stored with a longer TTL is still too old for a shorter one
            if let Some(hit) = self
                .cache
                .get(statement)
                .await
                .filter(|hit| hit.fetched.elapsed() < ttl)
            {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    sql = statement.sql(),
                    cached_at = %hit.cached_at,
                    "Query cache hit"
                );
                return Ok(hit.table);
            }
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let warehouse = self.warehouse().await?;
        let started = Instant::now();
        self.counters.warehouse_calls.fetch_add(1, Ordering::Relaxed);

        match warehouse.execute(statement).await {
            Ok(table) => {
                tracing::debug!(
                    sql = statement.sql(),
                    params = statement.params().len(),
                    rows = table.row_count(),
                    duration_ms = started.elapsed().as_millis(),
                    "Query executed"
                );
                let table = Arc::new(table);
                if !ttl.is_zero() {
                    self.cache
                        .insert(
                            statement.clone(),
                            CachedResult {
                                table: Arc::clone(&table),
                                cached_at: Utc::now(),
                                fetched: Instant::now(),
                                ttl,
                            },
                        )
                        .await;
                }
                Ok(table)
            }
            Err(e) => {
                tracing::warn!(sql = statement.sql(), error = %e, "Query failed");
                if matches!(e, CoreError::Connection { .. }) {
                    self.drop_connection(&warehouse).await;
                }
                Err(e)
            }
        }
    }

    /// Shared session, opened on first use
    ///
    /// The lock is held while connecting so concurrent first callers share
    /// one connection attempt.
    async fn warehouse(&self) -> Result<Arc<dyn Warehouse>, CoreError> {
        let mut slot = self.connection.lock().await;
        if let Some(warehouse) = slot.as_ref() {
            return Ok(Arc::clone(warehouse));
        }

        let started = Instant::now();
        let warehouse = self.connector.connect().await.map_err(|e| {
            tracing::error!(target_db = %self.connector.describe(), error = %e, "Warehouse connection failed");
            e
        })?;
        self.counters
            .connections_opened
            .fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            target_db = %self.connector.describe(),
            duration_ms = started.elapsed().as_millis(),
            "Warehouse connection opened"
        );

        *slot = Some(Arc::clone(&warehouse));
        Ok(warehouse)
    }

    /// Drop the shared connection; the next query reconnects
    pub async fn reset_connection(&self) {
        if self.connection.lock().await.take().is_some() {
            tracing::info!(target_db = %self.connector.describe(), "Warehouse connection reset");
        }
    }

    /// Drop `failed` if it is still the shared connection
    ///
    /// A caller holding an older session must not discard one that another
    /// caller has already reopened.
    async fn drop_connection(&self, failed: &Arc<dyn Warehouse>) {
        let mut slot = self.connection.lock().await;
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, failed))
        {
            *slot = None;
            tracing::info!(target_db = %self.connector.describe(), "Warehouse connection reset");
        }
    }

    /// True once a connection has been opened and not reset since
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Forget every cached result
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        tracing::info!("Query cache cleared");
    }

    /// When the cached result for `statement` was fetched, if still cached
    pub async fn cached_at(&self, statement: &Statement) -> Option<DateTime<Utc>> {
        self.cache.get(statement).await.map(|hit| hit.cached_at)
    }

    pub async fn stats(&self) -> ExecutorStats {
        self.cache.run_pending_tasks().await;
        ExecutorStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            warehouse_calls: self.counters.warehouse_calls.load(Ordering::Relaxed),
            connections_opened: self.counters.connections_opened.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeConnector;
    use super::*;

    fn executor_with_ttl(ttl: Duration) -> (QueryExecutor, Arc<super::testing::FakeState>) {
        let (connector, state) = FakeConnector::new();
        let executor = QueryExecutor::new(
            connector,
            ExecutorConfig {
                default_ttl: ttl,
                ..ExecutorConfig::default()
            },
        );
        (executor, state)
    }

    fn stmt(sql: &str, seasons: &[&str]) -> Statement {
        let template = crate::query::QueryTemplate::new(
            "test-query",
            "",
            crate::query::SeasonScope::Direct,
            format!("{} {{season_filter}}", sql),
        )
        .unwrap();
        let filter = crate::filter::FilterState::parse(seasons.iter().copied()).unwrap();
        crate::query::QueryBuilder::build_template(&template, &filter)
    }

    #[tokio::test]
    async fn test_connection_is_lazy() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        assert!(!executor.is_connected().await);
        assert_eq!(state.connects.load(Ordering::SeqCst), 0);

        executor.execute(&Statement::raw("SELECT 1")).await.unwrap();
        executor.execute(&Statement::raw("SELECT 2")).await.unwrap();
        assert!(executor.is_connected().await);
        assert_eq!(state.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_connects_once() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        let a = Statement::raw("SELECT 1");
        let b = Statement::raw("SELECT 2");
        let c = Statement::raw("SELECT 3");
        let (ra, rb, rc) = tokio::join!(
            executor.execute(&a),
            executor.execute(&b),
            executor.execute(&c)
        );
        assert!(ra.is_ok() && rb.is_ok() && rc.is_ok());
        assert_eq!(state.connects.load(Ordering::SeqCst), 1);
        assert_eq!(executor.stats().await.connections_opened, 1);
    }

    #[tokio::test]
    async fn test_identical_statement_hits_cache() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        let statement = Statement::raw("SELECT COUNT(*) AS total FROM stg_matches");

        let first = executor.execute(&statement).await.unwrap();
        let second = executor.execute(&statement).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(state.executions.load(Ordering::SeqCst), 1);
        assert!(executor.cached_at(&statement).await.is_some());

        let stats = executor.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.warehouse_calls, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_bindings_are_part_of_cache_key() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        let a = stmt("SELECT x FROM t WHERE 1=1", &["2019"]);
        let b = stmt("SELECT x FROM t WHERE 1=1", &["2020"]);
        assert_eq!(a.sql(), b.sql());

        let ra = executor.execute(&a).await.unwrap();
        let rb = executor.execute(&b).await.unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 2);
        assert_eq!(ra.row(0).unwrap().text("PARAMS").unwrap(), "2019");
        assert_eq!(rb.row(0).unwrap().text("PARAMS").unwrap(), "2020");
    }

    #[tokio::test]
    async fn test_zero_ttl_bypasses_cache() {
        let (executor, state) = executor_with_ttl(Duration::ZERO);
        let statement = Statement::raw("SELECT 1");

        executor.execute(&statement).await.unwrap();
        executor.execute(&statement).await.unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 2);
        assert!(executor.cached_at(&statement).await.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let (executor, state) = executor_with_ttl(Duration::from_millis(50));
        let statement = Statement::raw("SELECT 1");

        executor.execute(&statement).await.unwrap();
        executor.execute(&statement).await.unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let refreshed = executor.execute(&statement).await.unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed.row(0).unwrap().int("CALL").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_per_call_ttl() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        let statement = Statement::raw("SELECT 1");

        executor
            .execute_with_ttl(&statement, Duration::ZERO)
            .await
            .unwrap();
        assert!(executor.cached_at(&statement).await.is_none());

        executor.execute(&statement).await.unwrap();
        executor.execute(&statement).await.unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shorter_per_call_ttl_refetches_older_entry() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        let statement = Statement::raw("SELECT 1");

        executor.execute(&statement).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        // still cached under the 60s default
        executor.execute(&statement).await.unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 1);

        let fresh = executor
            .execute_with_ttl(&statement, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 2);
        assert_eq!(fresh.row(0).unwrap().int("CALL").unwrap(), 2);

        // a young entry satisfies the short TTL
        executor
            .execute_with_ttl(&statement, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        state
            .failures
            .lock()
            .push_back(CoreError::query("Object 'FCT_MISSING' does not exist"));
        let statement = Statement::raw("SELECT * FROM fct_missing");

        let err = executor.execute(&statement).await.unwrap_err();
        assert!(matches!(err, CoreError::Query { .. }));
        // a query error leaves the connection alone
        assert!(executor.is_connected().await);

        executor.execute(&statement).await.unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connection_error_forces_reconnect() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        executor.execute(&Statement::raw("SELECT 1")).await.unwrap();

        state
            .failures
            .lock()
            .push_back(CoreError::connection("session expired"));
        let err = executor
            .execute(&Statement::raw("SELECT 2"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Connection { .. }));
        assert!(!executor.is_connected().await);

        executor.execute(&Statement::raw("SELECT 2")).await.unwrap();
        assert_eq!(state.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_connection_error_keeps_reopened_session() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        let stale = executor.warehouse().await.unwrap();

        executor.reset_connection().await;
        let fresh = executor.warehouse().await.unwrap();
        assert_eq!(state.connects.load(Ordering::SeqCst), 2);

        // an error reported against the old session leaves the new one alone
        executor.drop_connection(&stale).await;
        assert!(executor.is_connected().await);
        executor.execute(&Statement::raw("SELECT 1")).await.unwrap();
        assert_eq!(state.connects.load(Ordering::SeqCst), 2);

        executor.drop_connection(&fresh).await;
        assert!(!executor.is_connected().await);
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried_next_call() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        state.refuse_connect.store(true, Ordering::SeqCst);

        let err = executor
            .execute(&Statement::raw("SELECT 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Connection { .. }));
        assert_eq!(state.executions.load(Ordering::SeqCst), 0);

        state.refuse_connect.store(false, Ordering::SeqCst);
        executor.execute(&Statement::raw("SELECT 1")).await.unwrap();
        assert_eq!(state.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let (executor, state) = executor_with_ttl(Duration::from_secs(60));
        let statement = Statement::raw("SELECT 1");

        executor.execute(&statement).await.unwrap();
        executor.invalidate_all();
        executor.execute(&statement).await.unwrap();
        assert_eq!(state.executions.load(Ordering::SeqCst), 2);
    }
}
