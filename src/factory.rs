//! Ambient database factory.
//!
//! The factory moves through three states:
//! - **Unconfigured**: no connection string or provider. Data operations fail
//!   with [`DbError::NotConfigured`].
//! - **Configured**: [`DatabaseFactory::configure`] (or
//!   [`configure_with_driver`](DatabaseFactory::configure_with_driver)) stored
//!   the connection settings. Nothing has been resolved yet.
//! - **Initialized**: the first [`sql_context`](DatabaseFactory::sql_context)
//!   or [`create_database`](DatabaseFactory::create_database) call resolved
//!   the dialect, opened the driver, probed connectivity, picked the bulk
//!   strategies and built the shared metadata cache.
//!
//! Initialization runs once per configuration. Concurrent first callers await
//! the same in-flight initialization through a `tokio::sync::OnceCell`. A
//! failed initialization is cached and handed to every later caller until the
//! factory is reconfigured. [`dispose`](DatabaseFactory::dispose) closes the
//! driver and returns the factory to Configured.

use crate::bulk::BulkInsertStrategy;
use crate::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_QUERY_TIMEOUT_SECS, DatabaseConfig};
use crate::database::Database;
use crate::db::{Driver, Profiler, RetryPolicy, SqlxDriver};
use crate::dialect::{Dialect, ProviderRegistry};
use crate::error::{DbError, DbResult};
use crate::metadata::MetadataCache;
use crate::sql::SqlContext;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// State produced by initialization, shared read-only by every handle.
pub(crate) struct SharedState {
    pub(crate) ctx: SqlContext,
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) provider: String,
    pub(crate) server_version: String,
    pub(crate) specialized: Option<Arc<dyn BulkInsertStrategy>>,
    pub(crate) fallback: Arc<dyn BulkInsertStrategy>,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) profiler: Option<Arc<Profiler>>,
    pub(crate) statement_timeout: Duration,
    pub(crate) connect_timeout: Duration,
}

/// One configuration and its (lazily computed) initialization outcome.
struct Configured {
    config: DatabaseConfig,
    /// Set when the caller supplied the driver; otherwise sqlx opens one.
    driver: Option<Arc<dyn Driver>>,
    state: OnceCell<DbResult<Arc<SharedState>>>,
}

impl Configured {
    fn new(config: DatabaseConfig, driver: Option<Arc<dyn Driver>>) -> Self {
        Self {
            config,
            driver,
            state: OnceCell::new(),
        }
    }

    fn initialized(&self) -> Option<&Arc<SharedState>> {
        self.state.get().and_then(|outcome| outcome.as_ref().ok())
    }
}

/// What an initialized factory resolved, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct FactoryReport {
    pub provider: String,
    pub dialect: Dialect,
    pub server_version: String,
    pub bulk_strategy: &'static str,
    pub native_bulk_strategy: Option<&'static str>,
    pub retry: Option<RetryPolicy>,
    pub profiling: bool,
}

pub struct DatabaseFactory {
    registry: Arc<ProviderRegistry>,
    configured: RwLock<Option<Arc<Configured>>>,
    retry: Option<RetryPolicy>,
    profiler: Option<Arc<Profiler>>,
    statement_timeout: Duration,
    connect_timeout: Duration,
    initializations: AtomicUsize,
}

impl std::fmt::Debug for DatabaseFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseFactory")
            .field("configured", &self.is_configured())
            .field("initialized", &self.is_initialized())
            .field("retry", &self.retry)
            .field("profiling", &self.profiler.is_some())
            .finish()
    }
}

impl Default for DatabaseFactory {
    fn default() -> Self {
        Self::new(ProviderRegistry::with_builtins())
    }
}

impl DatabaseFactory {
    /// Create an unconfigured factory over the given provider registry.
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            configured: RwLock::new(None),
            retry: None,
            profiler: None,
            statement_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            initializations: AtomicUsize::new(0),
        }
    }

    /// Retry transient failures with this policy. Overrides retry options
    /// embedded in the connection URL.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Add the profiler layer to every connection.
    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiler = enabled.then(|| Arc::new(Profiler::new()));
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Configure the factory for the bundled sqlx driver.
    ///
    /// Replaces any previous configuration, including a cached initialization
    /// outcome.
    pub fn configure(&self, config: DatabaseConfig) -> DbResult<()> {
        self.store(config, None)
    }

    /// Configure the factory with a caller-supplied driver.
    pub fn configure_with_driver(
        &self,
        connection_string: impl Into<String>,
        provider: impl Into<String>,
        driver: Arc<dyn Driver>,
    ) -> DbResult<()> {
        self.store(
            DatabaseConfig::external(connection_string, provider),
            Some(driver),
        )
    }

    fn store(&self, config: DatabaseConfig, driver: Option<Arc<dyn Driver>>) -> DbResult<()> {
        if config.provider.trim().is_empty() {
            return Err(DbError::configuration("Provider name is empty", None));
        }
        let provider = config.provider.clone();
        config
            .pool_options
            .validate()
            .and_then(|_| config.retry_options.validate())
            .map_err(|e| DbError::configuration(e, Some(&provider)))?;

        info!(
            provider = %provider,
            url = %config.masked_connection_string(),
            external_driver = driver.is_some(),
            "Database factory configured"
        );

        let previous = self.write_slot()?.replace(Arc::new(Configured::new(config, driver)));
        if previous.as_deref().and_then(Configured::initialized).is_some() {
            debug!("Previous configuration replaced; its driver closes when the last handle drops");
        }
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.current().is_ok()
    }

    /// Whether initialization ran and succeeded for the current configuration.
    pub fn is_initialized(&self) -> bool {
        self.current()
            .map(|c| c.initialized().is_some())
            .unwrap_or(false)
    }

    /// Number of initialization sequences this factory has started.
    pub fn initialization_count(&self) -> usize {
        self.initializations.load(Ordering::Acquire)
    }

    fn current(&self) -> DbResult<Arc<Configured>> {
        let slot = self
            .configured
            .read()
            .map_err(|_| DbError::internal("Factory lock poisoned"))?;
        slot.clone().ok_or(DbError::NotConfigured)
    }

    fn write_slot(&self) -> DbResult<std::sync::RwLockWriteGuard<'_, Option<Arc<Configured>>>> {
        self.configured
            .write()
            .map_err(|_| DbError::internal("Factory lock poisoned"))
    }

    // -------------------------------------------------------------------------
    // Initialization
    // -------------------------------------------------------------------------

    /// Run initialization if it has not run for the current configuration.
    pub async fn initialize(&self) -> DbResult<()> {
        self.state().await.map(|_| ())
    }

    pub(crate) async fn state(&self) -> DbResult<Arc<SharedState>> {
        let configured = self.current()?;
        configured
            .state
            .get_or_init(|| self.build_state(&configured))
            .await
            .clone()
    }

    async fn build_state(&self, configured: &Configured) -> DbResult<Arc<SharedState>> {
        self.initializations.fetch_add(1, Ordering::AcqRel);
        let config = &configured.config;
        let provider = config.provider.as_str();
        debug!(provider = %provider, "Initializing database factory");

        let dialect = self.registry.resolve_dialect(provider)?;

        let driver: Arc<dyn Driver> = match &configured.driver {
            Some(driver) => Arc::clone(driver),
            None => Arc::new(SqlxDriver::open(config).await?),
        };

        let server_version = match tokio::time::timeout(self.connect_timeout, driver.probe()).await
        {
            Ok(Ok(version)) => version,
            Ok(Err(e)) => {
                driver.close().await;
                return Err(e);
            }
            Err(_) => {
                driver.close().await;
                return Err(DbError::timeout(
                    "connectivity probe",
                    self.connect_timeout.as_secs() as u32,
                ));
            }
        };

        let specialized = self.registry.specialized_bulk_strategy(provider);
        let fallback = self.registry.fallback_strategy();
        let retry = self.retry.clone().or_else(|| {
            config
                .retry_options
                .is_set()
                .then(|| config.retry_options.to_policy())
        });

        let ctx = SqlContext::new(Arc::clone(&dialect), Arc::new(MetadataCache::new()));

        info!(
            provider = %dialect.provider,
            server_version = %server_version,
            bulk_strategy = specialized.as_ref().map(|s| s.name()).unwrap_or(fallback.name()),
            retry = retry.is_some(),
            profiling = self.profiler.is_some(),
            "Database factory initialized"
        );

        Ok(Arc::new(SharedState {
            ctx,
            driver,
            provider: dialect.provider.clone(),
            server_version,
            specialized,
            fallback,
            retry,
            profiler: self.profiler.clone(),
            statement_timeout: self.statement_timeout,
            connect_timeout: self.connect_timeout,
        }))
    }

    // -------------------------------------------------------------------------
    // Use
    // -------------------------------------------------------------------------

    /// The shared SQL context. Triggers initialization.
    pub async fn sql_context(&self) -> DbResult<SqlContext> {
        Ok(self.state().await?.ctx.clone())
    }

    /// A new unit-of-work handle. Triggers initialization.
    ///
    /// The handle shares the dialect and metadata cache but opens its own
    /// connection on first use.
    pub async fn create_database(&self) -> DbResult<Database> {
        let state = self.state().await?;
        Ok(Database::new(state))
    }

    /// Server version reported by the connectivity probe, once initialized.
    pub fn server_version(&self) -> Option<String> {
        self.current()
            .ok()?
            .initialized()
            .map(|s| s.server_version.clone())
    }

    pub fn profiler(&self) -> Option<Arc<Profiler>> {
        self.profiler.clone()
    }

    /// Describe the initialized state. Triggers initialization.
    pub async fn report(&self) -> DbResult<FactoryReport> {
        let state = self.state().await?;
        let dialect = state.ctx.dialect().clone();
        let native = state
            .specialized
            .as_ref()
            .filter(|_| dialect.supports_bulk_copy)
            .map(|s| s.name());
        Ok(FactoryReport {
            provider: state.provider.clone(),
            server_version: state.server_version.clone(),
            bulk_strategy: state.fallback.name(),
            native_bulk_strategy: native,
            retry: state.retry.clone(),
            profiling: state.profiler.is_some(),
            dialect,
        })
    }

    /// Close the driver and return to the Configured state.
    ///
    /// The next data operation re-runs initialization. Handles created before
    /// disposal keep the old state until they are dropped.
    pub async fn dispose(&self) {
        let previous = match self.write_slot() {
            Ok(mut slot) => {
                let fresh = slot
                    .as_ref()
                    .map(|old| Arc::new(Configured::new(old.config.clone(), old.driver.clone())));
                match fresh {
                    Some(fresh) => slot.replace(fresh),
                    None => None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot dispose database factory");
                return;
            }
        };

        if let Some(state) = previous.as_deref().and_then(Configured::initialized) {
            state.driver.close().await;
            info!(provider = %state.provider, "Database factory disposed");
        }
    }
}
