//! Provider registry.
//!
//! Maps provider names to dialect descriptors and bulk insert strategies.
//! Lookups are case-insensitive. The registry is populated before a factory is
//! configured and is read-only afterwards.

use crate::bulk::{BulkInsertStrategy, CommandBulkInsert, PostgresCopyBulkInsert};
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Alternate provider names accepted for the built-in dialects.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("Microsoft.Data.SqlClient", "SqlServer"),
    ("System.Data.SqlClient", "SqlServer"),
    ("Microsoft.Data.Sqlite", "SQLite"),
    ("Npgsql", "PostgreSQL"),
    ("MySqlConnector", "MySql"),
];

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    /// Keyed by lowercased provider name or alias.
    dialects: HashMap<String, Arc<Dialect>>,
    /// Keyed by lowercased canonical provider name.
    bulk_strategies: HashMap<String, Arc<dyn BulkInsertStrategy>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.dialects.keys().collect();
        providers.sort();
        let mut strategies: Vec<_> = self
            .bulk_strategies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.name()))
            .collect();
        strategies.sort();
        f.debug_struct("ProviderRegistry")
            .field("dialects", &providers)
            .field("bulk_strategies", &strategies)
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers: SqlServer, SQLite, PostgreSQL, MySql.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register_dialect(Dialect::sql_server())
            .register_dialect(Dialect::sqlite())
            .register_dialect(Dialect::postgres())
            .register_dialect(Dialect::mysql())
            .register_bulk_strategy("PostgreSQL", Arc::new(PostgresCopyBulkInsert));
        for (alias, provider) in BUILTIN_ALIASES {
            registry.register_alias(alias, provider);
        }
        registry
    }

    /// Register (or replace) a dialect under its provider name.
    pub fn register_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.dialects
            .insert(dialect.provider.to_lowercase(), Arc::new(dialect));
        self
    }

    /// Make `alias` resolve to an already registered provider. Unknown
    /// providers are ignored.
    pub fn register_alias(&mut self, alias: &str, provider: &str) -> &mut Self {
        if let Some(dialect) = self.dialects.get(&provider.to_lowercase()).cloned() {
            self.dialects.insert(alias.to_lowercase(), dialect);
        }
        self
    }

    /// Register a specialized bulk insert strategy for a provider.
    pub fn register_bulk_strategy(
        &mut self,
        provider: &str,
        strategy: Arc<dyn BulkInsertStrategy>,
    ) -> &mut Self {
        let key = self.canonical(provider).to_lowercase();
        self.bulk_strategies.insert(key, strategy);
        self
    }

    fn canonical<'a>(&'a self, provider: &'a str) -> &'a str {
        self.dialects
            .get(&provider.to_lowercase())
            .map(|d| d.provider.as_str())
            .unwrap_or(provider)
    }

    /// Resolve the dialect for a provider name.
    pub fn resolve_dialect(&self, provider: &str) -> DbResult<Arc<Dialect>> {
        self.dialects
            .get(&provider.to_lowercase())
            .cloned()
            .ok_or_else(|| DbError::unknown_provider(provider))
    }

    /// Resolve the bulk insert strategy for a provider, falling back to the
    /// generic command strategy when none is registered.
    pub fn resolve_bulk_strategy(&self, provider: &str) -> Arc<dyn BulkInsertStrategy> {
        self.specialized_bulk_strategy(provider)
            .unwrap_or_else(|| self.fallback_strategy())
    }

    /// The strategy registered for a provider, without fallback.
    pub fn specialized_bulk_strategy(&self, provider: &str) -> Option<Arc<dyn BulkInsertStrategy>> {
        self.bulk_strategies
            .get(&self.canonical(provider).to_lowercase())
            .cloned()
    }

    /// The generic strategy used when nothing specialized is registered.
    pub fn fallback_strategy(&self) -> Arc<dyn BulkInsertStrategy> {
        Arc::new(CommandBulkInsert)
    }

    /// Registered provider names and aliases (lowercased, sorted).
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.dialects.keys().cloned().collect();
        names.sort();
        names
    }
}
