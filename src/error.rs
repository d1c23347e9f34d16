//! Error types for sqlbridge.
//!
//! This module defines all error types using `thiserror`. Every variant carries
//! enough context (failed SQL text, offending provider name) to diagnose the
//! failure without re-running it.

use thiserror::Error;

/// SQLSTATE / driver codes classified as transient.
///
/// PostgreSQL serialization failure and deadlock, lock not available, MySQL
/// deadlock and lock wait timeout, SQL Server deadlock victim and client
/// timeout, SQLite busy/locked (primary and extended codes).
const TRANSIENT_CODES: &[&str] = &[
    "40001", "40P01", "55P03", "1205", "1213", "-2", "5", "6", "261", "262", "517",
];

#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        provider: Option<String>,
    },

    #[error("Database factory is not configured")]
    NotConfigured,

    #[error("Unknown provider: {provider}")]
    UnknownProvider { provider: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        sql: Option<String>,
        suggestion: String,
    },

    #[error("Constraint violation: {message}")]
    ConstraintViolation {
        message: String,
        sql_state: Option<String>,
        sql: Option<String>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Query builder error: {message}")]
    Builder { message: String },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a configuration error, optionally naming the provider involved.
    pub fn configuration(message: impl Into<String>, provider: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            provider: provider.map(String::from),
        }
    }

    /// Create an unknown provider error.
    pub fn unknown_provider(provider: impl Into<String>) -> Self {
        Self::UnknownProvider {
            provider: provider.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            sql: None,
            suggestion: suggestion.into(),
        }
    }

    /// Create a constraint violation error.
    pub fn constraint_violation(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
            sql_state,
            sql: None,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a query builder misuse error.
    pub fn builder(message: impl Into<String>) -> Self {
        Self::Builder {
            message: message.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Attach the SQL text that failed. Only driver-reported errors carry SQL.
    pub fn with_sql(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            Self::Database { sql, .. } | Self::ConstraintViolation { sql, .. } => {
                *sql = Some(text.into());
            }
            _ => {}
        }
        self
    }

    /// The SQL text attached to this error, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Database { sql, .. } | Self::ConstraintViolation { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }

    /// The SQLSTATE or driver code, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } | Self::ConstraintViolation { sql_state, .. } => {
                sql_state.as_deref()
            }
            _ => None,
        }
    }

    /// The provider name involved in a configuration failure, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Configuration { provider, .. } => provider.as_deref(),
            Self::UnknownProvider { provider } => Some(provider),
            _ => None,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Whether the error is a configuration-class failure (never retried).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::NotConfigured | Self::UnknownProvider { .. }
        )
    }

    /// Check if this error is transient and the operation may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::Database {
                message, sql_state, ..
            } => {
                if let Some(code) = sql_state.as_deref() {
                    if TRANSIENT_CODES.contains(&code) || code.starts_with("08") {
                        return true;
                    }
                }
                let lower = message.to_lowercase();
                lower.contains("deadlock")
                    || lower.contains("lock wait timeout")
                    || lower.contains("database is locked")
            }
            _ => false,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation
                    | sqlx::error::ErrorKind::ForeignKeyViolation
                    | sqlx::error::ErrorKind::NotNullViolation
                    | sqlx::error::ErrorKind::CheckViolation => {
                        DbError::constraint_violation(db_err.message(), code)
                    }
                    _ => DbError::database(
                        db_err.message(),
                        code,
                        "Check the SQL syntax and referenced objects",
                    ),
                }
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconfigure the factory")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => DbError::schema(
                format!("Type not found: {}", type_name),
                type_name.to_string(),
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::AnyDriverError(err) => DbError::connection(
                format!("Driver error: {}", err),
                "Check database driver configuration",
            ),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
