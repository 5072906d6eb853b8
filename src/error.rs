use thiserror::Error;

/// SQLSTATE reported when the server breaks a deadlock by aborting one transaction.
pub const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE reported when a serializable transaction cannot be ordered with its peers.
pub const SERIALIZATION_FAILURE: &str = "40001";

#[derive(Debug, Error)]
pub enum SqlGuardError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] bb8::RunError<tokio_postgres::Error>),

    #[error("must build query with sql! or raw!")]
    MustBuildQuery,

    #[error("unexpected row count: expected {expected}, got {actual}")]
    UnexpectedRowCount { expected: &'static str, actual: usize },

    #[error("database error {code}: {message}")]
    Database { code: String, message: String },

    #[error("could not roll back transaction ({rollback}); connection removed from pool")]
    RollbackFailed {
        #[source]
        rollback: Box<SqlGuardError>,
        original: Box<SqlGuardError>,
    },

    #[error("transaction rolled back: {source}")]
    TransactionFailed {
        #[source]
        source: Box<SqlGuardError>,
    },

    #[error("transaction rolled back after {attempts} conflicting attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<SqlGuardError>,
    },

    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("unit of work failed: {0}")]
    UnitOfWork(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SqlGuardError {
    /// Wrap an application error raised inside a unit of work.
    pub fn unit_of_work<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SqlGuardError::UnitOfWork(Box::new(err))
    }

    /// The SQLSTATE code the database attached to this error, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            #[cfg(feature = "postgres")]
            SqlGuardError::PostgresError(err) => err.code().map(|state| state.code()),
            SqlGuardError::Database { code, .. } => Some(code),
            SqlGuardError::UnitOfWork(inner) => inner
                .downcast_ref::<SqlGuardError>()
                .and_then(SqlGuardError::code),
            _ => None,
        }
    }

    /// True for deadlocks and serialization failures, the two conflicts worth retrying.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self.code(), Some(DEADLOCK_DETECTED | SERIALIZATION_FAILURE))
    }

    /// Whether the failed transaction was rolled back.
    ///
    /// `None` for errors that did not come out of the transaction runner.
    #[must_use]
    pub fn rolledback(&self) -> Option<bool> {
        match self {
            SqlGuardError::RollbackFailed { .. } => Some(false),
            SqlGuardError::TransactionFailed { .. } | SqlGuardError::RetriesExhausted { .. } => {
                Some(true)
            }
            _ => None,
        }
    }
}
