use std::fmt;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

use crate::connection::{Connection, ConnectionSource, Executor, PoolState, RawQuery};
use crate::error::SqlGuardError;
use crate::results::QueryResult;
use crate::transaction::{RetryPolicy, run_transaction};

/// Outcome of a connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub status: bool,
    pub error: Option<String>,
}

/// The guarded entry point: a connection source plus the transaction retry policy.
///
/// Every [`Guard`](crate::Guard) method works on it directly, checking out one
/// connection per statement. [`with_transaction`](Database::with_transaction) pins a
/// connection for a whole unit of work.
///
/// ```rust,no_run
/// use sql_guard::prelude::*;
///
/// # async fn demo() -> Result<(), SqlGuardError> {
/// let db = Database::connect(GuardConfig::from_env()?).await?;
/// let total: i64 = db
///     .with_transaction(|conn| {
///         Box::pin(async move {
///             conn.none(&sql!("UPDATE bars SET n = n + {} WHERE id = {}", 1, 7)).await?;
///             let row = conn.one(&sql!("SELECT sum(n)::int8 AS total FROM bars")).await?;
///             let total = row.and_then(|r| r.get("total").and_then(RowValues::as_int).copied());
///             Ok::<_, SqlGuardError>(total.unwrap_or(0))
///         })
///     })
///     .await?;
/// # let _ = total;
/// # Ok(()) }
/// ```
pub struct Database<S> {
    source: S,
    retry: RetryPolicy,
}

impl<S: ConnectionSource> Database<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn pool_state(&self) -> PoolState {
        self.source.state()
    }

    /// Try to check out a connection and give it straight back.
    pub async fn can_connect(&self) -> ConnectionStatus {
        match self.source.acquire().await {
            Ok(conn) => {
                conn.release(false);
                ConnectionStatus {
                    status: true,
                    error: None,
                }
            }
            Err(err) => {
                debug!(error = %err, "connectivity probe failed");
                ConnectionStatus {
                    status: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Same as [`can_connect`](Database::can_connect).
    pub async fn is_connected(&self) -> ConnectionStatus {
        self.can_connect().await
    }

    /// Run `unit_of_work` in a transaction under this database's retry policy.
    ///
    /// # Errors
    /// See [`run_transaction`].
    pub async fn with_transaction<T, F>(&self, unit_of_work: F) -> Result<T, SqlGuardError>
    where
        F: for<'c> FnMut(&'c mut S::Connection) -> BoxFuture<'c, Result<T, SqlGuardError>>,
    {
        run_transaction(&self.source, &self.retry, unit_of_work).await
    }
}

#[async_trait]
impl<S: ConnectionSource> Executor for Database<S> {
    async fn raw_execute(&self, query: RawQuery<'_>) -> Result<QueryResult, SqlGuardError> {
        let conn = self.source.acquire().await?;
        let result = conn.raw_execute(query).await;
        conn.release(false);
        result
    }
}

impl<S: Clone> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            retry: self.retry,
        }
    }
}

impl<S> fmt::Debug for Database<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "postgres")]
impl Database<crate::postgres::PgPool> {
    /// Build a Postgres pool from `config`.
    ///
    /// # Errors
    /// Returns `SqlGuardError::ConfigError` for unusable settings or
    /// `SqlGuardError::ConnectionError` if the pool cannot be created.
    pub async fn connect(config: crate::config::GuardConfig) -> Result<Self, SqlGuardError> {
        let pool =
            crate::postgres::PgPool::connect(&config.connection, &config.pool, config.numeric)
                .await?;
        Ok(Self::new(pool).with_retry_policy(config.retry))
    }
}
