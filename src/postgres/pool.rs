use std::fmt;

use async_trait::async_trait;
use bb8::{ErrorSink, Pool, PooledConnection};
use tracing::warn;

use crate::config::{ConnectionSettings, NumericDecoding, PoolSettings};
use crate::connection::{Connection, ConnectionSource, Executor, PoolState, RawQuery};
use crate::error::SqlGuardError;
use crate::results::QueryResult;

use super::manager::PgManager;

/// A bb8 pool of Postgres clients.
#[derive(Clone)]
pub struct PgPool {
    pool: Pool<PgManager>,
}

impl PgPool {
    /// Build the pool. No connection is opened until the first checkout.
    ///
    /// # Errors
    /// Returns `SqlGuardError::ConfigError` for unusable settings, or
    /// `SqlGuardError::ConnectionError` if the pool cannot be created.
    pub async fn connect(
        settings: &ConnectionSettings,
        pool: &PoolSettings,
        numeric: NumericDecoding,
    ) -> Result<Self, SqlGuardError> {
        let manager = PgManager::new(settings.to_pg_config()?, numeric);
        let pool = Pool::builder()
            .max_size(pool.max_size)
            .connection_timeout(pool.connection_timeout)
            .idle_timeout(pool.idle_timeout)
            .retry_connection(false)
            .error_sink(Box::new(LogErrorSink))
            .build(manager)
            .await
            .map_err(|e| SqlGuardError::ConnectionError(format!("postgres pool error: {e}")))?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: Pool<PgManager>) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn inner(&self) -> &Pool<PgManager> {
        &self.pool
    }
}

/// Reports connection errors the pool hits in the background, which no caller sees.
#[derive(Debug, Clone, Copy)]
struct LogErrorSink;

impl<E: fmt::Display + Send + 'static> ErrorSink<E> for LogErrorSink {
    fn sink(&self, error: E) {
        warn!(error = %error, "postgres pool connection error");
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<E>> {
        Box::new(*self)
    }
}

#[async_trait]
impl ConnectionSource for PgPool {
    type Connection = PgConnection;

    async fn acquire(&self) -> Result<PgConnection, SqlGuardError> {
        let conn = self.pool.get_owned().await?;
        Ok(PgConnection { conn })
    }

    fn state(&self) -> PoolState {
        let state = self.pool.state();
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }
}

/// A client checked out of a [`PgPool`]. Dropping it returns it to the pool.
pub struct PgConnection {
    conn: PooledConnection<'static, PgManager>,
}

#[async_trait]
impl Executor for PgConnection {
    async fn raw_execute(&self, query: RawQuery<'_>) -> Result<QueryResult, SqlGuardError> {
        self.conn.execute(query).await
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn batch(&mut self, sql: &str) -> Result<(), SqlGuardError> {
        self.conn.batch(sql).await
    }

    fn release(self, damaged: bool) {
        if damaged {
            self.conn.mark_damaged();
        }
    }
}
