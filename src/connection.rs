use async_trait::async_trait;

use crate::error::SqlGuardError;
use crate::results::QueryResult;
use crate::statement::Statement;
use crate::types::RowValues;

/// Text, values and optional prepared-statement name handed to a connection.
#[derive(Debug, Clone, Copy)]
pub struct RawQuery<'a> {
    pub text: &'a str,
    pub values: &'a [RowValues],
    pub name: Option<&'a str>,
}

impl<'a> RawQuery<'a> {
    #[must_use]
    pub fn new(text: &'a str, values: &'a [RowValues]) -> Self {
        Self {
            text,
            values,
            name: None,
        }
    }
}

impl<'a> From<&'a Statement> for RawQuery<'a> {
    fn from(statement: &'a Statement) -> Self {
        Self {
            text: statement.text(),
            values: statement.values(),
            name: statement.name(),
        }
    }
}

/// Anything that can run query text with bound values.
///
/// This is the unchecked primitive; application code goes through
/// [`Guard`](crate::guard::Guard), which every executor gets for free.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `query` and return its rows (or affected count).
    ///
    /// # Errors
    /// Returns the driver's error, with its SQLSTATE available through
    /// [`SqlGuardError::code`].
    async fn raw_execute(&self, query: RawQuery<'_>) -> Result<QueryResult, SqlGuardError>;
}

/// A dedicated connection checked out of a [`ConnectionSource`].
#[async_trait]
pub trait Connection: Executor {
    /// Run a parameterless control statement (`BEGIN`, `COMMIT`, `ROLLBACK`).
    ///
    /// # Errors
    /// Returns the driver's error.
    async fn batch(&mut self, sql: &str) -> Result<(), SqlGuardError>;

    /// Hand the connection back. A damaged connection is discarded by the pool instead of
    /// being recycled.
    fn release(self, damaged: bool);
}

/// Pool snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolState {
    /// Open connections, idle or checked out
    pub connections: u32,
    /// Connections waiting in the pool
    pub idle_connections: u32,
}

/// Where connections come from: usually a pool.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    type Connection: Connection;

    /// Check out a dedicated connection.
    ///
    /// # Errors
    /// Returns a connectivity error on refusal or timeout.
    async fn acquire(&self) -> Result<Self::Connection, SqlGuardError>;

    fn state(&self) -> PoolState {
        PoolState::default()
    }
}
