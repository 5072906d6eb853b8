use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bb8::ManageConnection;
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{trace, warn};

use crate::config::NumericDecoding;
use crate::connection::RawQuery;
use crate::error::SqlGuardError;
use crate::results::QueryResult;

use super::params::Params;
use super::query::build_result_from_statement;

/// bb8 manager for `tokio-postgres` clients.
pub struct PgManager {
    pub(crate) config: tokio_postgres::Config,
    numeric: NumericDecoding,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config, numeric: NumericDecoding) -> Self {
        Self { config, numeric }
    }
}

impl ManageConnection for PgManager {
    type Connection = PgClient;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        let numeric = self.numeric;
        async move {
            trace!(hosts = ?cfg.get_hosts(), dbname = ?cfg.get_dbname(), "connecting");
            let (client, connection) = cfg.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(error = %e, "postgres connection closed with error");
                }
            });
            Ok(PgClient::new(client, numeric))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.client.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_broken()
    }
}

struct CachedStatement {
    text: String,
    statement: Statement,
}

/// A pooled client plus the per-connection state the guard needs: named statements
/// prepared so far and whether the connection may go back into the pool.
pub struct PgClient {
    client: Client,
    numeric: NumericDecoding,
    prepared: Mutex<HashMap<String, CachedStatement>>,
    in_transaction: AtomicBool,
    damaged: AtomicBool,
}

impl PgClient {
    fn new(client: Client, numeric: NumericDecoding) -> Self {
        Self {
            client,
            numeric,
            prepared: Mutex::new(HashMap::new()),
            in_transaction: AtomicBool::new(false),
            damaged: AtomicBool::new(false),
        }
    }

    /// The connection must not be reused: it was flagged damaged, it was dropped in the
    /// middle of a transaction, or the server side is gone.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.damaged.load(Ordering::Acquire)
            || self.in_transaction.load(Ordering::Acquire)
            || self.client.is_closed()
    }

    pub(crate) fn mark_damaged(&self) {
        self.damaged.store(true, Ordering::Release);
    }

    /// Run a statement, preparing it under `query.name` when one is given.
    ///
    /// # Errors
    /// Returns driver errors, or `SqlGuardError::ExecutionError` when a name is reused
    /// for different text.
    pub async fn execute(&self, query: RawQuery<'_>) -> Result<QueryResult, SqlGuardError> {
        let stmt = match query.name {
            Some(name) => self.prepare_named(name, query.text).await?,
            None => self.client.prepare(query.text).await?,
        };
        let params = Params::convert(query.values);

        if stmt.columns().is_empty() {
            let affected = self.client.execute(&stmt, params.as_refs()).await?;
            let affected = usize::try_from(affected).map_err(|e| {
                SqlGuardError::ExecutionError(format!("postgres affected rows conversion error: {e}"))
            })?;
            return Ok(QueryResult::affected(affected));
        }

        let rows = self.client.query(&stmt, params.as_refs()).await?;
        build_result_from_statement(&stmt, &rows, self.numeric)
    }

    /// Run a transaction control statement, tracking whether a transaction is open.
    ///
    /// # Errors
    /// Returns driver errors.
    pub async fn batch(&self, sql: &str) -> Result<(), SqlGuardError> {
        self.client.batch_execute(sql).await?;
        let command = sql.trim().to_ascii_uppercase();
        if command.starts_with("BEGIN") || command.starts_with("START TRANSACTION") {
            self.in_transaction.store(true, Ordering::Release);
        } else if command.starts_with("COMMIT") || command.starts_with("ROLLBACK") {
            self.in_transaction.store(false, Ordering::Release);
        }
        Ok(())
    }

    async fn prepare_named(&self, name: &str, text: &str) -> Result<Statement, SqlGuardError> {
        if let Some(cached) = self.cache_lookup(name, text)? {
            return Ok(cached);
        }
        trace!(name, "preparing named statement");
        let statement = self.client.prepare(text).await?;
        self.lock_cache().insert(
            name.to_string(),
            CachedStatement {
                text: text.to_string(),
                statement: statement.clone(),
            },
        );
        Ok(statement)
    }

    fn cache_lookup(&self, name: &str, text: &str) -> Result<Option<Statement>, SqlGuardError> {
        match self.lock_cache().get(name) {
            Some(cached) if cached.text == text => Ok(Some(cached.statement.clone())),
            Some(_) => Err(SqlGuardError::ExecutionError(format!(
                "prepared statement name {name:?} already used for a different query"
            ))),
            None => Ok(None),
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedStatement>> {
        self.prepared
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
