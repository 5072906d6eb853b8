// Transaction runner
//
// Each attempt checks out its own connection and walks
// acquire -> BEGIN -> unit of work -> COMMIT, or ROLLBACK on any failure.
// The connection goes back exactly once per attempt; a connection whose ROLLBACK
// failed goes back damaged so the pool drops it.

mod retry;

pub use retry::{Backoff, RetryPolicy};

use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionSource};
use crate::error::SqlGuardError;

/// Run `unit_of_work` inside `BEGIN` / `COMMIT` on a dedicated connection from `source`.
///
/// Any failure rolls the transaction back. Deadlocks (`40P01`) and serialization failures
/// (`40001`) start a fresh attempt on a fresh connection, as `policy` allows; every other
/// failure comes back as [`SqlGuardError::TransactionFailed`]. When the rollback itself
/// fails the connection is discarded and [`SqlGuardError::RollbackFailed`] is returned.
/// Failing to acquire a connection is never retried.
///
/// The unit of work may run several times, so it should not have side effects outside
/// the transaction.
///
/// # Errors
/// See above; [`SqlGuardError::rolledback`] tells whether the rollback went through.
pub async fn run_transaction<S, T, F>(
    source: &S,
    policy: &RetryPolicy,
    mut unit_of_work: F,
) -> Result<T, SqlGuardError>
where
    S: ConnectionSource + ?Sized,
    F: for<'c> FnMut(&'c mut S::Connection) -> BoxFuture<'c, Result<T, SqlGuardError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let mut conn = source.acquire().await?;

        let err = match attempt_once(&mut conn, &mut unit_of_work).await {
            Ok(value) => {
                conn.release(false);
                return Ok(value);
            }
            Err(err) => err,
        };

        if let Err(rollback) = conn.batch("ROLLBACK").await {
            warn!(
                error = %rollback,
                original = %err,
                "could not roll back transaction, removing connection from pool"
            );
            conn.release(true);
            return Err(SqlGuardError::RollbackFailed {
                rollback: Box::new(rollback),
                original: Box::new(err),
            });
        }
        conn.release(false);

        if !err.is_conflict() {
            return Err(SqlGuardError::TransactionFailed {
                source: Box::new(err),
            });
        }
        if !policy.allows_retry_after(attempt) {
            return Err(SqlGuardError::RetriesExhausted {
                attempts: attempt,
                source: Box::new(err),
            });
        }

        let delay = policy.delay_after(attempt);
        debug!(
            attempt,
            code = err.code(),
            delay_ms = delay.map(|d| d.as_millis()),
            "transaction conflict, retrying"
        );
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

async fn attempt_once<C, T, F>(conn: &mut C, unit_of_work: &mut F) -> Result<T, SqlGuardError>
where
    C: Connection,
    F: for<'c> FnMut(&'c mut C) -> BoxFuture<'c, Result<T, SqlGuardError>>,
{
    conn.batch("BEGIN").await?;
    let value = unit_of_work(conn).await?;
    conn.batch("COMMIT").await?;
    Ok(value)
}
