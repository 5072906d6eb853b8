//! Injection-safe SQL for `tokio-postgres`.
//!
//! Queries are compiled [`Statement`]s: [`sql!`] turns every interpolated value into a
//! `$n` placeholder, [`raw!`] inlines trusted fragments. The [`Guard`] methods refuse
//! anything else with [`SqlGuardError::MustBuildQuery`].
//! [`Database::with_transaction`] runs a unit of work between `BEGIN` and `COMMIT` and
//! replays it when the server reports a deadlock or serialization failure.
//!
//! ```rust,no_run
//! use sql_guard::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlGuardError> {
//! let db = Database::connect(GuardConfig::from_connection_string(
//!     "postgres://app@localhost/app",
//! )?)
//! .await?;
//!
//! let label = "x'; DROP TABLE bars; --";
//! let rows = db
//!     .many(&sql!("SELECT * FROM bars WHERE label = {}", label).append(&raw!("ORDER BY n {}", "DESC")))
//!     .await?;
//! # let _ = rows;
//! # Ok(()) }
//! ```

#[macro_use]
mod macros;

pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod guard;
pub mod prelude;
pub mod prepared;
pub mod results;
pub mod statement;
pub mod transaction;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::{ConnectionSettings, GuardConfig, NumericDecoding, PoolSettings};
pub use connection::{Connection, ConnectionSource, Executor, PoolState, RawQuery};
pub use database::{ConnectionStatus, Database};
pub use error::SqlGuardError;
pub use guard::{Guard, QueryArg};
pub use prepared::PreparedHandle;
pub use results::{QueryResult, Row};
pub use statement::{Statement, StatementKind};
pub use transaction::{Backoff, RetryPolicy, run_transaction};
pub use types::RowValues;

#[cfg(feature = "postgres")]
pub use postgres::{PgConnection, PgPool};
