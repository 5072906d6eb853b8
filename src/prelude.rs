//! Convenient imports for common functionality.
//!
//! Brings the macros, the statement and value types, the guard trait and the database
//! facade into scope in one line.

pub use crate::config::{ConnectionSettings, GuardConfig, NumericDecoding, PoolSettings};
pub use crate::connection::{Connection, ConnectionSource, Executor};
pub use crate::database::{ConnectionStatus, Database};
pub use crate::error::SqlGuardError;
pub use crate::guard::Guard;
pub use crate::results::{QueryResult, Row};
pub use crate::statement::{Statement, StatementKind};
pub use crate::transaction::{Backoff, RetryPolicy};
pub use crate::types::RowValues;
pub use crate::{raw, sql};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PgConnection, PgPool};

pub use futures_util::future::BoxFuture;
