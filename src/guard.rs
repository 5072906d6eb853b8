use std::future::Future;

use tracing::trace;

use crate::connection::{Executor, RawQuery};
use crate::error::SqlGuardError;
use crate::prepared::PreparedHandle;
use crate::results::{QueryResult, Row};
use crate::statement::Statement;
use crate::types::RowValues;

/// What a caller handed to the guard.
///
/// Only [`QueryArg::Statement`] gets through; plain strings convert to
/// [`QueryArg::Unchecked`] so they can be turned away with
/// [`SqlGuardError::MustBuildQuery`] instead of reaching the database.
#[derive(Debug, Clone, Copy)]
pub enum QueryArg<'a> {
    Statement(&'a Statement),
    Unchecked(&'a str),
}

impl<'a> QueryArg<'a> {
    /// The compiled statement, or `MustBuildQuery`.
    ///
    /// # Errors
    /// Returns `SqlGuardError::MustBuildQuery` for unchecked text.
    pub fn statement(self) -> Result<&'a Statement, SqlGuardError> {
        match self {
            QueryArg::Statement(statement) => Ok(statement),
            QueryArg::Unchecked(_) => Err(SqlGuardError::MustBuildQuery),
        }
    }
}

impl<'a> From<&'a Statement> for QueryArg<'a> {
    fn from(statement: &'a Statement) -> Self {
        QueryArg::Statement(statement)
    }
}

impl<'a> From<&'a str> for QueryArg<'a> {
    fn from(text: &'a str) -> Self {
        QueryArg::Unchecked(text)
    }
}

impl<'a> From<&'a String> for QueryArg<'a> {
    fn from(text: &'a String) -> Self {
        QueryArg::Unchecked(text)
    }
}

/// Checked execution and row-count reducers, available on every [`Executor`].
///
/// ```rust,no_run
/// use sql_guard::prelude::*;
///
/// # async fn demo(db: &Database<PgPool>) -> Result<(), SqlGuardError> {
/// let row = db.one(&sql!("SELECT * FROM bars WHERE n = {}", 2)).await?;
/// assert!(row.is_some());
///
/// // Plain strings never reach the database.
/// let err = db.execute("SELECT 1").await.unwrap_err();
/// assert!(matches!(err, SqlGuardError::MustBuildQuery));
/// # Ok(()) }
/// ```
pub trait Guard: Executor {
    /// Run a compiled statement.
    ///
    /// # Errors
    /// Returns `SqlGuardError::MustBuildQuery` without any I/O when `query` is not a
    /// [`Statement`], otherwise whatever the executor returns.
    fn execute<'a, Q>(
        &'a self,
        query: Q,
    ) -> impl Future<Output = Result<QueryResult, SqlGuardError>> + Send + 'a
    where
        Q: Into<QueryArg<'a>>,
    {
        let query = query.into();
        async move {
            let statement = query.statement()?;
            trace!(
                text = statement.text(),
                params = statement.values().len(),
                name = statement.name(),
                "executing statement"
            );
            self.raw_execute(RawQuery::from(statement)).await
        }
    }

    /// Run raw text without validation.
    ///
    /// This bypasses the injection guard entirely; nothing about `text` is checked.
    /// Keep it for migrations and other trusted, static SQL.
    ///
    /// # Errors
    /// Returns whatever the executor returns.
    fn execute_unchecked<'a>(
        &'a self,
        text: &'a str,
        values: &'a [RowValues],
    ) -> impl Future<Output = Result<QueryResult, SqlGuardError>> + Send + 'a {
        self.raw_execute(RawQuery::new(text, values))
    }

    /// All rows, possibly none.
    ///
    /// # Errors
    /// See [`Guard::execute`].
    fn many<'a, Q>(&'a self, query: Q) -> impl Future<Output = Result<Vec<Row>, SqlGuardError>> + Send + 'a
    where
        Q: Into<QueryArg<'a>>,
    {
        let query = query.into();
        async move { Ok(self.execute(query).await?.into_rows()) }
    }

    /// The single row, or `None` when nothing matched.
    ///
    /// # Errors
    /// Returns `SqlGuardError::UnexpectedRowCount` when more than one row comes back.
    fn one<'a, Q>(&'a self, query: Q) -> impl Future<Output = Result<Option<Row>, SqlGuardError>> + Send + 'a
    where
        Q: Into<QueryArg<'a>>,
    {
        let query = query.into();
        async move { expect_at_most_one(self.execute(query).await?) }
    }

    /// `true` when the statement returned no rows.
    ///
    /// # Errors
    /// Returns `SqlGuardError::UnexpectedRowCount` when any row comes back.
    fn none<'a, Q>(&'a self, query: Q) -> impl Future<Output = Result<bool, SqlGuardError>> + Send + 'a
    where
        Q: Into<QueryArg<'a>>,
    {
        let query = query.into();
        async move { expect_no_rows(&self.execute(query).await?) }
    }

    /// A handle that stamps `name` on every statement it runs.
    fn prepared(&self, name: impl Into<String>) -> PreparedHandle<'_, Self> {
        PreparedHandle::new(name.into(), self)
    }
}

impl<E: Executor + ?Sized> Guard for E {}

pub(crate) fn expect_at_most_one(result: QueryResult) -> Result<Option<Row>, SqlGuardError> {
    let actual = result.rows.len();
    if actual > 1 {
        return Err(SqlGuardError::UnexpectedRowCount {
            expected: "at most one row, use many() instead",
            actual,
        });
    }
    Ok(result.into_rows().into_iter().next())
}

pub(crate) fn expect_no_rows(result: &QueryResult) -> Result<bool, SqlGuardError> {
    if result.rows.is_empty() {
        Ok(true)
    } else {
        Err(SqlGuardError::UnexpectedRowCount {
            expected: "no rows, use many() instead",
            actual: result.rows.len(),
        })
    }
}
