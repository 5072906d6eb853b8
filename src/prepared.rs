use crate::connection::Executor;
use crate::error::SqlGuardError;
use crate::guard::{expect_at_most_one, expect_no_rows, Guard, QueryArg};
use crate::results::{QueryResult, Row};

/// Runs statements as the named prepared statement `name` on the bound executor.
///
/// The server plans the text once per connection and reuses the plan afterwards, so one
/// name must always carry the same text. Raw statements are refused: their values are
/// already inlined, so every call would produce different text under the same name.
#[derive(Debug)]
pub struct PreparedHandle<'e, E: ?Sized> {
    name: String,
    executor: &'e E,
}

impl<'e, E: Executor + ?Sized> PreparedHandle<'e, E> {
    pub(crate) fn new(name: String, executor: &'e E) -> Self {
        Self { name, executor }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `query` under this handle's name.
    ///
    /// # Errors
    /// Returns `SqlGuardError::MustBuildQuery` for anything that is not a parameterized
    /// [`Statement`](crate::Statement), before any I/O.
    pub async fn query<'q>(&self, query: impl Into<QueryArg<'q>>) -> Result<QueryResult, SqlGuardError> {
        let statement = query.into().statement()?;
        if statement.is_raw() {
            return Err(SqlGuardError::MustBuildQuery);
        }
        let named = statement.named(self.name.clone());
        self.executor.execute(&named).await
    }

    /// # Errors
    /// See [`PreparedHandle::query`].
    pub async fn many<'q>(&self, query: impl Into<QueryArg<'q>>) -> Result<Vec<Row>, SqlGuardError> {
        Ok(self.query(query).await?.into_rows())
    }

    /// # Errors
    /// See [`Guard::one`].
    pub async fn one<'q>(&self, query: impl Into<QueryArg<'q>>) -> Result<Option<Row>, SqlGuardError> {
        expect_at_most_one(self.query(query).await?)
    }

    /// # Errors
    /// See [`Guard::none`].
    pub async fn none<'q>(&self, query: impl Into<QueryArg<'q>>) -> Result<bool, SqlGuardError> {
        expect_no_rows(&self.query(query).await?)
    }
}
