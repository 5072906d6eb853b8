use postgresql_embedded::PostgreSQL;

use crate::config::{ConnectionSettings, GuardConfig};
use crate::database::Database;
use crate::guard::Guard;
use crate::postgres::PgPool;

/// A running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    pub database_url: String,
    /// Settings that reach the test database with the embedded credentials
    pub settings: ConnectionSettings,
}

impl EmbeddedPostgres {
    /// Connect a [`Database`] to the test database.
    ///
    /// # Errors
    /// Propagates pool creation errors.
    pub async fn database(&self) -> Result<Database<PgPool>, crate::SqlGuardError> {
        Database::connect(GuardConfig::new(self.settings.clone())).await
    }
}

/// Start an embedded `PostgreSQL` instance and create `dbname` in it.
///
/// # Errors
/// Returns an error if the embedded server cannot be set up or started, if the database
/// cannot be created, or if the post-start connectivity check fails.
pub async fn setup_postgres_embedded(
    dbname: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error + Send + Sync>> {
    let mut postgresql = PostgreSQL::default();
    postgresql.setup().await?;
    postgresql.start().await?;
    postgresql.create_database(dbname).await?;

    let port = postgresql.settings().port;
    let host = postgresql.settings().host.clone();
    let user = postgresql.settings().username.clone();
    let password = postgresql.settings().password.clone();
    let database_url = format!("postgres://{user}:{password}@{host}:{port}/{dbname}");

    let settings = ConnectionSettings {
        connection_string: None,
        host: Some(host),
        port: Some(port),
        user: Some(user),
        password: Some(password),
        dbname: Some(dbname.to_string()),
    };

    let embedded = EmbeddedPostgres {
        postgresql,
        port,
        database_url,
        settings,
    };

    let db = embedded.database().await?;
    db.execute_unchecked("SELECT 1", &[]).await?;

    Ok(embedded)
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub async fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    let _ = postgresql.stop().await;
}
