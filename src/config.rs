use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SqlGuardError;
use crate::transaction::RetryPolicy;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5432;

/// Where to connect.
///
/// A `connection_string` wins over the individual fields. Without one, missing fields
/// fall back to `127.0.0.1:5432` and the login user of the current process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub connection_string: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
}

impl ConnectionSettings {
    /// Settings from a libpq-style connection string or a `postgres://` URL.
    ///
    /// # Errors
    /// Returns `SqlGuardError::ConfigError` when the string is not a usable connection
    /// string.
    pub fn from_connection_string(connection_string: impl Into<String>) -> Result<Self, SqlGuardError> {
        let connection_string = connection_string.into();
        validate_connection_string(&connection_string)?;
        Ok(Self {
            connection_string: Some(connection_string),
            ..Self::default()
        })
    }

    /// Settings from the standard `PG*` environment variables.
    ///
    /// # Errors
    /// Returns `SqlGuardError::ConfigError` unless both `PGUSER` and `PGHOST` are set.
    pub fn from_env() -> Result<Self, SqlGuardError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, SqlGuardError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (Some(user), Some(host)) = (lookup("PGUSER"), lookup("PGHOST")) else {
            return Err(SqlGuardError::ConfigError(
                "Missing configuration settings".to_string(),
            ));
        };
        let port = lookup("PGPORT")
            .map(|port| {
                port.parse::<u16>().map_err(|e| {
                    SqlGuardError::ConfigError(format!("PGPORT is not a valid port: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            connection_string: None,
            host: Some(host),
            port,
            user: Some(user),
            password: lookup("PGPASSWORD"),
            dbname: lookup("PGDATABASE"),
        })
    }

    /// Check the settings without connecting.
    ///
    /// # Errors
    /// Returns `SqlGuardError::ConfigError` for an invalid connection string or when no
    /// user can be determined.
    pub fn validate(&self) -> Result<(), SqlGuardError> {
        if let Some(connection_string) = &self.connection_string {
            return validate_connection_string(connection_string);
        }
        if self.resolved_user().is_none() {
            return Err(SqlGuardError::ConfigError("user is required".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn resolved_host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    #[must_use]
    pub fn resolved_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    #[must_use]
    pub fn resolved_user(&self) -> Option<String> {
        self.user.clone().or_else(login_user)
    }

    /// Driver configuration for these settings.
    ///
    /// # Errors
    /// Returns `SqlGuardError::ConfigError` when [`validate`](Self::validate) fails or the
    /// connection string cannot be parsed.
    #[cfg(feature = "postgres")]
    pub fn to_pg_config(&self) -> Result<tokio_postgres::Config, SqlGuardError> {
        self.validate()?;
        if let Some(connection_string) = &self.connection_string {
            return connection_string
                .parse::<tokio_postgres::Config>()
                .map_err(|_| SqlGuardError::ConfigError("Invalid connection string".to_string()));
        }

        let mut config = tokio_postgres::Config::new();
        config.host(self.resolved_host()).port(self.resolved_port());
        if let Some(user) = self.resolved_user() {
            config.user(&user);
        }
        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(dbname) = &self.dbname {
            config.dbname(dbname);
        }
        Ok(config)
    }
}

fn login_user() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .find_map(|key| env::var(key).ok().filter(|user| !user.is_empty()))
}

/// URLs must use the `postgres` or `postgresql` scheme and name a host. Key/value strings
/// are left to the driver.
fn validate_connection_string(connection_string: &str) -> Result<(), SqlGuardError> {
    let invalid = || SqlGuardError::ConfigError("Invalid connection string".to_string());

    let trimmed = connection_string.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let Some((scheme, rest)) = trimmed.split_once("://") else {
        #[cfg(feature = "postgres")]
        trimmed
            .parse::<tokio_postgres::Config>()
            .map_err(|_| invalid())?;
        return Ok(());
    };
    if !matches!(scheme, "postgres" | "postgresql") {
        return Err(invalid());
    }

    let authority = rest.split(['/', '?']).next().unwrap_or_default();
    let host_and_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host_and_port.split(':').next().unwrap_or_default();
    if host.is_empty() {
        return Err(invalid());
    }
    Ok(())
}

/// How `numeric` columns come back.
///
/// `int8` always decodes to [`RowValues::Int`](crate::RowValues::Int); only arbitrary
/// precision values need a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericDecoding {
    /// Nearest `f64`.
    #[default]
    Float,
    /// Exact decimal text, as the server prints it.
    Text,
}

/// Pool sizing and timeouts, handed to the bb8 builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_size: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Everything [`Database::connect`](crate::Database::connect) needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub connection: ConnectionSettings,
    pub pool: PoolSettings,
    pub numeric: NumericDecoding,
    pub retry: RetryPolicy,
}

impl GuardConfig {
    #[must_use]
    pub fn new(connection: ConnectionSettings) -> Self {
        Self {
            connection,
            ..Self::default()
        }
    }

    /// # Errors
    /// See [`ConnectionSettings::from_connection_string`].
    pub fn from_connection_string(connection_string: impl Into<String>) -> Result<Self, SqlGuardError> {
        ConnectionSettings::from_connection_string(connection_string).map(Self::new)
    }

    /// # Errors
    /// See [`ConnectionSettings::from_env`].
    pub fn from_env() -> Result<Self, SqlGuardError> {
        ConnectionSettings::from_env().map(Self::new)
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_numeric(mut self, numeric: NumericDecoding) -> Self {
        self.numeric = numeric;
        self
    }
}
