//! PostgreSQL connection setup

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::time::Duration;
use tracing::info;

/// Build connect options from the `DB_*` settings.
///
/// Empty fields are left to the driver defaults (`PG*` variables, localhost,
/// port 5432, current user).
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    let mut options = PgConnectOptions::new();

    if !config.host.is_empty() {
        options = options.host(&config.host);
    }
    if !config.port.is_empty() {
        let port: u16 = config
            .port
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Invalid DB_PORT: {}", config.port)))?;
        options = options.port(port);
    }
    if !config.user.is_empty() {
        options = options.username(&config.user);
    }
    let password = config.password.expose_secret();
    if !password.is_empty() {
        options = options.password(password);
    }
    if !config.name.is_empty() {
        options = options.database(&config.name);
    }

    Ok(options)
}

/// Open the single long-lived connection used by the gateway
pub async fn connect(config: &DatabaseConfig) -> Result<PgConnection> {
    let options = connect_options(config)?;
    info!(
        host = %options.get_host(),
        port = options.get_port(),
        database = options.get_database().unwrap_or_default(),
        "Connecting to PostgreSQL"
    );

    let timeout = Duration::from_secs(config.connect_timeout_secs);
    let mut conn = tokio::time::timeout(timeout, PgConnection::connect_with(&options))
        .await
        .map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("Timed out connecting to PostgreSQL after {}s", timeout.as_secs()),
            ))
        })??;

    verify_connection(&mut conn).await?;

    info!("PostgreSQL connection established");
    Ok(conn)
}

/// Verify the connection answers queries
async fn verify_connection(conn: &mut PgConnection) -> Result<()> {
    sqlx::query("SELECT 1").execute(&mut *conn).await?;
    Ok(())
}
