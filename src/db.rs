//! Database connection and pool management.
//!
//! Provides a SeaORM connection pool against the relational backend named by
//! `DB_DSN` (MySQL or Postgres), with the conservative pool defaults the
//! service runs with everywhere.

use std::time::Duration;

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};

/// Errors that can occur during database setup.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("failed to connect to database: {source}")]
    ConnectionFailed {
        #[from]
        source: sea_orm::DbErr,
    },
    #[error("invalid database configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Initializes the connection pool for the configured DSN.
///
/// Pool sizing is deliberately conservative: 20 open connections, 5 minute
/// max lifetime. The initial ping runs under a 5 second timeout so a
/// misconfigured DSN fails fast at startup instead of at first request.
pub async fn init_pool(dsn: &str) -> Result<DatabaseConnection> {
    if dsn.trim().is_empty() {
        return Err(DatabaseError::InvalidConfiguration {
            message: "database DSN cannot be empty".to_string(),
        }
        .into());
    }

    let mut opt = ConnectOptions::new(dsn);
    opt.max_connections(20)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(300))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let conn = Database::connect(opt)
        .await
        .map_err(|source| DatabaseError::ConnectionFailed { source })?;

    tokio::time::timeout(Duration::from_secs(5), health_check(&conn))
        .await
        .context("database ping timed out")??;

    Ok(conn)
}

/// Verifies the connection is alive with a trivial query.
pub async fn health_check(db: &DatabaseConnection) -> Result<()> {
    let stmt = Statement::from_string(db.get_database_backend(), "SELECT 1".to_string());

    db.query_one(stmt)
        .await
        .context("database health check failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_dsn_is_rejected() {
        let result = init_pool("").await;
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err().downcast::<DatabaseError>(),
            Ok(DatabaseError::InvalidConfiguration { .. })
        ));
    }
}
