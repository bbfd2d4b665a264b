//! One-shot DDL application.
//!
//! Applies `*.sql` files from a directory in lexicographic order. Each file
//! runs once: applied names are tracked in `schema_migrations` and skipped
//! on later starts. The first failure aborts the remaining sequence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, Value};
use tracing::info;

/// Upper bound for one full migration pass.
pub const MIGRATIONS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("failed to read migrations directory {dir}: {source}")]
    ReadDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read migration {name}: {source}")]
    ReadFile {
        name: String,
        source: std::io::Error,
    },
    #[error("migration {name} failed: {source}")]
    Apply {
        name: String,
        source: sea_orm::DbErr,
    },
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("migrations timed out after {}s", MIGRATIONS_TIMEOUT.as_secs())]
    Timeout,
}

/// Applies all pending `*.sql` files under `dir`, bounded by
/// [`MIGRATIONS_TIMEOUT`].
pub async fn apply_dir(db: &DatabaseConnection, dir: &Path) -> Result<(), MigrateError> {
    tokio::time::timeout(MIGRATIONS_TIMEOUT, apply_dir_inner(db, dir))
        .await
        .map_err(|_| MigrateError::Timeout)?
}

async fn apply_dir_inner(db: &DatabaseConnection, dir: &Path) -> Result<(), MigrateError> {
    let entries = std::fs::read_dir(dir).map_err(|source| MigrateError::ReadDir {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
        })
        .collect();

    files.sort();

    ensure_schema_migrations(db).await?;

    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        if is_applied(db, &name).await? {
            continue;
        }

        let sql = std::fs::read_to_string(&path).map_err(|source| MigrateError::ReadFile {
            name: name.clone(),
            source,
        })?;

        // Drivers reject multi-statement batches, so run each statement on
        // its own. The DDL here never embeds semicolons in literals.
        for statement in sql.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }

            db.execute_unprepared(statement)
                .await
                .map_err(|source| MigrateError::Apply {
                    name: name.clone(),
                    source,
                })?;
        }

        mark_applied(db, &name).await?;
        info!(migration = %name, "applied");
    }

    Ok(())
}

async fn ensure_schema_migrations(db: &DatabaseConnection) -> Result<(), MigrateError> {
    db.execute_unprepared(
        "CREATE TABLE IF NOT EXISTS schema_migrations ( \
           name VARCHAR(255) NOT NULL, \
           applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
           PRIMARY KEY (name) \
         )",
    )
    .await?;
    Ok(())
}

async fn is_applied(db: &DatabaseConnection, name: &str) -> Result<bool, MigrateError> {
    let stmt = bound_statement(
        db.get_database_backend(),
        "SELECT name FROM schema_migrations WHERE name = ?",
        name,
    );
    Ok(db.query_one(stmt).await?.is_some())
}

async fn mark_applied(db: &DatabaseConnection, name: &str) -> Result<(), MigrateError> {
    let stmt = bound_statement(
        db.get_database_backend(),
        "INSERT INTO schema_migrations (name) VALUES (?)",
        name,
    );
    db.execute(stmt).await?;
    Ok(())
}

fn bound_statement(backend: DbBackend, mysql_sql: &str, name: &str) -> Statement {
    // sea-orm does not translate placeholders, so pick the dialect's.
    let sql = match backend {
        DbBackend::Postgres => mysql_sql.replace('?', "$1"),
        _ => mysql_sql.to_string(),
    };
    Statement::from_sql_and_values(backend, sql, [Value::from(name)])
}
