//! Store backend selection.

use std::sync::Arc;

use anyhow::Result;
use sea_orm::DatabaseConnection;

use crate::config::{AppConfig, StateBackend};
use crate::db;

use super::{MemoryStore, SqlStore, Store};

/// A constructed store plus, for the relational backend, the raw connection
/// used by health checks and the migrations applier.
pub struct StoreHandle {
    pub store: Arc<dyn Store>,
    pub db: Option<DatabaseConnection>,
}

/// Builds the store named by `STATE_BACKEND`.
///
/// The sql backend connects and pings before returning so a bad DSN fails at
/// startup.
pub async fn new_store(config: &AppConfig) -> Result<StoreHandle> {
    match config.state_backend {
        StateBackend::Memory => Ok(StoreHandle {
            store: Arc::new(MemoryStore::new()),
            db: None,
        }),
        StateBackend::Sql => {
            let conn = db::init_pool(&config.db_dsn).await?;
            Ok(StoreHandle {
                store: Arc::new(SqlStore::new(conn.clone())),
                db: Some(conn),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_needs_no_dsn() {
        let handle = new_store(&AppConfig::default()).await.unwrap();
        assert!(handle.db.is_none());
    }
}
