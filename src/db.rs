use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, ManagerConfig};
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use futures::FutureExt;

use crate::error::{Result, TaskPilotError};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
pub type SqlitePool = Pool<SqliteAsyncConn>;

// WAL and a busy timeout keep concurrent pooled writers from tripping over
// SQLITE_BUSY; sequence conflicts then surface as unique violations, which
// the stores retry.
const CONNECTION_PRAGMAS: &str =
    "PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;";

pub async fn build_pool(sqlite_path: &str) -> Result<SqlitePool> {
    ensure_parent_dir(sqlite_path)?;
    run_migrations(sqlite_path).await?;

    let mut config = ManagerConfig::default();
    config.custom_setup = Box::new(|url: &str| {
        async move {
            let mut conn = SqliteAsyncConn::establish(url).await?;
            conn.batch_execute(CONNECTION_PRAGMAS)
                .await
                .map_err(diesel::ConnectionError::CouldntSetupConfiguration)?;
            Ok(conn)
        }
        .boxed()
    });
    let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new_with_config(
        sqlite_path,
        config,
    );
    Pool::builder()
        .build(manager)
        .await
        .map_err(|e| TaskPilotError::Database(e.to_string()))
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TaskPilotError::Runtime(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| TaskPilotError::Database(e.to_string()))?;
        Ok::<_, TaskPilotError>(())
    })
    .await
    .map_err(|e| TaskPilotError::Runtime(e.to_string()))??;
    Ok(())
}

pub fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
