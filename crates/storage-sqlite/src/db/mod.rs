//! Database handle: pool, migrations, change bus, live-query plumbing.

pub mod write_actor;

use std::path::Path;
use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{error, warn};
use tokio::sync::{broadcast, mpsc};

use crate::errors::StorageError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const DB_FILE_NAME: &str = "turismo.db";
const CHANGE_BUS_CAPACITY: usize = 64;
const LIVE_QUERY_BUFFER: usize = 16;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Ensure the app data directory exists and return the database path.
pub fn init(app_data_dir: &str) -> Result<String, StorageError> {
    std::fs::create_dir_all(app_data_dir)
        .map_err(|e| StorageError::Migration(format!("cannot create app data dir: {}", e)))?;
    Ok(Path::new(app_data_dir)
        .join(DB_FILE_NAME)
        .to_string_lossy()
        .to_string())
}

/// Apply pending embedded migrations.
pub fn run_migrations(db_path: &str) -> Result<(), StorageError> {
    let mut conn = SqliteConnection::establish(db_path)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    Ok(())
}

#[derive(Debug)]
struct ForeignKeyCustomizer;

impl r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ForeignKeyCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        // The store enforces the entrepreneur -> municipality foreign key;
        // busy_timeout keeps concurrent readers from failing fast while the
        // writer holds the file.
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>, StorageError> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .connection_customizer(Box::new(ForeignKeyCustomizer))
        .build(manager)?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &Arc<DbPool>) -> Result<DbConnection, StorageError> {
    Ok(pool.get()?)
}

/// Last-write timestamp for cache bookkeeping.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Tables a committed write can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableChange {
    Municipalities,
    Entrepreneurs,
    Associations,
}

/// Broadcast of committed table changes; the stores publish, live queries
/// subscribe.
#[derive(Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<TableChange>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, change: TableChange) {
        // No subscribers is fine.
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.tx.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A push-based query result: one value immediately on subscription, a fresh
/// value after every committed write to the tables it depends on. Dropping
/// the receiver stops re-queries.
pub struct LiveQuery<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> LiveQuery<T> {
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

pub(crate) fn spawn_live_query<T, F>(
    changes: &ChangeBus,
    tables: &'static [TableChange],
    query: F,
) -> LiveQuery<T>
where
    T: Send + 'static,
    F: Fn() -> Result<T, StorageError> + Send + 'static,
{
    let mut events = changes.subscribe();
    let (tx, rx) = mpsc::channel(LIVE_QUERY_BUFFER);
    tokio::spawn(async move {
        match query() {
            Ok(value) => {
                if tx.send(value).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                error!("live query initial read failed: {}", err);
                return;
            }
        }
        loop {
            match events.recv().await {
                Ok(change) if tables.contains(&change) => match query() {
                    Ok(value) => {
                        if tx.send(value).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => warn!("live query refresh failed: {}", err),
                },
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Missed notifications collapse into one refresh.
                    warn!("live query lagged by {} change events", missed);
                    if let Ok(value) = query() {
                        if tx.send(value).await.is_err() {
                            return;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    });
    LiveQuery { rx }
}
