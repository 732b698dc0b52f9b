//! Dedicated writer thread.
//!
//! SQLite allows one writer at a time; funnelling every mutation through a
//! single actor thread serializes them without lock contention, and wrapping
//! each job in an immediate transaction makes a multi-statement batch atomic
//! with respect to concurrent readers.

use std::thread;

use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use super::DbPool;
use crate::errors::StorageError;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send>;

#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<Job>,
}

pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    thread::Builder::new()
        .name("turismo-db-writer".to_string())
        .spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                match pool.get() {
                    Ok(mut conn) => job(&mut conn),
                    Err(err) => {
                        // The job's reply channel is dropped with it; the
                        // caller sees a Writer error.
                        error!("writer could not acquire a connection: {}", err);
                    }
                }
            }
        })
        .expect("failed to spawn database writer thread");
    WriteHandle { tx }
}

impl WriteHandle {
    /// Run a write closure inside one immediate transaction on the writer
    /// thread. An `Err` from the closure rolls the whole batch back.
    pub async fn exec<R, F>(&self, f: F) -> Result<R, StorageError>
    where
        R: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<R, StorageError> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            let result = conn.immediate_transaction(f);
            let _ = reply_tx.send(result);
        });
        self.tx
            .send(job)
            .map_err(|_| StorageError::Writer("writer thread is gone".to_string()))?;
        reply_rx
            .await
            .map_err(|_| StorageError::Writer("write job was dropped".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init, run_migrations};
    use diesel::prelude::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn failed_job_rolls_back_the_whole_batch() {
        let dir = tempdir().expect("tempdir");
        let db_path = init(dir.path().to_str().unwrap()).expect("init");
        run_migrations(&db_path).expect("migrations");
        let pool = create_pool(&db_path).expect("pool");
        let writer = spawn_writer(pool.as_ref().clone());

        let result = writer
            .exec(|conn| -> Result<(), StorageError> {
                diesel::sql_query(
                    "INSERT INTO municipalities (id, name, department, province, district, \
                     user_id, updated_at_ms) VALUES (1, 'x', '', '', '', 0, 0)",
                )
                .execute(conn)?;
                // Second statement violates the primary key; the first must
                // not survive.
                diesel::sql_query(
                    "INSERT INTO municipalities (id, name, department, province, district, \
                     user_id, updated_at_ms) VALUES (1, 'y', '', '', '', 0, 0)",
                )
                .execute(conn)?;
                Ok(())
            })
            .await;
        assert!(result.is_err());

        let mut conn = pool.get().expect("conn");
        #[derive(QueryableByName)]
        struct CountRow {
            #[diesel(sql_type = diesel::sql_types::BigInt)]
            c: i64,
        }
        let row = diesel::sql_query("SELECT COUNT(*) AS c FROM municipalities")
            .get_result::<CountRow>(&mut conn)
            .expect("count");
        assert_eq!(row.c, 0);
    }
}
