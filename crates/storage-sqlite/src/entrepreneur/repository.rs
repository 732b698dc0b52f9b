//! Entrepreneur store.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use turismo_core::entrepreneur::{Entrepreneur, EntrepreneurStoreTrait};
use turismo_core::StoreError;

use crate::db::write_actor::WriteHandle;
use crate::db::{
    get_connection, now_ms, spawn_live_query, ChangeBus, DbPool, LiveQuery, TableChange,
};
use crate::errors::StorageError;
use crate::schema::entrepreneurs;
use crate::schema::entrepreneurs::dsl::*;

use super::model::EntrepreneurDB;

pub struct EntrepreneurStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    changes: ChangeBus,
}

fn load_all(conn: &mut SqliteConnection) -> Result<Vec<Entrepreneur>, StorageError> {
    let rows = entrepreneurs.load::<EntrepreneurDB>(conn)?;
    Ok(rows.into_iter().map(Entrepreneur::from).collect())
}

fn load_by_id(
    conn: &mut SqliteConnection,
    entrepreneur_id: i64,
) -> Result<Option<Entrepreneur>, StorageError> {
    let row = entrepreneurs
        .find(entrepreneur_id)
        .first::<EntrepreneurDB>(conn)
        .optional()?;
    Ok(row.map(Entrepreneur::from))
}

fn load_by_municipality(
    conn: &mut SqliteConnection,
    parent_id: i64,
) -> Result<Vec<Entrepreneur>, StorageError> {
    let rows = entrepreneurs
        .filter(municipality_id.eq(parent_id))
        .load::<EntrepreneurDB>(conn)?;
    Ok(rows.into_iter().map(Entrepreneur::from).collect())
}

fn load_by_category(
    conn: &mut SqliteConnection,
    category_name: &str,
) -> Result<Vec<Entrepreneur>, StorageError> {
    let rows = entrepreneurs
        .filter(category.eq(category_name))
        .load::<EntrepreneurDB>(conn)?;
    Ok(rows.into_iter().map(Entrepreneur::from).collect())
}

fn upsert_row(conn: &mut SqliteConnection, row: &EntrepreneurDB) -> Result<(), StorageError> {
    diesel::insert_into(entrepreneurs::table)
        .values(row)
        .on_conflict(entrepreneurs::id)
        .do_update()
        .set(row)
        .execute(conn)?;
    Ok(())
}

impl EntrepreneurStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle, changes: ChangeBus) -> Self {
        Self {
            pool,
            writer,
            changes,
        }
    }

    fn get_all_impl(&self) -> Result<Vec<Entrepreneur>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        load_all(&mut conn)
    }

    fn get_by_id_impl(&self, entrepreneur_id: i64) -> Result<Option<Entrepreneur>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        load_by_id(&mut conn, entrepreneur_id)
    }

    fn get_by_municipality_impl(&self, parent_id: i64) -> Result<Vec<Entrepreneur>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        load_by_municipality(&mut conn, parent_id)
    }

    fn get_by_category_impl(&self, category_name: &str) -> Result<Vec<Entrepreneur>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        load_by_category(&mut conn, category_name)
    }

    /// Live variant of `get_all`.
    pub fn watch_all(&self) -> LiveQuery<Vec<Entrepreneur>> {
        let pool = Arc::clone(&self.pool);
        spawn_live_query(&self.changes, &[TableChange::Entrepreneurs], move || {
            let mut conn = get_connection(&pool)?;
            load_all(&mut conn)
        })
    }

    /// Live variant of `get_by_id`.
    pub fn watch_by_id(&self, entrepreneur_id: i64) -> LiveQuery<Option<Entrepreneur>> {
        let pool = Arc::clone(&self.pool);
        spawn_live_query(&self.changes, &[TableChange::Entrepreneurs], move || {
            let mut conn = get_connection(&pool)?;
            load_by_id(&mut conn, entrepreneur_id)
        })
    }

    /// Live variant of `get_by_municipality`.
    pub fn watch_by_municipality(&self, parent_id: i64) -> LiveQuery<Vec<Entrepreneur>> {
        let pool = Arc::clone(&self.pool);
        spawn_live_query(&self.changes, &[TableChange::Entrepreneurs], move || {
            let mut conn = get_connection(&pool)?;
            load_by_municipality(&mut conn, parent_id)
        })
    }

    /// Live variant of `get_by_category`.
    pub fn watch_by_category(&self, category_name: &str) -> LiveQuery<Vec<Entrepreneur>> {
        let pool = Arc::clone(&self.pool);
        let category_name = category_name.to_string();
        spawn_live_query(&self.changes, &[TableChange::Entrepreneurs], move || {
            let mut conn = get_connection(&pool)?;
            load_by_category(&mut conn, &category_name)
        })
    }
}

#[async_trait]
impl EntrepreneurStoreTrait for EntrepreneurStore {
    fn get_all(&self) -> Result<Vec<Entrepreneur>, StoreError> {
        self.get_all_impl().map_err(StoreError::from)
    }

    fn get_by_id(&self, entrepreneur_id: i64) -> Result<Option<Entrepreneur>, StoreError> {
        self.get_by_id_impl(entrepreneur_id)
            .map_err(StoreError::from)
    }

    fn get_by_municipality(&self, parent_id: i64) -> Result<Vec<Entrepreneur>, StoreError> {
        self.get_by_municipality_impl(parent_id)
            .map_err(StoreError::from)
    }

    fn get_by_category(&self, category_name: &str) -> Result<Vec<Entrepreneur>, StoreError> {
        self.get_by_category_impl(category_name)
            .map_err(StoreError::from)
    }

    async fn upsert(&self, entrepreneur: Entrepreneur) -> Result<(), StoreError> {
        let row = EntrepreneurDB::from_model(&entrepreneur, now_ms());
        self.writer
            .exec(move |conn| upsert_row(conn, &row))
            .await
            .map_err(StoreError::from)?;
        self.changes.publish(TableChange::Entrepreneurs);
        Ok(())
    }

    async fn upsert_many(&self, batch: Vec<Entrepreneur>) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let stamp = now_ms();
        let rows: Vec<EntrepreneurDB> = batch
            .iter()
            .map(|model| EntrepreneurDB::from_model(model, stamp))
            .collect();
        self.writer
            .exec(move |conn| {
                for row in &rows {
                    upsert_row(conn, row)?;
                }
                Ok(())
            })
            .await
            .map_err(StoreError::from)?;
        self.changes.publish(TableChange::Entrepreneurs);
        Ok(())
    }

    async fn delete_by_id(&self, entrepreneur_id: i64) -> Result<(), StoreError> {
        self.writer
            .exec(move |conn| {
                diesel::delete(entrepreneurs.find(entrepreneur_id)).execute(conn)?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)?;
        // ON DELETE CASCADE also removes association rows.
        self.changes.publish(TableChange::Entrepreneurs);
        self.changes.publish(TableChange::Associations);
        Ok(())
    }
}
