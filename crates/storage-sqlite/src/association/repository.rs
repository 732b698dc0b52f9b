//! Association store.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use turismo_core::entrepreneur::{AssociationStoreTrait, EntrepreneurSummary};
use turismo_core::StoreError;

use crate::db::write_actor::WriteHandle;
use crate::db::{get_connection, spawn_live_query, ChangeBus, DbPool, LiveQuery, TableChange};
use crate::errors::StorageError;
use crate::schema::{entrepreneur_municipality_refs as refs, entrepreneurs};

use super::model::AssociationDB;

pub struct AssociationStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    changes: ChangeBus,
}

fn insert_row(conn: &mut SqliteConnection, row: AssociationDB) -> Result<(), StorageError> {
    diesel::insert_into(refs::table)
        .values(&row)
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(())
}

/// The join behind a municipality's entrepreneur list. Row order carries no
/// meaning.
fn load_summaries(
    conn: &mut SqliteConnection,
    parent_id: i64,
) -> Result<Vec<EntrepreneurSummary>, StorageError> {
    let rows = refs::table
        .inner_join(entrepreneurs::table)
        .filter(refs::municipality_id.eq(parent_id))
        .select((
            entrepreneurs::id,
            entrepreneurs::business_name,
            entrepreneurs::category,
        ))
        .load::<(i64, String, String)>(conn)?;
    Ok(rows
        .into_iter()
        .map(|(id, business_name, category)| EntrepreneurSummary {
            id,
            business_name,
            category,
        })
        .collect())
}

impl AssociationStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle, changes: ChangeBus) -> Self {
        Self {
            pool,
            writer,
            changes,
        }
    }

    /// Live variant of `summaries_for_municipality`.
    pub fn watch_summaries_for_municipality(
        &self,
        parent_id: i64,
    ) -> LiveQuery<Vec<EntrepreneurSummary>> {
        let pool = Arc::clone(&self.pool);
        spawn_live_query(
            &self.changes,
            &[TableChange::Associations, TableChange::Entrepreneurs],
            move || {
                let mut conn = get_connection(&pool)?;
                load_summaries(&mut conn, parent_id)
            },
        )
    }
}

#[async_trait]
impl AssociationStoreTrait for AssociationStore {
    async fn insert(&self, entrepreneur_id: i64, municipality_id: i64) -> Result<(), StoreError> {
        self.writer
            .exec(move |conn| {
                insert_row(
                    conn,
                    AssociationDB {
                        entrepreneur_id,
                        municipality_id,
                    },
                )
            })
            .await
            .map_err(StoreError::from)?;
        self.changes.publish(TableChange::Associations);
        Ok(())
    }

    async fn insert_many(&self, pairs: Vec<(i64, i64)>) -> Result<(), StoreError> {
        if pairs.is_empty() {
            return Ok(());
        }
        self.writer
            .exec(move |conn| {
                for (entrepreneur_id, municipality_id) in pairs {
                    insert_row(
                        conn,
                        AssociationDB {
                            entrepreneur_id,
                            municipality_id,
                        },
                    )?;
                }
                Ok(())
            })
            .await
            .map_err(StoreError::from)?;
        self.changes.publish(TableChange::Associations);
        Ok(())
    }

    async fn replace_for_municipality(
        &self,
        municipality_id: i64,
        entrepreneur_ids: Vec<i64>,
    ) -> Result<(), StoreError> {
        self.writer
            .exec(move |conn| {
                // Delete-then-insert in one transaction: readers never see a
                // half-replaced set.
                diesel::delete(refs::table.filter(refs::municipality_id.eq(municipality_id)))
                    .execute(conn)?;
                for entrepreneur_id in entrepreneur_ids {
                    insert_row(
                        conn,
                        AssociationDB {
                            entrepreneur_id,
                            municipality_id,
                        },
                    )?;
                }
                Ok(())
            })
            .await
            .map_err(StoreError::from)?;
        self.changes.publish(TableChange::Associations);
        Ok(())
    }

    async fn delete_by_entrepreneur(&self, entrepreneur_id: i64) -> Result<(), StoreError> {
        self.writer
            .exec(move |conn| {
                diesel::delete(refs::table.filter(refs::entrepreneur_id.eq(entrepreneur_id)))
                    .execute(conn)?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)?;
        self.changes.publish(TableChange::Associations);
        Ok(())
    }

    async fn delete_by_municipality(&self, municipality_id: i64) -> Result<(), StoreError> {
        self.writer
            .exec(move |conn| {
                diesel::delete(refs::table.filter(refs::municipality_id.eq(municipality_id)))
                    .execute(conn)?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)?;
        self.changes.publish(TableChange::Associations);
        Ok(())
    }

    fn exists(&self, entrepreneur_id: i64, municipality_id: i64) -> Result<bool, StoreError> {
        let mut conn = get_connection(&self.pool).map_err(StoreError::from)?;
        diesel::select(exists(refs::table.find((entrepreneur_id, municipality_id))))
            .get_result::<bool>(&mut conn)
            .map_err(|e| StoreError::from(StorageError::from(e)))
    }

    fn summaries_for_municipality(
        &self,
        municipality_id: i64,
    ) -> Result<Vec<EntrepreneurSummary>, StoreError> {
        let mut conn = get_connection(&self.pool).map_err(StoreError::from)?;
        load_summaries(&mut conn, municipality_id).map_err(StoreError::from)
    }
}
