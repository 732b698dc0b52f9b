//! Municipality store.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use turismo_core::municipality::{Municipality, MunicipalityStoreTrait};
use turismo_core::StoreError;

use crate::db::{
    get_connection, now_ms, spawn_live_query, ChangeBus, DbPool, LiveQuery, TableChange,
};
use crate::db::write_actor::WriteHandle;
use crate::errors::StorageError;
use crate::schema::municipalities;
use crate::schema::municipalities::dsl::*;

use super::model::MunicipalityDB;

pub struct MunicipalityStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    changes: ChangeBus,
}

fn load_all(conn: &mut SqliteConnection) -> Result<Vec<Municipality>, StorageError> {
    let rows = municipalities.load::<MunicipalityDB>(conn)?;
    Ok(rows.into_iter().map(Municipality::from).collect())
}

fn load_by_id(
    conn: &mut SqliteConnection,
    municipality_id: i64,
) -> Result<Option<Municipality>, StorageError> {
    let row = municipalities
        .find(municipality_id)
        .first::<MunicipalityDB>(conn)
        .optional()?;
    Ok(row.map(Municipality::from))
}

fn load_by_department(
    conn: &mut SqliteConnection,
    department_name: &str,
) -> Result<Vec<Municipality>, StorageError> {
    let rows = municipalities
        .filter(department.eq(department_name))
        .load::<MunicipalityDB>(conn)?;
    Ok(rows.into_iter().map(Municipality::from).collect())
}

fn upsert_row(conn: &mut SqliteConnection, row: &MunicipalityDB) -> Result<(), StorageError> {
    diesel::insert_into(municipalities::table)
        .values(row)
        .on_conflict(municipalities::id)
        .do_update()
        .set(row)
        .execute(conn)?;
    Ok(())
}

impl MunicipalityStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle, changes: ChangeBus) -> Self {
        Self {
            pool,
            writer,
            changes,
        }
    }

    fn get_all_impl(&self) -> Result<Vec<Municipality>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        load_all(&mut conn)
    }

    fn get_by_id_impl(&self, municipality_id: i64) -> Result<Option<Municipality>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        load_by_id(&mut conn, municipality_id)
    }

    fn get_by_department_impl(
        &self,
        department_name: &str,
    ) -> Result<Vec<Municipality>, StorageError> {
        let mut conn = get_connection(&self.pool)?;
        load_by_department(&mut conn, department_name)
    }

    /// Live variant of `get_all`.
    pub fn watch_all(&self) -> LiveQuery<Vec<Municipality>> {
        let pool = Arc::clone(&self.pool);
        spawn_live_query(&self.changes, &[TableChange::Municipalities], move || {
            let mut conn = get_connection(&pool)?;
            load_all(&mut conn)
        })
    }

    /// Live variant of `get_by_id`.
    pub fn watch_by_id(&self, municipality_id: i64) -> LiveQuery<Option<Municipality>> {
        let pool = Arc::clone(&self.pool);
        spawn_live_query(&self.changes, &[TableChange::Municipalities], move || {
            let mut conn = get_connection(&pool)?;
            load_by_id(&mut conn, municipality_id)
        })
    }

    /// Live variant of `get_by_department`.
    pub fn watch_by_department(&self, department_name: &str) -> LiveQuery<Vec<Municipality>> {
        let pool = Arc::clone(&self.pool);
        let department_name = department_name.to_string();
        spawn_live_query(&self.changes, &[TableChange::Municipalities], move || {
            let mut conn = get_connection(&pool)?;
            load_by_department(&mut conn, &department_name)
        })
    }
}

#[async_trait]
impl MunicipalityStoreTrait for MunicipalityStore {
    fn get_all(&self) -> Result<Vec<Municipality>, StoreError> {
        self.get_all_impl().map_err(StoreError::from)
    }

    fn get_by_id(&self, municipality_id: i64) -> Result<Option<Municipality>, StoreError> {
        self.get_by_id_impl(municipality_id)
            .map_err(StoreError::from)
    }

    fn get_by_department(&self, department_name: &str) -> Result<Vec<Municipality>, StoreError> {
        self.get_by_department_impl(department_name)
            .map_err(StoreError::from)
    }

    async fn upsert(&self, municipality: Municipality) -> Result<(), StoreError> {
        let row = MunicipalityDB::from_model(&municipality, now_ms());
        self.writer
            .exec(move |conn| upsert_row(conn, &row))
            .await
            .map_err(StoreError::from)?;
        self.changes.publish(TableChange::Municipalities);
        Ok(())
    }

    async fn upsert_many(&self, batch: Vec<Municipality>) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let stamp = now_ms();
        let rows: Vec<MunicipalityDB> = batch
            .iter()
            .map(|model| MunicipalityDB::from_model(model, stamp))
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
        self.changes.publish(TableChange::Municipalities);
        Ok(())
    }

    async fn delete_by_id(&self, municipality_id: i64) -> Result<(), StoreError> {
        self.writer
            .exec(move |conn| {
                diesel::delete(municipalities.find(municipality_id)).execute(conn)?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)?;
        // ON DELETE CASCADE also removes dependent entrepreneurs and
        // association rows.
        self.changes.publish(TableChange::Municipalities);
        self.changes.publish(TableChange::Entrepreneurs);
        self.changes.publish(TableChange::Associations);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::write_actor::spawn_writer;
    use crate::db::{create_pool, init, run_migrations};
    use tempfile::tempdir;

    fn setup() -> (Arc<DbPool>, WriteHandle, ChangeBus) {
        let dir = tempdir().expect("tempdir").keep();
        let db_path = init(dir.to_str().unwrap()).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        (pool, writer, ChangeBus::new())
    }

    fn sample(municipality_id: i64, municipality_name: &str) -> Municipality {
        Municipality {
            id: municipality_id,
            name: municipality_name.to_string(),
            department: "Puno".to_string(),
            province: "Puno".to_string(),
            district: municipality_name.to_string(),
            address: None,
            phone: Some("051-123456".to_string()),
            website: None,
            description: None,
            user_id: 2,
            entrepreneurs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn upsert_then_read_back() {
        let (pool, writer, changes) = setup();
        let store = MunicipalityStore::new(pool, writer, changes);

        store.upsert(sample(1, "Capachica")).await.unwrap();
        let row = store.get_by_id(1).unwrap().expect("row present");
        assert_eq!(row.name, "Capachica");
        assert_eq!(row.phone.as_deref(), Some("051-123456"));
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let (pool, writer, changes) = setup();
        let store = MunicipalityStore::new(pool, writer, changes);

        store.upsert(sample(1, "Capachica")).await.unwrap();
        store.upsert(sample(1, "Capachica")).await.unwrap();

        let rows = store.get_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], sample(1, "Capachica"));
    }

    #[tokio::test]
    async fn upsert_fully_overwrites_including_nulls() {
        let (pool, writer, changes) = setup();
        let store = MunicipalityStore::new(pool, writer, changes);

        store.upsert(sample(1, "Capachica")).await.unwrap();
        let mut updated = sample(1, "Capachica");
        updated.phone = None;
        updated.description = Some("Península del Titicaca".to_string());
        store.upsert(updated.clone()).await.unwrap();

        let row = store.get_by_id(1).unwrap().unwrap();
        assert_eq!(row.phone, None);
        assert_eq!(row.description.as_deref(), Some("Península del Titicaca"));
    }

    #[tokio::test]
    async fn filters_by_department() {
        let (pool, writer, changes) = setup();
        let store = MunicipalityStore::new(pool, writer, changes);

        let mut other = sample(2, "Ilo");
        other.department = "Moquegua".to_string();
        store
            .upsert_many(vec![sample(1, "Capachica"), other])
            .await
            .unwrap();

        let rows = store.get_by_department("Puno").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
        assert!(store.get_by_department("Cusco").unwrap().is_empty());
    }

    #[tokio::test]
    async fn watch_all_emits_initial_snapshot_and_refreshes_on_write() {
        let (pool, writer, changes) = setup();
        let store = MunicipalityStore::new(pool, writer, changes);

        let mut live = store.watch_all();
        assert!(live.next().await.unwrap().is_empty());

        store.upsert(sample(1, "Capachica")).await.unwrap();
        let refreshed = live.next().await.unwrap();
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].name, "Capachica");
    }
}
