//! Reconciling repository for entrepreneurs.
//!
//! Same cache-then-network arc as the municipality repository, plus the
//! parent-repair step: remote payloads embed at most a municipality summary,
//! so before child rows are written, a placeholder-or-full municipality row
//! is upserted for every distinct parent id in the payload. Association rows
//! for the affected parents are then replaced (delete-then-insert) to match
//! exactly what the remote returned.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, warn};

use crate::errors::{ApiError, StoreError};
use crate::municipality::{Municipality, MunicipalityStoreTrait};
use crate::state::{ResourceEmitter, ResourceState, ResourceStream};

use super::{
    AssociationStoreTrait, Entrepreneur, EntrepreneurGateway, EntrepreneurStoreTrait,
    NewEntrepreneur,
};

pub struct EntrepreneurRepository {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn EntrepreneurStoreTrait>,
    municipalities: Arc<dyn MunicipalityStoreTrait>,
    associations: Arc<dyn AssociationStoreTrait>,
    gateway: Arc<dyn EntrepreneurGateway>,
}

enum ListQuery {
    All,
    Category(String),
}

impl EntrepreneurRepository {
    pub fn new(
        store: Arc<dyn EntrepreneurStoreTrait>,
        municipalities: Arc<dyn MunicipalityStoreTrait>,
        associations: Arc<dyn AssociationStoreTrait>,
        gateway: Arc<dyn EntrepreneurGateway>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                municipalities,
                associations,
                gateway,
            }),
        }
    }

    /// All entrepreneurs, cache first.
    pub fn get_all(&self) -> ResourceStream<Vec<Entrepreneur>> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_list(tx, ListQuery::All).await;
        });
        stream
    }

    /// Entrepreneurs of one category ("rubro"), cache first.
    pub fn get_by_category(&self, category: &str) -> ResourceStream<Vec<Entrepreneur>> {
        let inner = Arc::clone(&self.inner);
        let category = category.to_string();
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_list(tx, ListQuery::Category(category)).await;
        });
        stream
    }

    /// Entrepreneurs registered under one municipality, cache first.
    pub fn get_by_municipality(&self, municipality_id: i64) -> ResourceStream<Vec<Entrepreneur>> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_by_municipality(tx, municipality_id).await;
        });
        stream
    }

    /// One entrepreneur by id, cache first.
    pub fn get_by_id(&self, id: i64) -> ResourceStream<Entrepreneur> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_get_by_id(tx, id).await;
        });
        stream
    }

    /// The authenticated user's own business; network-only (no cache key).
    pub fn get_mine(&self) -> ResourceStream<Entrepreneur> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_get_mine(tx).await;
        });
        stream
    }

    pub fn create(&self, request: NewEntrepreneur) -> ResourceStream<Entrepreneur> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_save(tx, None, request).await;
        });
        stream
    }

    pub fn update(&self, id: i64, request: NewEntrepreneur) -> ResourceStream<Entrepreneur> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_save(tx, Some(id), request).await;
        });
        stream
    }

    pub fn delete(&self, id: i64) -> ResourceStream<bool> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_delete(tx, id).await;
        });
        stream
    }
}

/// Placeholder-or-full municipality rows for every distinct parent id in the
/// payload, in payload order. A record with an embedded summary contributes
/// name and district; one without contributes a bare-id placeholder.
fn parent_rows(records: &[Entrepreneur]) -> Vec<Municipality> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for record in records {
        if !seen.insert(record.municipality_id) {
            continue;
        }
        let row = match &record.municipality {
            Some(summary) if summary.id == record.municipality_id => {
                Municipality::placeholder_from_summary(summary)
            }
            _ => Municipality::placeholder(record.municipality_id),
        };
        rows.push(row);
    }
    rows
}

/// Distinct parent ids in payload order.
fn affected_parents(records: &[Entrepreneur]) -> Vec<i64> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| seen.insert(record.municipality_id))
        .map(|record| record.municipality_id)
        .collect()
}

impl Inner {
    /// Attach the cached parent summary; a missing parent row yields `None`,
    /// never an error.
    fn join_parent(&self, mut record: Entrepreneur) -> Result<Entrepreneur, StoreError> {
        record.municipality = self
            .municipalities
            .get_by_id(record.municipality_id)?
            .map(|parent| parent.summary());
        Ok(record)
    }

    fn load_cached_list(&self, query: &ListQuery) -> Result<Vec<Entrepreneur>, StoreError> {
        let rows = match query {
            ListQuery::All => self.store.get_all()?,
            ListQuery::Category(category) => self.store.get_by_category(category)?,
        };
        rows.into_iter()
            .map(|row| self.join_parent(row))
            .collect()
    }

    /// Parents, then children, then associations; sequentially, in that
    /// order, so the foreign-key invariant holds at every step.
    async fn persist_batch(&self, records: &[Entrepreneur]) -> Result<(), StoreError> {
        let parents = parent_rows(records);
        if !parents.is_empty() {
            self.municipalities.upsert_many(parents).await?;
        }
        self.store.upsert_many(records.to_vec()).await?;
        Ok(())
    }

    async fn replace_payload_associations(
        &self,
        records: &[Entrepreneur],
    ) -> Result<(), StoreError> {
        for parent_id in affected_parents(records) {
            let entrepreneur_ids = records
                .iter()
                .filter(|record| record.municipality_id == parent_id)
                .map(|record| record.id)
                .collect();
            self.associations
                .replace_for_municipality(parent_id, entrepreneur_ids)
                .await?;
        }
        Ok(())
    }

    /// Persist one remote record: repair its parent, upsert the row, and
    /// re-point its association pair.
    async fn persist_one(&self, record: &Entrepreneur) -> Result<(), StoreError> {
        self.persist_batch(std::slice::from_ref(record)).await?;
        self.associations.delete_by_entrepreneur(record.id).await?;
        self.associations
            .insert(record.id, record.municipality_id)
            .await
    }

    async fn run_list(&self, tx: ResourceEmitter<Vec<Entrepreneur>>, query: ListQuery) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        let cached = match self.load_cached_list(&query) {
            Ok(rows) => rows,
            Err(err) => {
                error!("entrepreneur cache read failed: {}", err);
                tx.emit(ResourceState::Error(err.to_string())).await;
                return;
            }
        };
        let have_cache = !cached.is_empty();
        if have_cache {
            debug!("emitting {} entrepreneurs from local cache", cached.len());
            if !tx.emit(ResourceState::Success(cached)).await {
                return;
            }
        }

        let fetched = match &query {
            ListQuery::All => self.gateway.list().await,
            ListQuery::Category(category) => self.gateway.by_category(category).await,
        };
        match fetched {
            Ok(remote) => {
                debug!("fetched {} entrepreneurs from server", remote.len());
                let persisted = async {
                    self.persist_batch(&remote).await?;
                    self.replace_payload_associations(&remote).await
                }
                .await;
                if let Err(err) = persisted {
                    self.emit_store_error(&tx, err).await;
                    return;
                }
                tx.emit(ResourceState::Success(remote)).await;
            }
            Err(err) => self.handle_fetch_error(&tx, err, have_cache).await,
        }
    }

    async fn run_by_municipality(
        &self,
        tx: ResourceEmitter<Vec<Entrepreneur>>,
        municipality_id: i64,
    ) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        let cached = match self
            .store
            .get_by_municipality(municipality_id)
            .and_then(|rows| {
                rows.into_iter()
                    .map(|row| self.join_parent(row))
                    .collect::<Result<Vec<_>, _>>()
            }) {
            Ok(rows) => rows,
            Err(err) => {
                error!("entrepreneur cache read failed: {}", err);
                tx.emit(ResourceState::Error(err.to_string())).await;
                return;
            }
        };
        let have_cache = !cached.is_empty();
        if have_cache {
            debug!(
                "emitting {} entrepreneurs for municipality {} from local cache",
                cached.len(),
                municipality_id
            );
            if !tx.emit(ResourceState::Success(cached)).await {
                return;
            }
        }

        match self.gateway.by_municipality(municipality_id).await {
            Ok(remote) => {
                let persisted = async {
                    if !remote.is_empty() {
                        self.persist_batch(&remote).await?;
                        self.ensure_parent_exists(municipality_id).await?;
                    }
                    // The queried municipality is the affected parent here,
                    // even when the payload is empty: its association rows
                    // become exactly what the server returned.
                    let entrepreneur_ids = remote.iter().map(|record| record.id).collect();
                    self.associations
                        .replace_for_municipality(municipality_id, entrepreneur_ids)
                        .await
                }
                .await;
                if let Err(err) = persisted {
                    self.emit_store_error(&tx, err).await;
                    return;
                }
                tx.emit(ResourceState::Success(remote)).await;
            }
            Err(err) => self.handle_fetch_error(&tx, err, have_cache).await,
        }
    }

    async fn run_get_by_id(&self, tx: ResourceEmitter<Entrepreneur>, id: i64) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        let cached = match self
            .store
            .get_by_id(id)
            .and_then(|row| row.map(|row| self.join_parent(row)).transpose())
        {
            Ok(row) => row,
            Err(err) => {
                error!("entrepreneur cache read failed: {}", err);
                tx.emit(ResourceState::Error(err.to_string())).await;
                return;
            }
        };
        let have_cache = cached.is_some();
        if let Some(row) = cached {
            debug!("emitting entrepreneur {} from local cache", id);
            if !tx.emit(ResourceState::Success(row)).await {
                return;
            }
        }

        match self.gateway.get(id).await {
            Ok(remote) => {
                if let Err(err) = self.persist_one(&remote).await {
                    self.emit_store_error(&tx, err).await;
                    return;
                }
                tx.emit(ResourceState::Success(remote)).await;
            }
            Err(err) => self.handle_fetch_error(&tx, err, have_cache).await,
        }
    }

    async fn run_get_mine(&self, tx: ResourceEmitter<Entrepreneur>) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        match self.gateway.mine().await {
            Ok(remote) => {
                debug!("fetched own entrepreneur {} from server", remote.id);
                if let Err(err) = self.persist_one(&remote).await {
                    self.emit_store_error(&tx, err).await;
                    return;
                }
                tx.emit(ResourceState::Success(remote)).await;
            }
            Err(err) => {
                tx.emit(ResourceState::Error(err.user_message())).await;
            }
        }
    }

    async fn run_save(
        &self,
        tx: ResourceEmitter<Entrepreneur>,
        id: Option<i64>,
        request: NewEntrepreneur,
    ) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        let saved = match id {
            Some(id) => self.gateway.update(id, &request).await,
            None => self.gateway.create(&request).await,
        };
        match saved {
            Ok(remote) => {
                debug!("saved entrepreneur {} on server", remote.id);
                // The echo may omit or disagree on the parent; the id the
                // user submitted is authoritative for the local row.
                let mut row = remote.clone();
                row.municipality_id = request.municipality_id;
                let persisted = async {
                    self.ensure_parent_exists(request.municipality_id).await?;
                    self.store.upsert(row).await?;
                    if id.is_some() {
                        self.associations
                            .delete_by_entrepreneur(remote.id)
                            .await?;
                    }
                    self.associations
                        .insert(remote.id, request.municipality_id)
                        .await
                }
                .await;
                if let Err(err) = persisted {
                    self.emit_store_error(&tx, err).await;
                    return;
                }
                tx.emit(ResourceState::Success(remote)).await;
            }
            Err(err) => {
                tx.emit(ResourceState::Error(err.user_message())).await;
            }
        }
    }

    async fn run_delete(&self, tx: ResourceEmitter<bool>, id: i64) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        match self.gateway.delete(id).await {
            Ok(()) => {
                debug!("deleted entrepreneur {} on server", id);
                let removed = async {
                    self.associations.delete_by_entrepreneur(id).await?;
                    self.store.delete_by_id(id).await
                }
                .await;
                if let Err(err) = removed {
                    self.emit_store_error(&tx, err).await;
                    return;
                }
                tx.emit(ResourceState::Success(true)).await;
            }
            Err(err) => {
                tx.emit(ResourceState::Error(err.user_message())).await;
            }
        }
    }

    /// Insert a bare placeholder when the municipality is not cached yet.
    async fn ensure_parent_exists(&self, municipality_id: i64) -> Result<(), StoreError> {
        if self.municipalities.get_by_id(municipality_id)?.is_none() {
            self.municipalities
                .upsert(Municipality::placeholder(municipality_id))
                .await?;
        }
        Ok(())
    }

    async fn handle_fetch_error<T>(
        &self,
        tx: &ResourceEmitter<T>,
        err: ApiError,
        have_cache: bool,
    ) {
        if have_cache {
            warn!("entrepreneur fetch failed, serving cache only: {}", err);
        } else {
            tx.emit(ResourceState::Error(err.user_message())).await;
        }
    }

    async fn emit_store_error<T>(&self, tx: &ResourceEmitter<T>, err: StoreError) {
        match &err {
            StoreError::ReferentialIntegrity(detail) => {
                error!("referential integrity violation in entrepreneur write: {}", detail);
            }
            StoreError::Internal(detail) => {
                error!("entrepreneur write failed: {}", detail);
            }
        }
        tx.emit(ResourceState::Error(err.to_string())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::municipality::MunicipalitySummary;
    use crate::testutil::{
        entrepreneur, entrepreneur_with_summary, municipality, MemoryAssociationStore,
        MemoryEntrepreneurStore, MemoryMunicipalityStore, StubEntrepreneurGateway,
    };

    struct Fixture {
        municipalities: Arc<MemoryMunicipalityStore>,
        entrepreneurs: Arc<MemoryEntrepreneurStore>,
        associations: Arc<MemoryAssociationStore>,
        gateway: Arc<StubEntrepreneurGateway>,
        repository: EntrepreneurRepository,
    }

    fn fixture() -> Fixture {
        let municipalities = Arc::new(MemoryMunicipalityStore::new());
        let entrepreneurs = Arc::new(MemoryEntrepreneurStore::new(Arc::clone(&municipalities)));
        let associations = Arc::new(MemoryAssociationStore::new(Arc::clone(&entrepreneurs)));
        let gateway = Arc::new(StubEntrepreneurGateway::new());
        let repository = EntrepreneurRepository::new(
            Arc::clone(&entrepreneurs) as Arc<dyn EntrepreneurStoreTrait>,
            Arc::clone(&municipalities) as Arc<dyn MunicipalityStoreTrait>,
            Arc::clone(&associations) as Arc<dyn AssociationStoreTrait>,
            Arc::clone(&gateway) as Arc<dyn EntrepreneurGateway>,
        );
        Fixture {
            municipalities,
            entrepreneurs,
            associations,
            gateway,
            repository,
        }
    }

    #[tokio::test]
    async fn timed_out_fetch_is_suppressed_when_cached() {
        let f = fixture();
        f.municipalities.seed(vec![municipality(3, "Capachica")]);
        f.entrepreneurs.seed(vec![entrepreneur(7, "Hostal Titicaca", 3)]);
        f.gateway.on_get(Err(ApiError::Timeout));

        let states = f.repository.get_by_id(7).collect().await;

        assert_eq!(states.len(), 2);
        assert!(states[0].is_loading());
        let cached = states[1].data().expect("cached success");
        assert_eq!(cached.id, 7);
        // Cache join attaches the parent summary.
        assert_eq!(
            cached.municipality.as_ref().map(|m| m.id),
            Some(3)
        );
    }

    #[tokio::test]
    async fn referential_repair_synthesizes_parent_from_summary() {
        let f = fixture();
        let remote = entrepreneur_with_summary(
            7,
            "Hostal Titicaca",
            MunicipalitySummary {
                id: 5,
                name: "Chucuito".to_string(),
                district: "Chucuito".to_string(),
            },
        );
        f.gateway.on_get(Ok(remote));

        let states = f.repository.get_by_id(7).collect().await;
        assert!(states.last().unwrap().is_success());

        let parent = f
            .municipalities
            .get_by_id(5)
            .unwrap()
            .expect("placeholder parent");
        assert_eq!(parent.name, "Chucuito");
        assert_eq!(parent.district, "Chucuito");
        assert_eq!(parent.department, "");
        let child = f.entrepreneurs.get_by_id(7).unwrap().expect("child row");
        assert_eq!(child.municipality_id, 5);
        assert!(f.associations.exists(7, 5).unwrap());
    }

    #[tokio::test]
    async fn association_replace_is_not_a_merge() {
        let f = fixture();
        f.municipalities.seed(vec![municipality(3, "Capachica")]);
        f.entrepreneurs.seed(vec![
            entrepreneur(1, "A", 3),
            entrepreneur(2, "B", 3),
        ]);
        f.associations.seed(vec![(1, 3), (2, 3)]);
        f.gateway.on_by_municipality(Ok(vec![
            entrepreneur_with_summary(
                2,
                "B",
                MunicipalitySummary {
                    id: 3,
                    name: "Capachica".to_string(),
                    district: "Capachica".to_string(),
                },
            ),
            entrepreneur_with_summary(
                4,
                "C",
                MunicipalitySummary {
                    id: 3,
                    name: "Capachica".to_string(),
                    district: "Capachica".to_string(),
                },
            ),
        ]));

        let states = f.repository.get_by_municipality(3).collect().await;
        assert!(states.last().unwrap().is_success());

        let mut ids: Vec<i64> = f
            .associations
            .summaries_for_municipality(3)
            .unwrap()
            .iter()
            .map(|summary| summary.id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 4]);
    }

    #[tokio::test]
    async fn list_persists_parents_before_children() {
        let f = fixture();
        // The in-memory entrepreneur store rejects rows whose parent is
        // missing, so this only passes when repair runs first.
        f.gateway.on_list(Ok(vec![
            entrepreneur_with_summary(
                1,
                "A",
                MunicipalitySummary {
                    id: 10,
                    name: "Juli".to_string(),
                    district: "Juli".to_string(),
                },
            ),
            entrepreneur_with_summary(
                2,
                "B",
                MunicipalitySummary {
                    id: 11,
                    name: "Pomata".to_string(),
                    district: "Pomata".to_string(),
                },
            ),
            entrepreneur_with_summary(
                3,
                "C",
                MunicipalitySummary {
                    id: 10,
                    name: "Juli".to_string(),
                    district: "Juli".to_string(),
                },
            ),
        ]));

        let states = f.repository.get_all().collect().await;
        assert!(states.last().unwrap().is_success());

        assert!(f.municipalities.get_by_id(10).unwrap().is_some());
        assert!(f.municipalities.get_by_id(11).unwrap().is_some());
        assert_eq!(f.entrepreneurs.get_all().unwrap().len(), 3);
        assert!(f.associations.exists(1, 10).unwrap());
        assert!(f.associations.exists(2, 11).unwrap());
        assert!(f.associations.exists(3, 10).unwrap());
    }

    #[tokio::test]
    async fn create_with_unknown_parent_builds_bare_placeholder() {
        let f = fixture();
        f.gateway.on_create(Ok(entrepreneur(9, "Quinua Real", 5)));

        let request = NewEntrepreneur {
            business_name: "Quinua Real".to_string(),
            category: "gastronomía".to_string(),
            address: None,
            phone: None,
            email: None,
            website: None,
            description: None,
            products: None,
            services: None,
            municipality_id: 5,
        };
        let states = f.repository.create(request).collect().await;
        assert!(states.last().unwrap().is_success());

        let parent = f
            .municipalities
            .get_by_id(5)
            .unwrap()
            .expect("placeholder parent");
        assert_eq!(parent.name, "Municipalidad ID 5");
        assert!(f.entrepreneurs.get_by_id(9).unwrap().is_some());
        assert!(f.associations.exists(9, 5).unwrap());
    }

    #[tokio::test]
    async fn update_repoints_the_association_row() {
        let f = fixture();
        f.municipalities
            .seed(vec![municipality(3, "Capachica"), municipality(4, "Coata")]);
        f.entrepreneurs.seed(vec![entrepreneur(7, "Artesanías", 3)]);
        f.associations.seed(vec![(7, 3)]);
        f.gateway.on_update(Ok(entrepreneur(7, "Artesanías", 4)));

        let request = NewEntrepreneur {
            business_name: "Artesanías".to_string(),
            category: "artesanía".to_string(),
            address: None,
            phone: None,
            email: None,
            website: None,
            description: None,
            products: None,
            services: None,
            municipality_id: 4,
        };
        let states = f.repository.update(7, request).collect().await;
        assert!(states.last().unwrap().is_success());

        assert!(!f.associations.exists(7, 3).unwrap());
        assert!(f.associations.exists(7, 4).unwrap());
        assert_eq!(
            f.entrepreneurs.get_by_id(7).unwrap().unwrap().municipality_id,
            4
        );
    }

    #[tokio::test]
    async fn delete_removes_association_then_row() {
        let f = fixture();
        f.municipalities.seed(vec![municipality(3, "Capachica")]);
        f.entrepreneurs.seed(vec![entrepreneur(7, "Artesanías", 3)]);
        f.associations.seed(vec![(7, 3)]);
        f.gateway.on_delete(Ok(()));

        let states = f.repository.delete(7).collect().await;

        assert_eq!(states.last().unwrap().data(), Some(&true));
        assert!(f.entrepreneurs.get_by_id(7).unwrap().is_none());
        assert!(!f.associations.exists(7, 3).unwrap());
    }

    #[tokio::test]
    async fn write_failure_surfaces_even_though_reads_would_not() {
        let f = fixture();
        f.gateway.on_create(Err(ApiError::http(400, "bad request")));

        let request = NewEntrepreneur {
            business_name: "X".to_string(),
            category: "turismo".to_string(),
            address: None,
            phone: None,
            email: None,
            website: None,
            description: None,
            products: None,
            services: None,
            municipality_id: 1,
        };
        let states = f.repository.create(request).collect().await;

        assert_eq!(states.last().unwrap().error_message(), Some("Error: 400"));
        assert!(f.entrepreneurs.get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_cache_and_failed_list_yields_loading_then_error() {
        let f = fixture();
        f.gateway.on_by_category(Err(ApiError::NetworkUnavailable));

        let states = f.repository.get_by_category("turismo").collect().await;

        assert_eq!(states.len(), 2);
        assert!(states[0].is_loading());
        assert!(states[1].is_error());
    }
}
