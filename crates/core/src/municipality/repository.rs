//! Reconciling repository for municipalities.
//!
//! Read operations follow the cache-then-network arc: emit `Loading`, emit a
//! `Success` built from the local store when it has matching rows, then fetch
//! from the backend, persist, and emit the fresh `Success`. A failed fetch is
//! suppressed whenever a cached emission already went out; with an empty
//! cache it surfaces as `Error`. Write operations go to the backend first and
//! touch the local store only on success.

use std::sync::Arc;

use log::{debug, error, warn};

use crate::entrepreneur::AssociationStoreTrait;
use crate::errors::{ApiError, StoreError};
use crate::state::{ResourceEmitter, ResourceState, ResourceStream};

use super::{Municipality, MunicipalityGateway, MunicipalityStoreTrait, NewMunicipality};

pub struct MunicipalityRepository {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn MunicipalityStoreTrait>,
    associations: Arc<dyn AssociationStoreTrait>,
    gateway: Arc<dyn MunicipalityGateway>,
}

impl MunicipalityRepository {
    pub fn new(
        store: Arc<dyn MunicipalityStoreTrait>,
        associations: Arc<dyn AssociationStoreTrait>,
        gateway: Arc<dyn MunicipalityGateway>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                associations,
                gateway,
            }),
        }
    }

    /// All municipalities, cache first.
    pub fn get_all(&self) -> ResourceStream<Vec<Municipality>> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_list(tx, None).await;
        });
        stream
    }

    /// Municipalities of one department, cache first.
    pub fn get_by_department(&self, department: &str) -> ResourceStream<Vec<Municipality>> {
        let inner = Arc::clone(&self.inner);
        let department = department.to_string();
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_list(tx, Some(department)).await;
        });
        stream
    }

    /// One municipality by id, cache first.
    pub fn get_by_id(&self, id: i64) -> ResourceStream<Municipality> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_get_by_id(tx, id).await;
        });
        stream
    }

    /// The authenticated user's municipality. There is no locally-known id to
    /// read from the cache, so this is network-only; errors always surface.
    pub fn get_mine(&self) -> ResourceStream<Municipality> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_get_mine(tx).await;
        });
        stream
    }

    pub fn create(&self, request: NewMunicipality) -> ResourceStream<Municipality> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner.run_save(tx, None, request).await;
        });
        stream
    }

    pub fn update(&self, id: i64, request: NewMunicipality) -> ResourceStream<Municipality> {
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

impl Inner {
    /// Attach the entrepreneur summaries derived from the association table.
    fn join_entrepreneurs(&self, mut row: Municipality) -> Result<Municipality, StoreError> {
        row.entrepreneurs = self.associations.summaries_for_municipality(row.id)?;
        Ok(row)
    }

    fn load_cached_list(
        &self,
        department: Option<&str>,
    ) -> Result<Vec<Municipality>, StoreError> {
        let rows = match department {
            Some(department) => self.store.get_by_department(department)?,
            None => self.store.get_all()?,
        };
        rows.into_iter()
            .map(|row| self.join_entrepreneurs(row))
            .collect()
    }

    async fn run_list(
        &self,
        tx: ResourceEmitter<Vec<Municipality>>,
        department: Option<String>,
    ) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        let cached = match self.load_cached_list(department.as_deref()) {
            Ok(rows) => rows,
            Err(err) => {
                error!("municipality cache read failed: {}", err);
                tx.emit(ResourceState::Error(err.to_string())).await;
                return;
            }
        };
        let have_cache = !cached.is_empty();
        if have_cache {
            debug!("emitting {} municipalities from local cache", cached.len());
            if !tx.emit(ResourceState::Success(cached)).await {
                return;
            }
        }

        let fetched = match &department {
            Some(department) => self.gateway.by_department(department).await,
            None => self.gateway.list().await,
        };
        match fetched {
            Ok(remote) => {
                debug!("fetched {} municipalities from server", remote.len());
                if let Err(err) = self.store.upsert_many(remote.clone()).await {
                    self.emit_store_error(&tx, err).await;
                    return;
                }
                tx.emit(ResourceState::Success(remote)).await;
            }
            Err(err) => self.handle_fetch_error(&tx, err, have_cache).await,
        }
    }

    async fn run_get_by_id(&self, tx: ResourceEmitter<Municipality>, id: i64) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        let cached = match self
            .store
            .get_by_id(id)
            .and_then(|row| row.map(|row| self.join_entrepreneurs(row)).transpose())
        {
            Ok(row) => row,
            Err(err) => {
                error!("municipality cache read failed: {}", err);
                tx.emit(ResourceState::Error(err.to_string())).await;
                return;
            }
        };
        let have_cache = cached.is_some();
        if let Some(row) = cached {
            debug!("emitting municipality {} from local cache", id);
            if !tx.emit(ResourceState::Success(row)).await {
                return;
            }
        }

        match self.gateway.get(id).await {
            Ok(remote) => {
                if let Err(err) = self.store.upsert(remote.clone()).await {
                    self.emit_store_error(&tx, err).await;
                    return;
                }
                tx.emit(ResourceState::Success(remote)).await;
            }
            Err(err) => self.handle_fetch_error(&tx, err, have_cache).await,
        }
    }

    async fn run_get_mine(&self, tx: ResourceEmitter<Municipality>) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        match self.gateway.mine().await {
            Ok(remote) => {
                debug!("fetched own municipality {} from server", remote.id);
                if let Err(err) = self.store.upsert(remote.clone()).await {
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
        tx: ResourceEmitter<Municipality>,
        id: Option<i64>,
        request: NewMunicipality,
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
                debug!("saved municipality {} on server", remote.id);
                if let Err(err) = self.store.upsert(remote.clone()).await {
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
                debug!("deleted municipality {} on server", id);
                // Association rows first, then the parent row. The store also
                // cascades entrepreneurs referencing the municipality.
                let removed = async {
                    self.associations.delete_by_municipality(id).await?;
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

    async fn handle_fetch_error<T>(
        &self,
        tx: &ResourceEmitter<T>,
        err: ApiError,
        have_cache: bool,
    ) {
        if have_cache {
            // Stale data beats no data; the cached emission stands.
            warn!("municipality fetch failed, serving cache only: {}", err);
        } else {
            tx.emit(ResourceState::Error(err.user_message())).await;
        }
    }

    async fn emit_store_error<T>(&self, tx: &ResourceEmitter<T>, err: StoreError) {
        match &err {
            StoreError::ReferentialIntegrity(detail) => {
                // Should be unreachable: parent repair runs before child
                // writes. Surfacing it loudly beats silently retrying.
                error!("referential integrity violation in municipality write: {}", detail);
            }
            StoreError::Internal(detail) => {
                error!("municipality write failed: {}", detail);
            }
        }
        tx.emit(ResourceState::Error(err.to_string())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ApiError;
    use crate::testutil::{
        municipality, summaries_of, MemoryAssociationStore, MemoryEntrepreneurStore,
        MemoryMunicipalityStore, StubMunicipalityGateway,
    };

    fn repository(
        store: &Arc<MemoryMunicipalityStore>,
        associations: &Arc<MemoryAssociationStore>,
        gateway: &Arc<StubMunicipalityGateway>,
    ) -> MunicipalityRepository {
        MunicipalityRepository::new(
            Arc::clone(store) as Arc<dyn MunicipalityStoreTrait>,
            Arc::clone(associations) as Arc<dyn AssociationStoreTrait>,
            Arc::clone(gateway) as Arc<dyn MunicipalityGateway>,
        )
    }

    fn fresh_stores() -> (
        Arc<MemoryMunicipalityStore>,
        Arc<MemoryEntrepreneurStore>,
        Arc<MemoryAssociationStore>,
    ) {
        let municipalities = Arc::new(MemoryMunicipalityStore::new());
        let entrepreneurs = Arc::new(MemoryEntrepreneurStore::new(Arc::clone(&municipalities)));
        let associations = Arc::new(MemoryAssociationStore::new(Arc::clone(&entrepreneurs)));
        (municipalities, entrepreneurs, associations)
    }

    #[tokio::test]
    async fn list_with_cache_emits_loading_cached_then_remote() {
        let (store, _entrepreneurs, associations) = fresh_stores();
        store.seed(vec![municipality(1, "Capachica")]);
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_list(Ok(vec![municipality(1, "Capachica"), municipality(2, "Puno")]));

        let states = repository(&store, &associations, &gateway)
            .get_all()
            .collect()
            .await;

        assert_eq!(states.len(), 3);
        assert!(states[0].is_loading());
        assert_eq!(states[1].data().map(Vec::len), Some(1));
        assert_eq!(states[2].data().map(Vec::len), Some(2));
        // The remote batch is persisted before the final emission.
        assert_eq!(store.get_all().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_failure_with_cache_is_suppressed() {
        let (store, _entrepreneurs, associations) = fresh_stores();
        store.seed(vec![municipality(1, "Capachica")]);
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_list(Err(ApiError::NetworkUnavailable));

        let states = repository(&store, &associations, &gateway)
            .get_all()
            .collect()
            .await;

        assert_eq!(states.len(), 2);
        assert!(states[0].is_loading());
        assert!(states[1].is_success());
    }

    #[tokio::test]
    async fn list_failure_without_cache_surfaces_error() {
        let (store, _entrepreneurs, associations) = fresh_stores();
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_list(Err(ApiError::Timeout));

        let states = repository(&store, &associations, &gateway)
            .get_all()
            .collect()
            .await;

        assert_eq!(states.len(), 2);
        assert!(states[0].is_loading());
        assert_eq!(
            states[1].error_message(),
            Some("La conexión al servidor ha excedido el tiempo de espera.")
        );
    }

    #[tokio::test]
    async fn department_filter_follows_the_same_arc() {
        let (store, _entrepreneurs, associations) = fresh_stores();
        store.seed(vec![municipality(1, "Capachica")]);
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_by_department(Ok(vec![
            municipality(1, "Capachica"),
            municipality(2, "Puno"),
        ]));

        let states = repository(&store, &associations, &gateway)
            .get_by_department("Puno")
            .collect()
            .await;

        assert_eq!(states.len(), 3);
        assert!(states[0].is_loading());
        assert_eq!(states[1].data().map(Vec::len), Some(1));
        assert_eq!(states[2].data().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn get_by_id_empty_body_is_noop_when_cached() {
        let (store, _entrepreneurs, associations) = fresh_stores();
        store.seed(vec![municipality(7, "Juli")]);
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_get(Err(ApiError::EmptyResponse));

        let states = repository(&store, &associations, &gateway)
            .get_by_id(7)
            .collect()
            .await;

        assert_eq!(states.len(), 2);
        assert!(states[1].is_success());
    }

    #[tokio::test]
    async fn get_by_id_empty_body_without_cache_errors() {
        let (store, _entrepreneurs, associations) = fresh_stores();
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_get(Err(ApiError::EmptyResponse));

        let states = repository(&store, &associations, &gateway)
            .get_by_id(7)
            .collect()
            .await;

        assert_eq!(states.len(), 2);
        assert_eq!(
            states[1].error_message(),
            Some("Respuesta vacía del servidor")
        );
    }

    #[tokio::test]
    async fn cached_detail_joins_entrepreneur_summaries() {
        let (store, entrepreneurs, associations) = fresh_stores();
        store.seed(vec![municipality(3, "Lampa")]);
        entrepreneurs.seed(vec![crate::testutil::entrepreneur(9, "Quesos Andinos", 3)]);
        associations.seed(vec![(9, 3)]);
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_get(Err(ApiError::NetworkUnavailable));

        let states = repository(&store, &associations, &gateway)
            .get_by_id(3)
            .collect()
            .await;

        let cached = states[1].data().expect("cached success");
        assert_eq!(summaries_of(cached), vec![(9, "Quesos Andinos".to_string())]);
    }

    #[tokio::test]
    async fn delete_removes_associations_then_row() {
        let (store, entrepreneurs, associations) = fresh_stores();
        store.seed(vec![municipality(3, "Lampa")]);
        entrepreneurs.seed(vec![crate::testutil::entrepreneur(9, "Quesos Andinos", 3)]);
        associations.seed(vec![(9, 3)]);
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_delete(Ok(()));

        let states = repository(&store, &associations, &gateway)
            .delete(3)
            .collect()
            .await;

        assert_eq!(states.last().unwrap().data(), Some(&true));
        assert!(store.get_by_id(3).unwrap().is_none());
        assert!(associations
            .summaries_for_municipality(3)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn delete_failure_never_touches_the_store() {
        let (store, _entrepreneurs, associations) = fresh_stores();
        store.seed(vec![municipality(3, "Lampa")]);
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_delete(Err(ApiError::http(403, "forbidden")));

        let states = repository(&store, &associations, &gateway)
            .delete(3)
            .collect()
            .await;

        assert_eq!(states.last().unwrap().error_message(), Some("Error: 403"));
        assert!(store.get_by_id(3).unwrap().is_some());
    }

    #[tokio::test]
    async fn create_writes_through_on_success() {
        let (store, _entrepreneurs, associations) = fresh_stores();
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_create(Ok(municipality(11, "Ilave")));

        let request = NewMunicipality {
            name: "Ilave".to_string(),
            department: "Puno".to_string(),
            province: "El Collao".to_string(),
            district: "Ilave".to_string(),
            address: None,
            phone: None,
            website: None,
            description: None,
        };
        let states = repository(&store, &associations, &gateway)
            .create(request)
            .collect()
            .await;

        assert!(states.last().unwrap().is_success());
        assert!(store.get_by_id(11).unwrap().is_some());
    }

    #[tokio::test]
    async fn mine_is_network_only_and_errors_surface() {
        let (store, _entrepreneurs, associations) = fresh_stores();
        store.seed(vec![municipality(1, "Capachica")]);
        let gateway = Arc::new(StubMunicipalityGateway::new());
        gateway.on_mine(Err(ApiError::NetworkUnavailable));

        let states = repository(&store, &associations, &gateway)
            .get_mine()
            .collect()
            .await;

        // No cached emission even though the cache is non-empty.
        assert_eq!(states.len(), 2);
        assert!(states[1].is_error());
    }
}
