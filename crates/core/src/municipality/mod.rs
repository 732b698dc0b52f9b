//! Municipality domain: models, ports, reconciling repository.

mod model;
mod repository;

pub use model::{Municipality, MunicipalitySummary, NewMunicipality};
pub use repository::MunicipalityRepository;

use async_trait::async_trait;

use crate::errors::{ApiResult, StoreError};

/// Local store port for municipality rows.
///
/// Reads are consistent snapshots; writes have REPLACE semantics (a new row
/// with an existing id fully overwrites the old one) and each call is one
/// atomic batch with respect to concurrent readers.
#[async_trait]
pub trait MunicipalityStoreTrait: Send + Sync {
    fn get_all(&self) -> Result<Vec<Municipality>, StoreError>;
    fn get_by_id(&self, id: i64) -> Result<Option<Municipality>, StoreError>;
    fn get_by_department(&self, department: &str) -> Result<Vec<Municipality>, StoreError>;

    async fn upsert(&self, municipality: Municipality) -> Result<(), StoreError>;
    async fn upsert_many(&self, municipalities: Vec<Municipality>) -> Result<(), StoreError>;
    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError>;

    /// Convenience for callers holding the full record.
    async fn delete(&self, municipality: &Municipality) -> Result<(), StoreError> {
        self.delete_by_id(municipality.id).await
    }
}

/// Remote gateway port for municipality endpoints.
#[async_trait]
pub trait MunicipalityGateway: Send + Sync {
    async fn list(&self) -> ApiResult<Vec<Municipality>>;
    async fn get(&self, id: i64) -> ApiResult<Municipality>;
    async fn by_department(&self, department: &str) -> ApiResult<Vec<Municipality>>;
    /// The authenticated user's own municipality.
    async fn mine(&self) -> ApiResult<Municipality>;
    async fn create(&self, request: &NewMunicipality) -> ApiResult<Municipality>;
    async fn update(&self, id: i64, request: &NewMunicipality) -> ApiResult<Municipality>;
    async fn delete(&self, id: i64) -> ApiResult<()>;
}
