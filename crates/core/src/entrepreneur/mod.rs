//! Entrepreneur domain: models, ports, reconciling repository.

mod model;
mod repository;

pub use model::{Entrepreneur, EntrepreneurSummary, NewEntrepreneur};
pub use repository::EntrepreneurRepository;

use async_trait::async_trait;

use crate::errors::{ApiResult, StoreError};

/// Local store port for entrepreneur rows.
///
/// Same snapshot-read / REPLACE-write contract as the municipality store.
/// Writing a row whose `municipality_id` has no matching municipality fails
/// with [`StoreError::ReferentialIntegrity`]; callers pre-create placeholder
/// parents so this never fires in correct operation.
#[async_trait]
pub trait EntrepreneurStoreTrait: Send + Sync {
    fn get_all(&self) -> Result<Vec<Entrepreneur>, StoreError>;
    fn get_by_id(&self, id: i64) -> Result<Option<Entrepreneur>, StoreError>;
    fn get_by_municipality(&self, municipality_id: i64) -> Result<Vec<Entrepreneur>, StoreError>;
    fn get_by_category(&self, category: &str) -> Result<Vec<Entrepreneur>, StoreError>;

    async fn upsert(&self, entrepreneur: Entrepreneur) -> Result<(), StoreError>;
    async fn upsert_many(&self, entrepreneurs: Vec<Entrepreneur>) -> Result<(), StoreError>;
    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError>;

    /// Convenience for callers holding the full record.
    async fn delete(&self, entrepreneur: &Entrepreneur) -> Result<(), StoreError> {
        self.delete_by_id(entrepreneur.id).await
    }
}

/// Local store port for the entrepreneur–municipality association table.
#[async_trait]
pub trait AssociationStoreTrait: Send + Sync {
    async fn insert(&self, entrepreneur_id: i64, municipality_id: i64) -> Result<(), StoreError>;
    async fn insert_many(&self, pairs: Vec<(i64, i64)>) -> Result<(), StoreError>;

    /// Replace the municipality's association rows with exactly the given
    /// entrepreneur ids (delete-then-insert in one batch, not a merge).
    async fn replace_for_municipality(
        &self,
        municipality_id: i64,
        entrepreneur_ids: Vec<i64>,
    ) -> Result<(), StoreError>;

    async fn delete_by_entrepreneur(&self, entrepreneur_id: i64) -> Result<(), StoreError>;
    async fn delete_by_municipality(&self, municipality_id: i64) -> Result<(), StoreError>;

    fn exists(&self, entrepreneur_id: i64, municipality_id: i64) -> Result<bool, StoreError>;

    /// Join: summaries of the entrepreneurs associated with a municipality.
    /// Row order is insertion-undefined and must not be relied upon.
    fn summaries_for_municipality(
        &self,
        municipality_id: i64,
    ) -> Result<Vec<EntrepreneurSummary>, StoreError>;
}

/// Remote gateway port for entrepreneur endpoints.
#[async_trait]
pub trait EntrepreneurGateway: Send + Sync {
    async fn list(&self) -> ApiResult<Vec<Entrepreneur>>;
    async fn get(&self, id: i64) -> ApiResult<Entrepreneur>;
    async fn by_municipality(&self, municipality_id: i64) -> ApiResult<Vec<Entrepreneur>>;
    async fn by_category(&self, category: &str) -> ApiResult<Vec<Entrepreneur>>;
    /// The authenticated user's own business.
    async fn mine(&self) -> ApiResult<Entrepreneur>;
    async fn create(&self, request: &NewEntrepreneur) -> ApiResult<Entrepreneur>;
    async fn update(&self, id: i64, request: &NewEntrepreneur) -> ApiResult<Entrepreneur>;
    async fn delete(&self, id: i64) -> ApiResult<()>;
}
