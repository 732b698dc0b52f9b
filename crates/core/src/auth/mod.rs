//! Authentication: models, gateway port, repository.

mod model;
mod repository;

pub use model::{AuthSession, Credentials, Registration};
pub use repository::AuthRepository;

use async_trait::async_trait;

use crate::errors::ApiResult;

/// Remote gateway port for the auth endpoints.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn register(&self, request: &Registration) -> ApiResult<AuthSession>;
    async fn login(&self, request: &Credentials) -> ApiResult<AuthSession>;
}
