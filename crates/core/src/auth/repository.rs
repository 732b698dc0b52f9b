//! Authentication repository.
//!
//! Login and registration have no cached fallback: `Loading` then one
//! terminal state. On success the token and profile are persisted to the
//! session store *before* the `Success` emission, so a subscriber observing
//! success can rely on signed requests from that point on.

use std::sync::Arc;

use log::{debug, error};

use crate::errors::ApiError;
use crate::session::{SessionProfile, SessionStore};
use crate::state::{ResourceEmitter, ResourceState, ResourceStream};

use super::{AuthGateway, AuthSession, Credentials, Registration};

pub struct AuthRepository {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn AuthGateway>,
    session: Arc<dyn SessionStore>,
}

fn login_error_message(err: &ApiError) -> String {
    match err {
        ApiError::HttpClient { code: 401, .. } => "Credenciales incorrectas".to_string(),
        ApiError::HttpClient { code: 404, .. } => "Usuario no encontrado".to_string(),
        ApiError::HttpClient { code, .. } | ApiError::HttpServer { code, .. } => {
            format!("Error de autenticación: {}", code)
        }
        other => other.user_message(),
    }
}

fn register_error_message(err: &ApiError) -> String {
    match err {
        ApiError::HttpClient { code: 400, .. } => "Datos de registro inválidos".to_string(),
        ApiError::HttpClient { code: 409, .. } => {
            "El nombre de usuario o email ya está en uso".to_string()
        }
        ApiError::HttpClient { code, .. } | ApiError::HttpServer { code, .. } => {
            format!("Error en el registro: {}", code)
        }
        other => other.user_message(),
    }
}

impl AuthRepository {
    pub fn new(gateway: Arc<dyn AuthGateway>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            inner: Arc::new(Inner { gateway, session }),
        }
    }

    pub fn login(&self, credentials: Credentials) -> ResourceStream<AuthSession> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner
                .run(tx, AuthCall::Login(credentials))
                .await;
        });
        stream
    }

    pub fn register(&self, registration: Registration) -> ResourceStream<AuthSession> {
        let inner = Arc::clone(&self.inner);
        let (tx, stream) = ResourceStream::channel();
        tokio::spawn(async move {
            inner
                .run(tx, AuthCall::Register(registration))
                .await;
        });
        stream
    }

    pub async fn logout(&self) -> crate::errors::Result<()> {
        self.inner.session.clear().await
    }

    /// A stored token is taken as an active session.
    pub async fn is_logged_in(&self) -> bool {
        matches!(self.inner.session.auth_token().await, Ok(Some(token)) if !token.is_empty())
    }
}

enum AuthCall {
    Login(Credentials),
    Register(Registration),
}

impl Inner {
    async fn run(&self, tx: ResourceEmitter<AuthSession>, call: AuthCall) {
        if !tx.emit(ResourceState::Loading).await {
            return;
        }

        let result = match &call {
            AuthCall::Login(credentials) => self.gateway.login(credentials).await,
            AuthCall::Register(registration) => self.gateway.register(registration).await,
        };
        match result {
            Ok(session) => {
                debug!("authenticated as {} (user {})", session.username, session.id);
                let saved = self
                    .session
                    .save_profile(&SessionProfile {
                        token: session.token.clone(),
                        user_id: session.id,
                        username: session.username.clone(),
                        roles: session.roles.clone(),
                    })
                    .await;
                if let Err(err) = saved {
                    error!("failed persisting session: {}", err);
                    tx.emit(ResourceState::Error(format!(
                        "Error en la solicitud: {}",
                        err
                    )))
                    .await;
                    return;
                }
                tx.emit(ResourceState::Success(session)).await;
            }
            Err(err) => {
                let message = match call {
                    AuthCall::Login(_) => login_error_message(&err),
                    AuthCall::Register(_) => register_error_message(&err),
                };
                tx.emit(ResourceState::Error(message)).await;
            }
        }
    }
}
