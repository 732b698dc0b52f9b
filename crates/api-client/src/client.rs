//! HTTP client for the tourism directory REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Method, StatusCode};

use turismo_core::auth::{AuthGateway, AuthSession, Credentials, Registration};
use turismo_core::entrepreneur::{Entrepreneur, EntrepreneurGateway, NewEntrepreneur};
use turismo_core::errors::{ApiError, ApiResult};
use turismo_core::municipality::{Municipality, MunicipalityGateway, NewMunicipality};
use turismo_core::session::SessionStore;

use crate::types::{
    ApiErrorBody, AuthResponseDto, EmprendedorDto, EmprendedorRequestDto, LoginRequestDto,
    MunicipalidadDto, MunicipalidadRequestDto, RegisterRequestDto,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Environment variable holding the backend base URL.
pub const BASE_URL_ENV: &str = "TURISMO_API_URL";

/// Client for the tourism directory backend.
///
/// Implements the municipality, entrepreneur, and auth gateway ports. The
/// bearer token is read from the session store on every call; when none is
/// stored the request goes out unauthenticated and the server decides.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
}

fn classify_transport(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_connect() {
        ApiError::NetworkUnavailable
    } else {
        ApiError::Unknown(err.to_string())
    }
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<dyn SessionStore>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Build a client from `TURISMO_API_URL`, if set and non-empty.
    pub fn from_env(session: Arc<dyn SessionStore>) -> Option<Self> {
        std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|url| Self::new(&url, session))
    }

    fn log_response(status: StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    async fn bearer_token(&self) -> Option<String> {
        match self.session.auth_token().await {
            Ok(token) => token.filter(|token| !token.is_empty()),
            Err(err) => {
                warn!("could not read session token: {}", err);
                None
            }
        }
    }

    async fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, &url);
        match self.bearer_token().await {
            Some(token) => {
                debug!("attaching bearer token to request");
                builder.bearer_auth(token)
            }
            None => {
                debug!("no session token, sending request unauthenticated");
                builder
            }
        }
    }

    fn error_from_body(status: StatusCode, body: &str) -> ApiError {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.message)
            .unwrap_or_else(|| body.to_string());
        ApiError::http(status.as_u16(), message)
    }

    /// Parse a response that must carry one JSON object.
    async fn parse_object<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ApiResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::error_from_body(status, &body));
        }
        if body.trim().is_empty() {
            return Err(ApiError::EmptyResponse);
        }
        serde_json::from_str(&body).map_err(|e| {
            error!("failed to deserialize response body: {}", e);
            ApiError::Unknown(format!("failed to parse response: {}", e))
        })
    }

    /// Parse a response carrying a JSON array; an empty body is an empty
    /// list, not an error.
    async fn parse_list<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ApiResult<Vec<T>> {
        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::error_from_body(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).map_err(|e| {
            error!("failed to deserialize response body: {}", e);
            ApiError::Unknown(format!("failed to parse response: {}", e))
        })
    }

    /// Parse a response where any 2xx means success and the body is ignored.
    async fn parse_no_content(response: reqwest::Response) -> ApiResult<()> {
        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::error_from_body(status, &body));
        }
        Ok(())
    }
}

#[async_trait]
impl MunicipalityGateway for ApiClient {
    /// GET municipalidades
    async fn list(&self) -> ApiResult<Vec<Municipality>> {
        let response = self
            .request(Method::GET, "municipalidades")
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        let dtos: Vec<MunicipalidadDto> = Self::parse_list(response).await?;
        Ok(dtos.into_iter().map(Municipality::from).collect())
    }

    /// GET municipalidades/{id}
    async fn get(&self, id: i64) -> ApiResult<Municipality> {
        let response = self
            .request(Method::GET, &format!("municipalidades/{}", id))
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(Municipality::from(
            Self::parse_object::<MunicipalidadDto>(response).await?,
        ))
    }

    /// GET municipalidades/departamento/{departamento}
    async fn by_department(&self, department: &str) -> ApiResult<Vec<Municipality>> {
        let path = format!(
            "municipalidades/departamento/{}",
            urlencoding::encode(department)
        );
        let response = self
            .request(Method::GET, &path)
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        let dtos: Vec<MunicipalidadDto> = Self::parse_list(response).await?;
        Ok(dtos.into_iter().map(Municipality::from).collect())
    }

    /// GET municipalidades/mi-municipalidad
    async fn mine(&self) -> ApiResult<Municipality> {
        let response = self
            .request(Method::GET, "municipalidades/mi-municipalidad")
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(Municipality::from(
            Self::parse_object::<MunicipalidadDto>(response).await?,
        ))
    }

    /// POST municipalidades
    async fn create(&self, request: &NewMunicipality) -> ApiResult<Municipality> {
        let response = self
            .request(Method::POST, "municipalidades")
            .await
            .json(&MunicipalidadRequestDto::from(request))
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(Municipality::from(
            Self::parse_object::<MunicipalidadDto>(response).await?,
        ))
    }

    /// PUT municipalidades/{id}
    async fn update(&self, id: i64, request: &NewMunicipality) -> ApiResult<Municipality> {
        let response = self
            .request(Method::PUT, &format!("municipalidades/{}", id))
            .await
            .json(&MunicipalidadRequestDto::from(request))
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(Municipality::from(
            Self::parse_object::<MunicipalidadDto>(response).await?,
        ))
    }

    /// DELETE municipalidades/{id}
    async fn delete(&self, id: i64) -> ApiResult<()> {
        let response = self
            .request(Method::DELETE, &format!("municipalidades/{}", id))
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        Self::parse_no_content(response).await
    }
}

#[async_trait]
impl EntrepreneurGateway for ApiClient {
    /// GET emprendedores
    async fn list(&self) -> ApiResult<Vec<Entrepreneur>> {
        let response = self
            .request(Method::GET, "emprendedores")
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        let dtos: Vec<EmprendedorDto> = Self::parse_list(response).await?;
        Ok(dtos.into_iter().map(Entrepreneur::from).collect())
    }

    /// GET emprendedores/{id}
    async fn get(&self, id: i64) -> ApiResult<Entrepreneur> {
        let response = self
            .request(Method::GET, &format!("emprendedores/{}", id))
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(Entrepreneur::from(
            Self::parse_object::<EmprendedorDto>(response).await?,
        ))
    }

    /// GET emprendedores/municipalidad/{municipalidadId}
    async fn by_municipality(&self, municipality_id: i64) -> ApiResult<Vec<Entrepreneur>> {
        let path = format!("emprendedores/municipalidad/{}", municipality_id);
        let response = self
            .request(Method::GET, &path)
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        let dtos: Vec<EmprendedorDto> = Self::parse_list(response).await?;
        Ok(dtos.into_iter().map(Entrepreneur::from).collect())
    }

    /// GET emprendedores/rubro/{rubro}
    async fn by_category(&self, category: &str) -> ApiResult<Vec<Entrepreneur>> {
        let path = format!("emprendedores/rubro/{}", urlencoding::encode(category));
        let response = self
            .request(Method::GET, &path)
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        let dtos: Vec<EmprendedorDto> = Self::parse_list(response).await?;
        Ok(dtos.into_iter().map(Entrepreneur::from).collect())
    }

    /// GET emprendedores/mi-emprendedor
    async fn mine(&self) -> ApiResult<Entrepreneur> {
        let response = self
            .request(Method::GET, "emprendedores/mi-emprendedor")
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(Entrepreneur::from(
            Self::parse_object::<EmprendedorDto>(response).await?,
        ))
    }

    /// POST emprendedores
    async fn create(&self, request: &NewEntrepreneur) -> ApiResult<Entrepreneur> {
        let response = self
            .request(Method::POST, "emprendedores")
            .await
            .json(&EmprendedorRequestDto::from(request))
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(Entrepreneur::from(
            Self::parse_object::<EmprendedorDto>(response).await?,
        ))
    }

    /// PUT emprendedores/{id}
    async fn update(&self, id: i64, request: &NewEntrepreneur) -> ApiResult<Entrepreneur> {
        let response = self
            .request(Method::PUT, &format!("emprendedores/{}", id))
            .await
            .json(&EmprendedorRequestDto::from(request))
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(Entrepreneur::from(
            Self::parse_object::<EmprendedorDto>(response).await?,
        ))
    }

    /// DELETE emprendedores/{id}
    async fn delete(&self, id: i64) -> ApiResult<()> {
        let response = self
            .request(Method::DELETE, &format!("emprendedores/{}", id))
            .await
            .send()
            .await
            .map_err(classify_transport)?;
        Self::parse_no_content(response).await
    }
}

#[async_trait]
impl AuthGateway for ApiClient {
    /// POST auth/register
    async fn register(&self, request: &Registration) -> ApiResult<AuthSession> {
        let response = self
            .request(Method::POST, "auth/register")
            .await
            .json(&RegisterRequestDto::from(request))
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(AuthSession::from(
            Self::parse_object::<AuthResponseDto>(response).await?,
        ))
    }

    /// POST auth/login
    async fn login(&self, request: &Credentials) -> ApiResult<AuthSession> {
        let response = self
            .request(Method::POST, "auth/login")
            .await
            .json(&LoginRequestDto::from(request))
            .send()
            .await
            .map_err(classify_transport)?;
        Ok(AuthSession::from(
            Self::parse_object::<AuthResponseDto>(response).await?,
        ))
    }
}
