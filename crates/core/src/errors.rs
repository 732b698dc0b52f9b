//! Error types shared across the data layer.

use thiserror::Error;

/// Result type alias for data-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for remote gateway calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failures raised by the remote gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// DNS resolution or TCP connect failure.
    #[error("network unavailable")]
    NetworkUnavailable,

    /// The request exceeded the client timeout.
    #[error("request timed out")]
    Timeout,

    /// 4xx response from the backend.
    #[error("HTTP client error ({code}): {message}")]
    HttpClient { code: u16, message: String },

    /// 5xx response from the backend.
    #[error("HTTP server error ({code}): {message}")]
    HttpServer { code: u16, message: String },

    /// 2xx response with no body where one object was required.
    #[error("empty response body")]
    EmptyResponse,

    /// Anything else (malformed body, unexpected status class, ...).
    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Create an HTTP error from a status code, picking the variant by range.
    pub fn http(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            400..=499 => Self::HttpClient { code, message },
            500..=599 => Self::HttpServer { code, message },
            _ => Self::Unknown(format!("HTTP {}: {}", code, message)),
        }
    }

    /// HTTP status if this is an HTTP-level error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpClient { code, .. } | Self::HttpServer { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Message shown to the user when this error surfaces in the UI.
    ///
    /// Wording matches the Spanish strings of the product; screens render it
    /// verbatim next to a retry action.
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnavailable => {
                "No se pudo conectar al servidor. Verifica tu conexión a internet.".to_string()
            }
            Self::Timeout => {
                "La conexión al servidor ha excedido el tiempo de espera.".to_string()
            }
            Self::HttpClient { code, .. } | Self::HttpServer { code, .. } => {
                format!("Error: {}", code)
            }
            Self::EmptyResponse => "Respuesta vacía del servidor".to_string(),
            Self::Unknown(message) => format!("Error en la solicitud: {}", message),
        }
    }
}

/// Failures raised by the local store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A write referenced a parent row that does not exist.
    ///
    /// The reconciling repositories pre-create placeholder parents, so this
    /// indicates a repair-ordering bug and is treated as fatal, never retried.
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    /// Any other storage failure (pool, SQL, migration).
    #[error("storage error: {0}")]
    Internal(String),
}

/// Top-level error for the data layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("session error: {0}")]
    Session(String),
}
