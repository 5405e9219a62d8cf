use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shared::error::{Classify, ErrorKind};
use store::errors::StoreError;
use upstreams::UpstreamError;

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    MalformedInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

impl Classify for ServiceError {
    fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound { .. } => ErrorKind::NotFound,
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::MalformedInput(_) => ErrorKind::MalformedInput,
            ServiceError::Store(e) => e.kind(),
            ServiceError::Upstream(e) => e.kind(),
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            ServiceError::Store(e) => e.code(),
            ServiceError::Upstream(e) => e.code(),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal || kind == ErrorKind::Upstream {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(ApiErrorResponse {
            code: self.code().unwrap_or(kind.as_str()).to_string(),
            message: self.to_string(),
        });
        (kind.status_code(), body).into_response()
    }
}
