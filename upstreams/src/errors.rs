use shared::error::{Classify, ErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("request to {service} failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned unexpected status {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("{service} could not find {id}")]
    NotFound { service: &'static str, id: String },
    #[error("{service} unavailable after {attempts} attempts")]
    RetriesExceeded { service: &'static str, attempts: u32 },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    pub fn not_found(service: &'static str, id: impl Into<String>) -> Self {
        UpstreamError::NotFound {
            service,
            id: id.into(),
        }
    }
}

impl Classify for UpstreamError {
    fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::NotFound { .. } => ErrorKind::NotFound,
            UpstreamError::InvalidUrl(_) => ErrorKind::Internal,
            UpstreamError::Request { .. }
            | UpstreamError::Status { .. }
            | UpstreamError::RetriesExceeded { .. } => ErrorKind::Upstream,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            UpstreamError::RetriesExceeded { .. } => Some("upstream_retries_exceeded"),
            _ => None,
        }
    }
}
