use shared::error::{Classify, ErrorKind};
use store::errors::StoreError;

/// Failure of a single change handler.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("could not decode {image} image: {source}")]
    Image {
        image: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for HandlerError {
    fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Image { .. } => ErrorKind::MalformedInput,
            HandlerError::Store(e) => e.kind(),
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            HandlerError::Image { .. } => None,
            HandlerError::Store(e) => e.code(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RouterError {
    #[error("cannot recognize source ARN format: {0}")]
    MalformedSource(String),

    #[error("cannot decode change event record: {0}")]
    MalformedRecord(#[source] serde_json::Error),

    #[error("handler {handler} failed: {source}")]
    Handler {
        handler: &'static str,
        #[source]
        source: HandlerError,
    },
}

impl Classify for RouterError {
    fn kind(&self) -> ErrorKind {
        match self {
            RouterError::MalformedSource(_) | RouterError::MalformedRecord(_) => {
                ErrorKind::MalformedInput
            }
            RouterError::Handler { source, .. } => source.kind(),
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            RouterError::MalformedSource(_) => Some("malformed_source_arn"),
            RouterError::MalformedRecord(_) => Some("malformed_record"),
            RouterError::Handler { source, .. } => source.code(),
        }
    }
}
