use crate::kv::{Item, KvError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::error::{Classify, ErrorKind};

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Kv(#[from] KvError),

    #[error("could not decode {entity}: {source}")]
    Decode {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode {entity}: {reason}")]
    Encode { entity: &'static str, reason: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Kv(e) => e.kind(),
            StoreError::Decode { .. } | StoreError::Encode { .. } => ErrorKind::Internal,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            StoreError::Kv(e) => e.code(),
            _ => None,
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(entity: &'static str, item: Item) -> Result<T> {
    serde_json::from_value(Value::Object(item))
        .map_err(|source| StoreError::Decode { entity, source })
}

pub(crate) fn decode_all<T: DeserializeOwned>(
    entity: &'static str,
    items: Vec<Item>,
) -> Result<Vec<T>> {
    items.into_iter().map(|item| decode(entity, item)).collect()
}

pub(crate) fn encode<T: Serialize>(entity: &'static str, value: &T) -> Result<Item> {
    match serde_json::to_value(value) {
        Ok(Value::Object(item)) => Ok(item),
        Ok(other) => Err(StoreError::Encode {
            entity,
            reason: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(StoreError::Encode {
            entity,
            reason: e.to_string(),
        }),
    }
}
