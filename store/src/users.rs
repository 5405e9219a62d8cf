use crate::errors::{Result, StoreError, decode, encode};
use crate::kv::{Key, KeyValueStore, PutCondition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const KEY_ATTRIBUTE: &str = "user_id";

/// Internal user record referenced by individual and employee signatures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub user_id: String,
    #[serde(rename = "user_name")]
    pub username: String,
    pub lf_username: String,
    pub user_github_id: String,
    pub lf_email: String,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<User>;

    async fn put_user(&self, user: &User) -> Result<()>;
}

pub struct KvUserRepository {
    kv: Arc<dyn KeyValueStore>,
    table: String,
}

impl KvUserRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        KvUserRepository {
            kv,
            table: table.into(),
        }
    }
}

#[async_trait]
impl UserRepository for KvUserRepository {
    async fn get_user(&self, user_id: &str) -> Result<User> {
        let key = Key::new(KEY_ATTRIBUTE, user_id);
        match self.kv.get_item(&self.table, &key).await? {
            Some(item) => decode("user", item),
            None => Err(StoreError::not_found("user", user_id)),
        }
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        let item = encode("user", user)?;
        self.kv
            .put_item(&self.table, item, PutCondition::Always)
            .await?;
        Ok(())
    }
}
