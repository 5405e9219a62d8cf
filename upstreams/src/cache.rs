// In-process cache in front of the user directory. Only found users are
// cached; misses always go to the directory.
use crate::UserDirectoryLookup;
use crate::config::UserCacheConfig;
use crate::errors::UpstreamError;
use crate::metrics_defs::{USER_CACHE_HIT, USER_CACHE_MISS};
use crate::types::DirectoryUser;
use async_trait::async_trait;
use moka::sync::Cache;
use shared::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct CachedUserDirectory {
    inner: Arc<dyn UserDirectoryLookup>,
    cache: Cache<String, DirectoryUser>,
}

impl CachedUserDirectory {
    pub fn new(inner: Arc<dyn UserDirectoryLookup>, config: &UserCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();

        CachedUserDirectory { inner, cache }
    }
}

#[async_trait]
impl UserDirectoryLookup for CachedUserDirectory {
    async fn get_users_by_usernames(
        &self,
        usernames: &[String],
    ) -> Result<HashMap<String, DirectoryUser>, UpstreamError> {
        let mut found = HashMap::with_capacity(usernames.len());
        let mut missing = Vec::new();
        for username in usernames {
            match self.cache.get(username) {
                Some(user) => {
                    found.insert(username.clone(), user);
                }
                None => missing.push(username.clone()),
            }
        }
        counter!(USER_CACHE_HIT).increment(found.len() as u64);
        counter!(USER_CACHE_MISS).increment(missing.len() as u64);

        if !missing.is_empty() {
            for (username, user) in self.inner.get_users_by_usernames(&missing).await? {
                self.cache.insert(username.clone(), user.clone());
                found.insert(username, user);
            }
        }
        Ok(found)
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<DirectoryUser, UpstreamError> {
        if let Some(user) = self.cache.get(username) {
            counter!(USER_CACHE_HIT).increment(1);
            return Ok(user);
        }
        counter!(USER_CACHE_MISS).increment(1);
        let user = self.inner.get_user_by_username(username).await?;
        self.cache.insert(username.to_string(), user.clone());
        Ok(user)
    }
}
