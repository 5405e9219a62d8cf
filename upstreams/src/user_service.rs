use crate::UserDirectoryLookup;
use crate::config::ServiceConfig;
use crate::errors::UpstreamError;
use crate::service_client::ServiceClient;
use crate::types::DirectoryUser;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
struct SearchResponse {
    data: Vec<UserRecord>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
struct UserRecord {
    #[serde(rename = "ID")]
    id: String,
    username: String,
    name: String,
    emails: Vec<EmailRecord>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase", default)]
struct EmailRecord {
    email_address: String,
    is_primary: bool,
}

impl From<UserRecord> for DirectoryUser {
    fn from(record: UserRecord) -> Self {
        let primary_email = record
            .emails
            .iter()
            .find(|e| e.is_primary)
            .or_else(|| record.emails.first())
            .map(|e| e.email_address.clone());
        DirectoryUser {
            username: record.username,
            display_name: record.name,
            primary_email,
            external_id: record.id,
        }
    }
}

/// Looks users up in the external user directory by username.
pub struct UserServiceClient {
    http: ServiceClient,
}

impl UserServiceClient {
    pub fn new(
        config: &ServiceConfig,
        bearer_token: Option<String>,
    ) -> Result<Self, UpstreamError> {
        Ok(UserServiceClient {
            http: ServiceClient::new("user-service", config, bearer_token)?,
        })
    }

    async fn search(&self, usernames: &[String]) -> Result<Vec<DirectoryUser>, UpstreamError> {
        let url = self.http.url(&["users", "search"])?;
        let query = usernames.join(",");
        let response = self
            .http
            .send(&query, |client| {
                client.get(url.clone()).query(&[("username", query.as_str())])
            })
            .await?;
        let body: SearchResponse = self.http.json(response).await?;
        Ok(body.data.into_iter().map(DirectoryUser::from).collect())
    }
}

#[async_trait]
impl UserDirectoryLookup for UserServiceClient {
    async fn get_users_by_usernames(
        &self,
        usernames: &[String],
    ) -> Result<HashMap<String, DirectoryUser>, UpstreamError> {
        if usernames.is_empty() {
            return Ok(HashMap::new());
        }
        let users = self.search(usernames).await?;
        Ok(users
            .into_iter()
            .map(|user| (user.username.clone(), user))
            .collect())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<DirectoryUser, UpstreamError> {
        self.search(&[username.to_string()])
            .await?
            .into_iter()
            .find(|user| user.username == username)
            .ok_or_else(|| UpstreamError::not_found(self.http.service(), username))
    }
}
