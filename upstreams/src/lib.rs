//! Clients for the external services the metrics engine consults: the project
//! hierarchy, the user directory, and the organization registry.
//!
//! Callers depend on the lookup traits; the HTTP clients and the user cache
//! are the production implementations.

pub mod cache;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod organization_service;
pub mod project_service;
pub mod service_client;
pub mod types;
pub mod user_service;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use cache::CachedUserDirectory;
pub use config::Config;
pub use errors::UpstreamError;
pub use organization_service::OrganizationServiceClient;
pub use project_service::ProjectServiceClient;
pub use types::{DirectoryUser, Organization, ProjectDetails, ProjectSummary, ProjectType};
pub use user_service::UserServiceClient;

#[async_trait]
pub trait ProjectHierarchyLookup: Send + Sync {
    /// The project node with its direct children.
    async fn get_project(&self, project_sfid: &str) -> Result<ProjectDetails, UpstreamError>;
}

#[async_trait]
pub trait UserDirectoryLookup: Send + Sync {
    /// Users found for the given usernames, keyed by username. Unknown
    /// usernames are absent from the map.
    async fn get_users_by_usernames(
        &self,
        usernames: &[String],
    ) -> Result<HashMap<String, DirectoryUser>, UpstreamError>;

    async fn get_user_by_username(&self, username: &str) -> Result<DirectoryUser, UpstreamError>;
}

#[async_trait]
pub trait OrganizationLookup: Send + Sync {
    async fn create_organization(
        &self,
        name: &str,
        website: &str,
    ) -> Result<Organization, UpstreamError>;
}

/// The production lookups, built from config.
#[derive(Clone)]
pub struct Upstreams {
    pub projects: Arc<dyn ProjectHierarchyLookup>,
    pub users: Arc<dyn UserDirectoryLookup>,
    pub organizations: Arc<dyn OrganizationLookup>,
}

impl Upstreams {
    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        let token = config.bearer_token.clone();
        let users = Arc::new(UserServiceClient::new(&config.user_service, token.clone())?);
        Ok(Upstreams {
            projects: Arc::new(ProjectServiceClient::new(
                &config.project_service,
                token.clone(),
            )?),
            users: Arc::new(CachedUserDirectory::new(users, &config.user_cache)),
            organizations: Arc::new(OrganizationServiceClient::new(
                &config.organization_service,
                token,
            )?),
        })
    }
}
