use crate::ProjectHierarchyLookup;
use crate::config::ServiceConfig;
use crate::errors::UpstreamError;
use crate::service_client::ServiceClient;
use crate::types::ProjectDetails;
use async_trait::async_trait;

/// Reads project nodes from the external project service.
pub struct ProjectServiceClient {
    http: ServiceClient,
}

impl ProjectServiceClient {
    pub fn new(
        config: &ServiceConfig,
        bearer_token: Option<String>,
    ) -> Result<Self, UpstreamError> {
        Ok(ProjectServiceClient {
            http: ServiceClient::new("project-service", config, bearer_token)?,
        })
    }
}

#[async_trait]
impl ProjectHierarchyLookup for ProjectServiceClient {
    async fn get_project(&self, project_sfid: &str) -> Result<ProjectDetails, UpstreamError> {
        let url = self.http.url(&["projects", project_sfid])?;
        let response = self
            .http
            .send(project_sfid, |client| client.get(url.clone()))
            .await?;
        self.http.json(response).await
    }
}
