use crate::OrganizationLookup;
use crate::config::ServiceConfig;
use crate::errors::UpstreamError;
use crate::service_client::ServiceClient;
use crate::types::Organization;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateOrganizationRequest<'a> {
    name: &'a str,
    website: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct OrganizationRecord {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    #[serde(rename = "LogoURL")]
    logo_url: String,
}

pub struct OrganizationServiceClient {
    http: ServiceClient,
}

impl OrganizationServiceClient {
    pub fn new(
        config: &ServiceConfig,
        bearer_token: Option<String>,
    ) -> Result<Self, UpstreamError> {
        Ok(OrganizationServiceClient {
            http: ServiceClient::new("organization-service", config, bearer_token)?,
        })
    }
}

#[async_trait]
impl OrganizationLookup for OrganizationServiceClient {
    async fn create_organization(
        &self,
        name: &str,
        website: &str,
    ) -> Result<Organization, UpstreamError> {
        let url = self.http.url(&["orgs"])?;
        let body = CreateOrganizationRequest { name, website };
        let response = self
            .http
            .send(name, |client| client.post(url.clone()).json(&body))
            .await?;
        let record: OrganizationRecord = self.http.json(response).await?;
        Ok(Organization {
            id: record.id,
            name: record.name,
            logo_url: record.logo_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_organization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orgs"))
            .and(body_json(json!({"Name": "Acme", "Website": "https://acme.example"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "ID": "org-1",
                "Name": "Acme",
                "LogoURL": "https://logos.example/acme.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = ServiceConfig::new(Url::parse(&server.uri()).unwrap());
        let client = OrganizationServiceClient::new(&config, None).unwrap();
        let org = client
            .create_organization("Acme", "https://acme.example")
            .await
            .unwrap();
        assert_eq!(org.id, "org-1");
        assert_eq!(org.logo_url, "https://logos.example/acme.png");
    }
}
