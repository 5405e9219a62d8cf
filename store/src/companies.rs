use crate::errors::{Result, StoreError, decode, decode_all, encode};
use crate::kv::{Filter, Key, KeyValueStore, PutCondition, ScanRequest, scan_all};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const KEY_ATTRIBUTE: &str = "company_id";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Company {
    pub company_id: String,
    pub company_name: String,
    /// Organization id in the external organization service.
    pub company_external_id: String,
    pub company_acl: Vec<String>,
    pub company_manager_id: String,
}

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn get_company(&self, company_id: &str) -> Result<Company>;

    async fn get_company_by_external_id(&self, company_sfid: &str) -> Result<Company>;

    async fn create_company(
        &self,
        name: &str,
        external_id: &str,
        manager_id: &str,
    ) -> Result<Company>;
}

pub struct KvCompanyRepository {
    kv: Arc<dyn KeyValueStore>,
    table: String,
}

impl KvCompanyRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        KvCompanyRepository {
            kv,
            table: table.into(),
        }
    }
}

#[async_trait]
impl CompanyRepository for KvCompanyRepository {
    async fn get_company(&self, company_id: &str) -> Result<Company> {
        let key = Key::new(KEY_ATTRIBUTE, company_id);
        match self.kv.get_item(&self.table, &key).await? {
            Some(item) => decode("company", item),
            None => Err(StoreError::not_found("company", company_id)),
        }
    }

    async fn get_company_by_external_id(&self, company_sfid: &str) -> Result<Company> {
        let request = ScanRequest::filtered(Filter::eq("company_external_id", company_sfid));
        let items = scan_all(self.kv.as_ref(), &self.table, request).await?;
        decode_all::<Company>("company", items)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("company", company_sfid))
    }

    async fn create_company(
        &self,
        name: &str,
        external_id: &str,
        manager_id: &str,
    ) -> Result<Company> {
        let company = Company {
            company_id: uuid::Uuid::new_v4().to_string(),
            company_name: name.to_string(),
            company_external_id: external_id.to_string(),
            company_acl: vec![manager_id.to_string()],
            company_manager_id: manager_id.to_string(),
        };
        let item = encode("company", &company)?;
        self.kv
            .put_item(&self.table, item, PutCondition::IfNotExists)
            .await?;
        Ok(company)
    }
}
