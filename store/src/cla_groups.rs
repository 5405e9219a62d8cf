use crate::errors::{Result, StoreError, decode, decode_all, encode};
use crate::kv::{Filter, Key, KeyValueStore, PutCondition, ScanRequest, scan_all};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const KEY_ATTRIBUTE: &str = "project_id";

/// A CLA group record. Stored in the legacy projects table, hence the column names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaGroup {
    #[serde(rename = "project_id")]
    pub cla_group_id: String,
    #[serde(rename = "project_name")]
    pub cla_group_name: String,
    #[serde(rename = "project_description")]
    pub description: String,
    pub foundation_sfid: String,
    #[serde(rename = "project_external_id")]
    pub external_id: String,
    #[serde(rename = "project_icla_enabled")]
    pub icla_enabled: bool,
    #[serde(rename = "project_ccla_enabled")]
    pub ccla_enabled: bool,
    #[serde(rename = "project_ccla_requires_icla_signature")]
    pub ccla_requires_icla: bool,
    #[serde(rename = "project_acl")]
    pub acl: Vec<String>,
    pub version: String,
    /// Repositories attached to the foundation itself rather than a sub-project.
    pub root_project_repositories_count: i64,
}

#[async_trait]
pub trait ClaGroupRepository: Send + Sync {
    async fn get_cla_group(&self, cla_group_id: &str) -> Result<ClaGroup>;

    async fn get_cla_group_by_name(&self, name: &str) -> Result<Option<ClaGroup>>;

    async fn get_cla_groups_by_foundation(&self, foundation_sfid: &str) -> Result<Vec<ClaGroup>>;

    /// Stores the group, assigning a fresh id when `cla_group_id` is empty.
    async fn create_cla_group(&self, cla_group: ClaGroup) -> Result<ClaGroup>;

    async fn delete_cla_group(&self, cla_group_id: &str) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}

pub struct KvClaGroupRepository {
    kv: Arc<dyn KeyValueStore>,
    table: String,
}

impl KvClaGroupRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        KvClaGroupRepository {
            kv,
            table: table.into(),
        }
    }
}

#[async_trait]
impl ClaGroupRepository for KvClaGroupRepository {
    async fn get_cla_group(&self, cla_group_id: &str) -> Result<ClaGroup> {
        let key = Key::new(KEY_ATTRIBUTE, cla_group_id);
        match self.kv.get_item(&self.table, &key).await? {
            Some(item) => decode("cla group", item),
            None => Err(StoreError::not_found("cla group", cla_group_id)),
        }
    }

    async fn get_cla_group_by_name(&self, name: &str) -> Result<Option<ClaGroup>> {
        let request = ScanRequest::filtered(Filter::eq("project_name", name));
        let items = scan_all(self.kv.as_ref(), &self.table, request).await?;
        Ok(decode_all::<ClaGroup>("cla group", items)?.into_iter().next())
    }

    async fn get_cla_groups_by_foundation(&self, foundation_sfid: &str) -> Result<Vec<ClaGroup>> {
        let request = ScanRequest::filtered(Filter::eq("foundation_sfid", foundation_sfid));
        let items = scan_all(self.kv.as_ref(), &self.table, request).await?;
        decode_all("cla group", items)
    }

    async fn create_cla_group(&self, mut cla_group: ClaGroup) -> Result<ClaGroup> {
        if cla_group.cla_group_id.is_empty() {
            cla_group.cla_group_id = uuid::Uuid::new_v4().to_string();
        }
        let item = encode("cla group", &cla_group)?;
        self.kv
            .put_item(&self.table, item, PutCondition::IfNotExists)
            .await?;
        Ok(cla_group)
    }

    async fn delete_cla_group(&self, cla_group_id: &str) -> Result<()> {
        let key = Key::new(KEY_ATTRIBUTE, cla_group_id);
        self.kv.delete_item(&self.table, &key).await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let request = ScanRequest::default().with_projection(&[KEY_ATTRIBUTE]);
        Ok(scan_all(self.kv.as_ref(), &self.table, request).await?.len())
    }
}
