//! Project to CLA-group enrollment rows.
//!
//! A project belongs to at most one CLA group, so rows are keyed by project id.
//! Lookups by CLA group or foundation are filtered scans.

use crate::errors::{Result, StoreError, decode, decode_all, encode};
use crate::kv::{Filter, Key, KeyValueStore, PutCondition, ScanRequest, scan_all};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const KEY_ATTRIBUTE: &str = "project_sfid";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectClaGroup {
    pub project_sfid: String,
    pub cla_group_id: String,
    pub foundation_sfid: String,
    pub project_name: String,
    pub foundation_name: String,
    pub repositories_count: i64,
}

#[async_trait]
pub trait ProjectClaGroupRepository: Send + Sync {
    async fn get_associations_for_foundation(&self, foundation_sfid: &str)
    -> Result<Vec<ProjectClaGroup>>;

    /// Fails with a not-found error when the project is not enrolled.
    async fn get_association_for_project(&self, project_sfid: &str) -> Result<ProjectClaGroup>;

    async fn get_associations_for_cla_group(&self, cla_group_id: &str)
    -> Result<Vec<ProjectClaGroup>>;

    async fn get_all_associations(&self) -> Result<Vec<ProjectClaGroup>>;

    /// Enrolls the row's project; a project that is already enrolled is rejected.
    async fn associate_project_with_cla_group(&self, association: &ProjectClaGroup) -> Result<()>;

    /// Removes the listed projects from the group, or every project of the
    /// group when `remove_all` is set. Rows owned by other groups are kept.
    async fn remove_associations(
        &self,
        cla_group_id: &str,
        project_sfids: &[String],
        remove_all: bool,
    ) -> Result<()>;
}

pub struct KvProjectClaGroupRepository {
    kv: Arc<dyn KeyValueStore>,
    table: String,
}

impl KvProjectClaGroupRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        KvProjectClaGroupRepository {
            kv,
            table: table.into(),
        }
    }

    async fn scan(&self, filter: Option<Filter>) -> Result<Vec<ProjectClaGroup>> {
        let request = ScanRequest {
            filter,
            ..Default::default()
        };
        let items = scan_all(self.kv.as_ref(), &self.table, request).await?;
        decode_all("project cla group", items)
    }
}

#[async_trait]
impl ProjectClaGroupRepository for KvProjectClaGroupRepository {
    async fn get_associations_for_foundation(
        &self,
        foundation_sfid: &str,
    ) -> Result<Vec<ProjectClaGroup>> {
        self.scan(Some(Filter::eq("foundation_sfid", foundation_sfid)))
            .await
    }

    async fn get_association_for_project(&self, project_sfid: &str) -> Result<ProjectClaGroup> {
        let key = Key::new(KEY_ATTRIBUTE, project_sfid);
        match self.kv.get_item(&self.table, &key).await? {
            Some(item) => decode("project cla group", item),
            None => Err(StoreError::not_found("project cla group", project_sfid)),
        }
    }

    async fn get_associations_for_cla_group(
        &self,
        cla_group_id: &str,
    ) -> Result<Vec<ProjectClaGroup>> {
        self.scan(Some(Filter::eq("cla_group_id", cla_group_id)))
            .await
    }

    async fn get_all_associations(&self) -> Result<Vec<ProjectClaGroup>> {
        self.scan(None).await
    }

    async fn associate_project_with_cla_group(&self, association: &ProjectClaGroup) -> Result<()> {
        let item = encode("project cla group", association)?;
        self.kv
            .put_item(&self.table, item, PutCondition::IfNotExists)
            .await?;
        Ok(())
    }

    async fn remove_associations(
        &self,
        cla_group_id: &str,
        project_sfids: &[String],
        remove_all: bool,
    ) -> Result<()> {
        let rows = self.get_associations_for_cla_group(cla_group_id).await?;
        for row in rows {
            if remove_all || project_sfids.contains(&row.project_sfid) {
                let key = Key::new(KEY_ATTRIBUTE, row.project_sfid.as_str());
                self.kv.delete_item(&self.table, &key).await?;
            }
        }
        Ok(())
    }
}
