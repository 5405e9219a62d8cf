//! Entity counts behind the metrics dashboard.

use crate::config::TableNames;
use crate::errors::Result;
use crate::kv::{KeyValueStore, ScanRequest, scan_all};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DashboardSection {
    Users,
    Signatures,
    Companies,
    Repositories,
    Projects,
}

impl DashboardSection {
    pub const ALL: [DashboardSection; 5] = [
        DashboardSection::Users,
        DashboardSection::Signatures,
        DashboardSection::Companies,
        DashboardSection::Repositories,
        DashboardSection::Projects,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            DashboardSection::Users => "users",
            DashboardSection::Signatures => "signatures",
            DashboardSection::Companies => "companies",
            DashboardSection::Repositories => "repositories",
            DashboardSection::Projects => "projects",
        }
    }
}

#[async_trait]
pub trait DashboardSource: Send + Sync {
    async fn total_count(&self, section: DashboardSection) -> Result<i64>;
}

pub struct KvDashboardSource {
    kv: Arc<dyn KeyValueStore>,
    tables: TableNames,
}

impl KvDashboardSource {
    pub fn new(kv: Arc<dyn KeyValueStore>, tables: TableNames) -> Self {
        KvDashboardSource { kv, tables }
    }

    fn table_for(&self, section: DashboardSection) -> (&str, &'static str) {
        match section {
            DashboardSection::Users => (self.tables.users.as_str(), "user_id"),
            DashboardSection::Signatures => (self.tables.signatures.as_str(), "signature_id"),
            DashboardSection::Companies => (self.tables.companies.as_str(), "company_id"),
            DashboardSection::Repositories => (self.tables.repositories.as_str(), "repository_id"),
            DashboardSection::Projects => (self.tables.cla_groups.as_str(), "project_id"),
        }
    }
}

#[async_trait]
impl DashboardSource for KvDashboardSource {
    async fn total_count(&self, section: DashboardSection) -> Result<i64> {
        let (table, key_attribute) = self.table_for(section);
        let request = ScanRequest::default().with_projection(&[key_attribute]);
        let items = scan_all(self.kv.as_ref(), table, request).await?;
        Ok(items.len() as i64)
    }
}
