//! Per-company counters and global rollups in the metrics table.

use crate::errors::{Result, StoreError, decode, decode_all, encode};
use crate::kv::{Filter, Key, KeyValueStore, PutCondition, ScanRequest, Update};
use crate::metrics_defs::{COUNTER_INCREMENTS, SCAN_PAGES};
use crate::types::{
    CLA_MANAGER_DISTRIBUTION_ID, COMPANY_OBJECT_TYPE, ClaManagerDistribution, CompanyMetric,
    PROJECT_OBJECT_TYPE, ProjectMetric, TOTAL_COUNT_ID, TotalCountMetrics, company_metric_id,
    project_metric_id,
};
use shared::{counter, histogram};
use std::cmp::Ordering;
use std::sync::Arc;

const KEY_ATTRIBUTE: &str = "id";

pub struct CounterStore {
    kv: Arc<dyn KeyValueStore>,
    table: String,
}

impl CounterStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        CounterStore {
            kv,
            table: table.into(),
        }
    }

    async fn get_row<T: serde::de::DeserializeOwned>(
        &self,
        entity: &'static str,
        id: &str,
    ) -> Result<T> {
        let key = Key::new(KEY_ATTRIBUTE, id);
        match self.kv.get_item(&self.table, &key).await? {
            Some(item) => decode(entity, item),
            None => Err(StoreError::not_found(entity, id)),
        }
    }

    async fn put_row<T: serde::Serialize>(&self, entity: &'static str, row: &T) -> Result<()> {
        let item = encode(entity, row)?;
        self.kv
            .put_item(&self.table, item, PutCondition::Always)
            .await?;
        Ok(())
    }

    pub async fn get_company_metric(&self, company_id: &str) -> Result<CompanyMetric> {
        self.get_row("company metric", &company_metric_id(company_id))
            .await
    }

    /// Last write wins when two creates race.
    pub async fn create_company_metric(
        &self,
        company_id: &str,
        company_name: &str,
        initial_count: i64,
    ) -> Result<()> {
        let metric = CompanyMetric::new(company_id, company_name, initial_count);
        self.put_row("company metric", &metric).await
    }

    pub async fn put_company_metric(&self, metric: &CompanyMetric) -> Result<()> {
        self.put_row("company metric", metric).await
    }

    /// Adds one to the company's project count, creating the row at 1 when it
    /// does not exist yet. The whole operation is a single atomic update so
    /// concurrent increments for the same company are never lost.
    pub async fn increment_project_count(
        &self,
        company_id: &str,
        company_name: &str,
    ) -> Result<CompanyMetric> {
        let key = Key::new(KEY_ATTRIBUTE, company_metric_id(company_id));
        let update = Update::new()
            .add("project_count", 1)
            .set_if_not_exists("object_type", COMPANY_OBJECT_TYPE)
            .set_if_not_exists("company_name", company_name);

        let item = self.kv.update_item(&self.table, &key, &update).await?;
        counter!(COUNTER_INCREMENTS).increment(1);
        decode("company metric", item)
    }

    /// Every company metric row, in no particular order.
    pub async fn list_company_metrics(&self) -> Result<Vec<CompanyMetric>> {
        let mut request = ScanRequest::filtered(Filter::eq("object_type", COMPANY_OBJECT_TYPE));
        let mut rows = Vec::new();
        let mut pages = 0;

        loop {
            let page = self.kv.scan(&self.table, &request).await?;
            pages += 1;
            rows.extend(decode_all::<CompanyMetric>("company metric", page.items)?);
            match page.next_page_token {
                Some(token) => request.page_token = Some(token),
                None => break,
            }
        }

        histogram!(SCAN_PAGES).record(pages as f64);
        Ok(rows)
    }

    /// Company metrics sorted by project count, highest first, with the
    /// `pinned` company (if present in the table) always in first position.
    /// Ties are broken by id ascending. The result holds at most `top_n` rows.
    pub async fn scan_all_company_metrics(
        &self,
        pinned: Option<&str>,
        top_n: usize,
    ) -> Result<Vec<CompanyMetric>> {
        let mut rows = self.list_company_metrics().await?;
        let pinned_id = pinned.map(company_metric_id);

        rows.sort_by(|a, b| {
            let a_pinned = pinned_id.as_deref() == Some(a.id.as_str());
            let b_pinned = pinned_id.as_deref() == Some(b.id.as_str());
            match (a_pinned, b_pinned) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => b
                    .project_count
                    .cmp(&a.project_count)
                    .then_with(|| a.id.cmp(&b.id)),
            }
        });
        rows.truncate(top_n);
        Ok(rows)
    }

    pub async fn get_project_metric(&self, cla_group_id: &str) -> Result<ProjectMetric> {
        self.get_row("project metric", &project_metric_id(cla_group_id))
            .await
    }

    pub async fn put_project_metric(&self, metric: &ProjectMetric) -> Result<()> {
        let mut row = metric.clone();
        row.id = project_metric_id(metric.cla_group_id());
        row.object_type = PROJECT_OBJECT_TYPE.to_string();
        self.put_row("project metric", &row).await
    }

    pub async fn get_total_count_metrics(&self) -> Result<TotalCountMetrics> {
        self.get_row("total count metrics", TOTAL_COUNT_ID).await
    }

    pub async fn put_total_count_metrics(&self, metrics: &TotalCountMetrics) -> Result<()> {
        let mut row = metrics.clone();
        row.id = TOTAL_COUNT_ID.to_string();
        self.put_row("total count metrics", &row).await
    }

    pub async fn get_cla_manager_distribution(&self) -> Result<ClaManagerDistribution> {
        self.get_row("cla manager distribution", CLA_MANAGER_DISTRIBUTION_ID)
            .await
    }

    pub async fn put_cla_manager_distribution(
        &self,
        distribution: &ClaManagerDistribution,
    ) -> Result<()> {
        let mut row = distribution.clone();
        row.id = CLA_MANAGER_DISTRIBUTION_ID.to_string();
        self.put_row("cla manager distribution", &row).await
    }
}
