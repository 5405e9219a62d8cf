use crate::errors::{Result, decode_all, encode};
use crate::kv::{Filter, KeyValueStore, PutCondition, ScanRequest, scan_all};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An audit event recorded against a company and project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub event_id: String,
    pub event_type: String,
    pub event_company_id: String,
    pub event_project_sfid: String,
    pub event_user_name: String,
    pub event_data: String,
    /// RFC 3339 timestamp.
    pub event_time: String,
    pub event_time_epoch: i64,
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// The newest `page_size` events for the company and project, newest first.
    async fn get_recent_events_for_company_project(
        &self,
        company_id: &str,
        project_sfid: &str,
        page_size: usize,
    ) -> Result<Vec<Event>>;

    async fn put_event(&self, event: &Event) -> Result<()>;
}

pub fn sort_newest_first(events: &mut [Event]) {
    events.sort_by(|a, b| {
        b.event_time_epoch
            .cmp(&a.event_time_epoch)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });
}

pub struct KvEventRepository {
    kv: Arc<dyn KeyValueStore>,
    table: String,
}

impl KvEventRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        KvEventRepository {
            kv,
            table: table.into(),
        }
    }
}

#[async_trait]
impl EventRepository for KvEventRepository {
    async fn get_recent_events_for_company_project(
        &self,
        company_id: &str,
        project_sfid: &str,
        page_size: usize,
    ) -> Result<Vec<Event>> {
        let filter = Filter::eq("event_company_id", company_id)
            .and(Filter::eq("event_project_sfid", project_sfid));
        let items = scan_all(self.kv.as_ref(), &self.table, ScanRequest::filtered(filter)).await?;
        let mut events: Vec<Event> = decode_all("event", items)?;
        sort_newest_first(&mut events);
        events.truncate(page_size);
        Ok(events)
    }

    async fn put_event(&self, event: &Event) -> Result<()> {
        let item = encode("event", event)?;
        self.kv
            .put_item(&self.table, item, PutCondition::Always)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    #[tokio::test]
    async fn test_recent_events_are_newest_first_and_truncated() {
        let kv = InMemoryStore::default();
        kv.create_table("events", "event_id");
        let repo = KvEventRepository::new(Arc::new(kv), "events");

        for (id, epoch, project) in [
            ("e1", 10, "p1"),
            ("e2", 30, "p1"),
            ("e3", 20, "p1"),
            ("e4", 40, "p2"),
        ] {
            repo.put_event(&Event {
                event_id: id.into(),
                event_company_id: "acme".into(),
                event_project_sfid: project.into(),
                event_time_epoch: epoch,
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let events = repo
            .get_recent_events_for_company_project("acme", "p1", 2)
            .await
            .unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e3"]);
    }
}
