//! Recent audit events of a company across a project and its child projects.

use crate::errors::{Result, ServiceError};
use crate::fanout::FanOut;
use std::sync::Arc;
use std::time::Duration;
use store::events::{Event, EventRepository, sort_newest_first};
use upstreams::ProjectHierarchyLookup;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Clone)]
pub struct EventsService {
    events: Arc<dyn EventRepository>,
    projects: Arc<dyn ProjectHierarchyLookup>,
    branch_timeout: Duration,
}

impl EventsService {
    pub fn new(
        events: Arc<dyn EventRepository>,
        projects: Arc<dyn ProjectHierarchyLookup>,
        branch_timeout: Duration,
    ) -> Self {
        EventsService {
            events,
            projects,
            branch_timeout,
        }
    }

    /// Newest events first, at most `page_size` of them. A project whose
    /// query fails contributes no events.
    pub async fn get_recent_events_for_company_project(
        &self,
        company_id: &str,
        project_sfid: &str,
        page_size: Option<usize>,
    ) -> Result<Vec<Event>> {
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(ServiceError::validation("page_size must be greater than 0"));
        }

        let project = self.projects.get_project(project_sfid).await?;
        let mut project_sfids = vec![project.id.clone()];
        project_sfids.extend(project.projects.iter().map(|p| p.id.clone()));

        let mut fanout = FanOut::new("recent_events", self.branch_timeout);
        for project_sfid in project_sfids {
            let events = self.events.clone();
            let company_id = company_id.to_string();
            fanout.spawn(project_sfid.clone(), async move {
                events
                    .get_recent_events_for_company_project(&company_id, &project_sfid, page_size)
                    .await
            });
        }
        let results = fanout.join().await;

        let mut merged = Vec::new();
        for (project_sfid, result) in results.completed {
            match result {
                Ok(events) => merged.extend(events),
                Err(e) => {
                    tracing::warn!(
                        %company_id,
                        %project_sfid,
                        error = %e,
                        "unable to get recent events"
                    );
                }
            }
        }
        sort_newest_first(&mut merged);
        merged.truncate(page_size);
        Ok(merged)
    }
}
